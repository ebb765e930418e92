//! Interactive loop: read a line, dispatch it, render the result.

use crate::command::ExecutionResult;
use crate::dispatcher::Dispatcher;
use crate::env::ShellState;
use crate::error::ShellError;
use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::path::MAIN_SEPARATOR;
use tracing::debug;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Prompt for the current directory, with the home prefix shown as `~`.
pub fn prompt(state: &ShellState) -> String {
    let cwd = &state.cwd;
    let shown = match state.home_dir().and_then(|home| cwd.strip_prefix(home).ok().map(|p| p.to_path_buf())) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~{}{}", MAIN_SEPARATOR, rest.display()),
        None => cwd.display().to_string(),
    };
    format!("{}{} >>> {}", GREEN, shown, RESET)
}

/// Print a result: stdout verbatim, then stderr (red when the command failed).
pub fn render(result: &ExecutionResult, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<()> {
    out.write_all(result.stdout.as_bytes())?;
    out.flush()?;

    let stderr = result.stderr.trim_end_matches(['\r', '\n']);
    if !stderr.is_empty() {
        if result.succeeded {
            writeln!(err, "{}", stderr)?;
        } else {
            writeln!(err, "{}{}{}", RED, stderr, RESET)?;
        }
    } else if !result.succeeded {
        writeln!(err, "{}[ERROR] Command failed (Code {}){}", RED, result.exit_code, RESET)?;
    }
    err.flush()
}

pub fn banner(dispatcher: &Dispatcher) -> String {
    format!(
        "MiniShell v3.0 (Unified {})\nType 'help' for commands, 'exit' to quit.\n",
        dispatcher.host()
    )
}

/// Line-editing front end over a [`Dispatcher`].
pub struct Repl {
    dispatcher: Dispatcher,
}

impl Repl {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run until `exit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new().context("can't initialize line editor")?;
        for entry in self.dispatcher.history().load_all() {
            rl.add_history_entry(entry)?;
        }

        print!("{}", banner(&self.dispatcher));
        let stdout = io::stdout();
        let stderr = io::stderr();

        while !self.dispatcher.should_exit() {
            match rl.readline(&prompt(self.dispatcher.state())) {
                Ok(line) => {
                    let result = match self.dispatcher.dispatch(&line) {
                        Ok(result) => result,
                        Err(ShellError::EmptyInput) => continue,
                        Err(err) => ExecutionResult::from(err),
                    };
                    rl.add_history_entry(line.trim())?;
                    render(&result, &mut stdout.lock(), &mut stderr.lock())
                        .context("can't write command output")?;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("[INFO] Use 'exit' to quit");
                }
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    break;
                }
                Err(err) => return Err(err).context("can't read input"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn state_in(cwd: &str, home: &str) -> ShellState {
        let mut vars = HashMap::new();
        vars.insert("HOME".to_string(), home.to_string());
        vars.insert("USERPROFILE".to_string(), home.to_string());
        ShellState::with(PathBuf::from(cwd), vars)
    }

    fn rendered(result: &ExecutionResult) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        render(result, &mut out, &mut err).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    #[cfg(unix)]
    fn test_prompt_abbreviates_home() {
        assert_eq!(prompt(&state_in("/home/me", "/home/me")), "\x1b[32m~ >>> \x1b[0m");
        assert_eq!(prompt(&state_in("/home/me/src", "/home/me")), "\x1b[32m~/src >>> \x1b[0m");
        assert_eq!(prompt(&state_in("/tmp", "/home/me")), "\x1b[32m/tmp >>> \x1b[0m");
    }

    #[test]
    #[cfg(unix)]
    fn test_prompt_does_not_match_partial_component() {
        assert_eq!(prompt(&state_in("/home/meow", "/home/me")), "\x1b[32m/home/meow >>> \x1b[0m");
    }

    #[test]
    fn test_render_success() {
        let (out, err) = rendered(&ExecutionResult::success("hi\n"));
        assert_eq!(out, "hi\n");
        assert_eq!(err, "");
    }

    #[test]
    fn test_render_failure_in_red() {
        let (out, err) = rendered(&ExecutionResult::failure(1, "boom\n"));
        assert_eq!(out, "");
        assert_eq!(err, "\x1b[31mboom\x1b[0m\n");
    }

    #[test]
    fn test_render_silent_failure_reports_code() {
        let (_, err) = rendered(&ExecutionResult::failure(2, ""));
        assert_eq!(err, "\x1b[31m[ERROR] Command failed (Code 2)\x1b[0m\n");
    }

    #[test]
    fn test_render_warning_on_success_is_plain() {
        let result = ExecutionResult::from_output(0, String::new(), "FOO is not set\n".to_string());
        let (_, err) = rendered(&result);
        assert_eq!(err, "FOO is not set\n");
    }

    #[test]
    fn test_banner_names_host() {
        let sh = Dispatcher::default();
        let text = banner(&sh);
        assert!(text.starts_with("MiniShell v3.0 (Unified "));
        assert!(text.contains(&sh.host().to_string()));
    }
}
