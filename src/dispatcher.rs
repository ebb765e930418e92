use crate::command::{CommandFactory, ExecutionResult};
use crate::env::ShellState;
use crate::error::ShellError;
use crate::external;
use crate::history::{History, InMemoryHistory};
use crate::lexer;
use crate::platform::HostOs;
use crate::translate;
use crate::wildcard;
use tracing::{debug, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports built-ins defined in this crate; see [`BuiltinCommand`](crate::builtin).
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Word that forwards its arguments to the system command path.
pub const RUN_COMMAND: &str = "my_run";

const CONTROL_HELP: &str = "\
  my_run <command...>         run any OS command (unified syntax)
  history                     command history
  help                        show this help
  exit                        exit shell
";

/// Where a tokenized line goes.
#[derive(Debug)]
enum Route {
    /// Index into the built-in registry plus the arguments.
    Builtin(usize, Vec<String>),
    /// Final native tokens for the execution engine.
    System(Vec<String>),
    Help,
    History,
    Exit,
}

/// Turns input lines into executed commands.
///
/// Owns the [`ShellState`] every command runs against, the built-in registry
/// and the history store. A line is tokenized, recorded in history and then
/// either handed to a built-in or expanded, translated for the host and run as
/// a native process. Every failure comes back as a failed
/// [`ExecutionResult`]; only a blank line is an error.
///
/// Example
/// ```
/// use minishell::Dispatcher;
/// let mut sh = Dispatcher::default();
/// let result = sh.dispatch("my_echo hello world").unwrap();
/// assert_eq!(result.stdout, "hello world\n");
/// assert!(result.succeeded);
/// ```
pub struct Dispatcher {
    state: ShellState,
    host: HostOs,
    builtins: Vec<Box<dyn CommandFactory>>,
    history: Box<dyn History>,
}

impl Dispatcher {
    pub fn new(state: ShellState, host: HostOs, history: Box<dyn History>) -> Self {
        Self {
            state,
            host,
            builtins: default_builtins(),
            history,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn host(&self) -> HostOs {
        self.host
    }

    pub fn history(&self) -> &dyn History {
        self.history.as_ref()
    }

    pub fn should_exit(&self) -> bool {
        self.state.should_exit
    }

    /// Names handled in-process: the registry plus the control words.
    pub fn builtin_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.builtins.iter().map(|f| f.name()).collect();
        names.extend([RUN_COMMAND, "help", "history", "exit"]);
        names
    }

    /// Run one input line.
    ///
    /// Fails only with [`ShellError::EmptyInput`] for a blank line.
    pub fn dispatch(&mut self, line: &str) -> Result<ExecutionResult, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ShellError::EmptyInput);
        }

        if let Err(err) = self.history.append(line) {
            warn!("could not record history: {:#}", err);
        }

        let result = match self.route(line) {
            Ok(route) => {
                debug!(?route, "routed");
                self.run(route)
            }
            Err(err) => ExecutionResult::from(err),
        };
        debug!(exit_code = result.exit_code, succeeded = result.succeeded, "dispatched");
        Ok(result)
    }

    /// Native tokens `line` would spawn, or `None` if a built-in handles it.
    pub fn system_tokens(&self, line: &str) -> Result<Option<Vec<String>>, ShellError> {
        match self.route(line.trim())? {
            Route::System(tokens) => Ok(Some(tokens)),
            _ => Ok(None),
        }
    }

    fn route(&self, line: &str) -> Result<Route, ShellError> {
        let tokens =
            lexer::split_into_tokens(line).map_err(|e| ShellError::InvalidSyntax(e.to_string()))?;
        let Some((name, args)) = tokens.split_first() else {
            return Err(ShellError::EmptyInput);
        };

        match name.as_str() {
            "help" => Ok(Route::Help),
            "history" => Ok(Route::History),
            "exit" => Ok(Route::Exit),
            RUN_COMMAND if args.is_empty() => Err(ShellError::InvalidSyntax(format!(
                "usage: {} <command> [args...]",
                RUN_COMMAND
            ))),
            RUN_COMMAND => Ok(Route::System(self.native_tokens(args))),
            _ => match self.builtins.iter().position(|f| f.name() == name) {
                Some(index) => Ok(Route::Builtin(index, args.to_vec())),
                None => Ok(Route::System(self.native_tokens(&tokens))),
            },
        }
    }

    /// Expand the arguments (never the command name), then translate.
    fn native_tokens(&self, tokens: &[String]) -> Vec<String> {
        let Some((name, args)) = tokens.split_first() else {
            return Vec::new();
        };
        let mut expanded = Vec::with_capacity(tokens.len());
        expanded.push(name.clone());
        expanded.extend(wildcard::expand_args(args, &self.state.cwd, self.host));
        translate::translate(expanded, self.host)
    }

    fn run(&mut self, route: Route) -> ExecutionResult {
        match route {
            Route::Builtin(index, args) => {
                let factory = &self.builtins[index];
                let name = factory.name();
                let cmd = factory.create(&self.state, self.host, &args);

                let mut stdout = Vec::new();
                let mut stderr = Vec::new();
                let outcome = cmd.execute(&mut stdout, &mut stderr, &mut self.state, self.host);
                let stdout = String::from_utf8_lossy(&stdout).into_owned();
                let mut stderr = String::from_utf8_lossy(&stderr).into_owned();
                match outcome {
                    Ok(code) => ExecutionResult::from_output(code, stdout, stderr),
                    Err(err) => {
                        stderr.push_str(&format!("{}: {}", name, err));
                        ExecutionResult {
                            stdout,
                            stderr,
                            exit_code: 1,
                            succeeded: false,
                        }
                    }
                }
            }
            Route::System(tokens) => external::execute(&tokens, &self.state, self.host),
            Route::Help => ExecutionResult::success(self.help_text()),
            Route::History => {
                let listing: String = self
                    .history
                    .load_all()
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{}: {}\n", i + 1, entry))
                    .collect();
                ExecutionResult::success(listing)
            }
            Route::Exit => {
                self.state.should_exit = true;
                ExecutionResult::success("Goodbye!\n")
            }
        }
    }

    fn help_text(&self) -> String {
        let mut text = String::from("MiniShell Help (Unified Commands)\n\n");
        for factory in &self.builtins {
            text.push_str("  ");
            text.push_str(factory.summary());
            text.push('\n');
        }
        text.push_str(CONTROL_HELP);
        text.push_str("\nAny other command runs as a system command, e.g. `ls -l *.rs` or `grep error logs/*`.\n");
        text
    }
}

impl Default for Dispatcher {
    /// A dispatcher over the current process state with throwaway history.
    fn default() -> Self {
        Self::new(
            ShellState::new(),
            HostOs::current(),
            Box::new(InMemoryHistory::new()),
        )
    }
}

fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    vec![
        Box::new(Factory::<Ls>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Mkdir>::default()),
        Box::new(Factory::<Touch>::default()),
        Box::new(Factory::<Rm>::default()),
        Box::new(Factory::<Clear>::default()),
        Box::new(Factory::<Set>::default()),
        Box::new(Factory::<Get>::default()),
        Box::new(Factory::<Echo>::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn dispatcher_in(host: HostOs) -> (TempDir, Dispatcher) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut vars: HashMap<String, String> = std::env::vars().collect();
        vars.insert("HOME".to_string(), tmp.path().to_string_lossy().into_owned());
        let state = ShellState::with(tmp.path().to_path_buf(), vars);
        let sh = Dispatcher::new(state, host, Box::new(InMemoryHistory::new()));
        (tmp, sh)
    }

    #[test]
    fn test_blank_line_is_empty_input() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        assert!(matches!(sh.dispatch("   \t"), Err(ShellError::EmptyInput)));
        assert!(sh.history().load_all().is_empty());
    }

    #[test]
    fn test_builtins_never_route_to_system() {
        for host in [HostOs::Posix, HostOs::Windows] {
            let (_tmp, sh) = dispatcher_in(host);
            for name in sh.builtin_names() {
                if name == RUN_COMMAND {
                    continue;
                }
                let line = format!("{} x", name);
                assert_eq!(sh.system_tokens(&line).unwrap(), None, "{} on {:?}", name, host);
            }
        }
    }

    #[test]
    fn test_run_and_bare_fallback_are_equivalent() {
        for host in [HostOs::Posix, HostOs::Windows] {
            let (tmp, sh) = dispatcher_in(host);
            File::create(tmp.path().join("a.txt")).unwrap();
            File::create(tmp.path().join("b.txt")).unwrap();

            for line in ["ls -la *.txt", "grep -i 'two words' *.md", "whatever --flag"] {
                let via_run = sh.system_tokens(&format!("my_run {}", line)).unwrap();
                let bare = sh.system_tokens(line).unwrap();
                assert!(bare.is_some());
                assert_eq!(via_run, bare, "{} on {:?}", line, host);
            }
        }
    }

    #[test]
    fn test_system_tokens_expand_then_translate() {
        let (tmp, sh) = dispatcher_in(HostOs::Windows);
        File::create(tmp.path().join("b.txt")).unwrap();
        File::create(tmp.path().join("a.txt")).unwrap();
        assert_eq!(
            sh.system_tokens("cat *.txt").unwrap().unwrap(),
            ["type", "a.txt", "b.txt"]
        );
        // the command word itself is never expanded
        assert_eq!(sh.system_tokens("*.txt").unwrap().unwrap(), ["*.txt"]);

        let (_tmp, sh) = dispatcher_in(HostOs::Posix);
        assert_eq!(sh.system_tokens("ls -l *.nothing").unwrap().unwrap(), ["ls", "-l", "*.nothing"]);
    }

    #[test]
    fn test_set_then_get() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        let set = sh.dispatch("my_set FOO=bar").unwrap();
        assert!(set.succeeded);
        let got = sh.dispatch("my_get FOO").unwrap();
        assert_eq!(got.stdout.trim_end(), "bar");
        assert_eq!(sh.state().get_var("FOO"), Some("bar"));
    }

    #[test]
    fn test_set_without_equals_fails() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        let result = sh.dispatch("my_set FOO").unwrap();
        assert!(!result.succeeded);
        assert!(result.stderr.starts_with("my_set: "));
    }

    #[test]
    fn test_missing_program_then_shell_keeps_working() {
        let (tmp, mut sh) = dispatcher_in(HostOs::current());
        let result = sh.dispatch("my_run doesnotexist123").unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, external::SPAWN_FAILURE);

        let pwd = sh.dispatch("my_pwd").unwrap();
        assert!(pwd.succeeded);
        assert_eq!(pwd.stdout.trim_end(), tmp.path().to_string_lossy());
    }

    #[test]
    fn test_rm_through_dispatch() {
        let (tmp, mut sh) = dispatcher_in(HostOs::current());
        let dir = tmp.path().join("data");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f.txt"), b"x").unwrap();

        let refused = sh.dispatch("my_rm data").unwrap();
        assert!(!refused.succeeded);
        assert!(dir.join("f.txt").is_file());

        let removed = sh.dispatch("my_rm -r data").unwrap();
        assert!(removed.succeeded, "{}", removed.stderr);
        assert!(!dir.exists());
    }

    #[test]
    fn test_rm_star_never_turns_file_names_into_flags() {
        let (tmp, mut sh) = dispatcher_in(HostOs::current());
        File::create(tmp.path().join("-r")).unwrap();
        fs::create_dir(tmp.path().join("keep")).unwrap();
        fs::write(tmp.path().join("keep").join("data"), b"x").unwrap();

        let result = sh.dispatch("my_rm *").unwrap();
        assert!(!result.succeeded);
        assert!(result.stderr.contains("directory not empty"), "{}", result.stderr);
        assert!(tmp.path().join("keep").join("data").is_file());
    }

    #[test]
    fn test_clustered_flags_through_dispatch() {
        let (tmp, mut sh) = dispatcher_in(HostOs::current());
        fs::create_dir_all(tmp.path().join("tree").join("sub")).unwrap();
        let result = sh.dispatch("my_rm -rf tree").unwrap();
        assert!(result.succeeded, "{}", result.stderr);
        assert!(!tmp.path().join("tree").exists());
    }

    #[test]
    fn test_history_records_failures_too() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        sh.dispatch("my_cd /definitely/not/here").unwrap();
        sh.dispatch("  my_pwd  ").unwrap();
        assert_eq!(sh.history().load_all(), ["my_cd /definitely/not/here", "my_pwd"]);

        let listing = sh.dispatch("history").unwrap();
        assert_eq!(listing.stdout, "1: my_cd /definitely/not/here\n2: my_pwd\n3: history\n");
    }

    #[test]
    fn test_unterminated_quote_is_reported() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        let result = sh.dispatch("my_echo \"oops").unwrap();
        assert!(!result.succeeded);
        assert!(result.stderr.contains("unterminated"));
    }

    #[test]
    fn test_run_without_command_is_usage_error() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        let result = sh.dispatch("my_run").unwrap();
        assert!(!result.succeeded);
        assert!(result.stderr.contains("usage"));
    }

    #[test]
    fn test_exit_and_help() {
        let (_tmp, mut sh) = dispatcher_in(HostOs::current());
        let help = sh.dispatch("help").unwrap();
        assert!(help.stdout.contains("my_ls"));
        assert!(help.stdout.contains("my_run"));
        assert!(!sh.should_exit());

        sh.dispatch("exit").unwrap();
        assert!(sh.should_exit());
    }

    #[test]
    #[cfg(unix)]
    fn test_cd_moves_system_commands() {
        let (tmp, mut sh) = dispatcher_in(HostOs::Posix);
        fs::create_dir(tmp.path().join("inner")).unwrap();
        File::create(tmp.path().join("inner").join("marker")).unwrap();

        assert!(sh.dispatch("my_cd inner").unwrap().succeeded);
        let listing = sh.dispatch("ls").unwrap();
        assert!(listing.succeeded, "{}", listing.stderr);
        assert_eq!(listing.stdout, "marker\n");
    }
}
