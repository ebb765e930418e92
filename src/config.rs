//! Command-line configuration for the `minishell` binary.

use crate::history::{FileHistory, History, InMemoryHistory, MAX_HISTORY_ENTRIES};
use anyhow::{Context, Result};
use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// A small cross-platform interactive shell with unified Unix-style commands.
pub struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its exit code.
    pub command: Option<String>,

    #[argh(option)]
    /// history file to use instead of ~/.minishell_history.
    pub history_file: Option<PathBuf>,

    #[argh(option, default = "MAX_HISTORY_ENTRIES")]
    /// number of history entries to keep.
    pub history_size: usize,

    #[argh(switch)]
    /// keep history in memory only.
    pub no_history: bool,

    #[argh(switch, short = 'v')]
    /// log routing and spawn decisions to stderr.
    pub verbose: bool,
}

impl Args {
    /// Filter directive for the log subscriber when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }

    /// Open the history store this configuration asks for.
    pub fn open_history(&self) -> Result<Box<dyn History>> {
        if self.no_history {
            return Ok(Box::new(InMemoryHistory::new()));
        }
        let path = match &self.history_file {
            Some(path) => path.clone(),
            None => FileHistory::default_path().context("no home directory for the history file")?,
        };
        let history = FileHistory::open(path, self.history_size)?;
        Ok(Box::new(history))
    }
}

/// Map a command's exit code onto a process exit status.
///
/// A command that never started (negative code) reports plain failure.
pub fn process_exit_code(code: i32) -> u8 {
    if code < 0 {
        1
    } else {
        code.min(255) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::from_args(&["minishell"], &[]).unwrap();
        assert_eq!(args.command, None);
        assert_eq!(args.history_size, MAX_HISTORY_ENTRIES);
        assert!(!args.no_history);
        assert_eq!(args.log_level(), "warn");
    }

    #[test]
    fn test_one_shot_and_verbose() {
        let args = Args::from_args(&["minishell"], &["-c", "my_pwd", "-v", "--history-size", "5"]).unwrap();
        assert_eq!(args.command.as_deref(), Some("my_pwd"));
        assert_eq!(args.history_size, 5);
        assert_eq!(args.log_level(), "debug");
    }

    #[test]
    fn test_history_file_option() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hist");
        let args = Args::from_args(&["minishell"], &["--history-file", path.to_str().unwrap()]).unwrap();
        let mut history = args.open_history().unwrap();
        history.append("my_ls").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "my_ls\n");
    }

    #[test]
    fn test_no_history_stays_in_memory() {
        let args = Args::from_args(&["minishell"], &["--no-history"]).unwrap();
        let mut history = args.open_history().unwrap();
        history.append("x").unwrap();
        assert_eq!(history.load_all(), ["x"]);
    }

    #[test]
    fn test_process_exit_code() {
        assert_eq!(process_exit_code(0), 0);
        assert_eq!(process_exit_code(3), 3);
        assert_eq!(process_exit_code(-1), 1);
        assert_eq!(process_exit_code(300), 255);
    }
}
