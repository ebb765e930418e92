use crate::env::ShellState;
use crate::error::ShellError;
use crate::platform::HostOs;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// [`crate::external::SPAWN_FAILURE`] marks a command that never started.
pub type ExitCode = i32;

/// Uniform outcome of one dispatched line, whatever produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: ExitCode,
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn from_output(exit_code: ExitCode, stdout: String, stderr: String) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            succeeded: exit_code == 0,
        }
    }

    pub fn success(stdout: impl Into<String>) -> Self {
        Self::from_output(0, stdout.into(), String::new())
    }

    pub fn failure(exit_code: ExitCode, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            succeeded: false,
        }
    }
}

impl From<ShellError> for ExecutionResult {
    fn from(err: ShellError) -> Self {
        ExecutionResult::failure(1, err.to_string())
    }
}

/// Object-safe trait for a parsed built-in ready to run.
pub trait ExecutableCommand {
    /// Run against the shell state, writing output into the given buffers.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
        host: HostOs,
    ) -> Result<ExitCode, ShellError>;
}

/// Registry entry for one built-in name.
///
/// The dispatcher keeps a fixed list of factories and asks the one whose
/// [`name`](CommandFactory::name) equals the first token to build the command
/// from the remaining arguments.
pub trait CommandFactory {
    fn name(&self) -> &'static str;

    /// One-line description shown by `help`.
    fn summary(&self) -> &'static str;

    /// Parse `args` into a runnable command. Usage errors and `--help` also
    /// come back as a command that prints the parser's message.
    fn create(&self, state: &ShellState, host: HostOs, args: &[String]) -> Box<dyn ExecutableCommand>;
}
