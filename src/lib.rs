//! A small cross-platform interactive shell.
//!
//! Users type Unix-style commands once and they work on both Posix and
//! Windows hosts. Commands fall into two groups: built-ins prefixed with `my_`
//! (`my_ls`, `my_cd`, `my_rm`, ...) that run in-process against an explicit
//! [`env::ShellState`], and everything else, which is wildcard-expanded,
//! translated to the host's native vocabulary and run as a child process.
//!
//! The main entry point is [`Dispatcher`], which turns one input line into an
//! [`command::ExecutionResult`]. The [`repl`] module wraps it in a line editor,
//! and [`history`] provides the stores it records lines into.

mod builtin;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod external;
pub mod history;
pub mod lexer;
pub mod platform;
pub mod repl;
pub mod translate;
pub mod wildcard;

/// Just a convenient re-export of the line dispatcher.
///
/// See [`Dispatcher`] for the high-level API and examples.
pub use dispatcher::Dispatcher;
