use minishell::Dispatcher;
use minishell::config::{self, Args};
use minishell::env::ShellState;
use minishell::error::ShellError;
use minishell::history::{History, InMemoryHistory};
use minishell::platform::{self, HostOs};
use minishell::repl::{self, Repl};
use std::env;
use std::io;
use std::process::ExitCode;
use tracing::{debug, warn};

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| args.log_level().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("minishell: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    if let Err(err) = platform::install_interrupt_guard() {
        warn!("Ctrl-C will stop the shell itself: {:#}", err);
    }

    let history: Box<dyn History> = match args.open_history() {
        Ok(history) => history,
        Err(err) => {
            warn!("history disabled: {:#}", err);
            Box::new(InMemoryHistory::new())
        }
    };
    let host = HostOs::current();
    debug!(%host, "starting");
    let mut dispatcher = Dispatcher::new(ShellState::new(), host, history);

    let Some(line) = args.command else {
        Repl::new(dispatcher).run()?;
        return Ok(ExitCode::SUCCESS);
    };

    let result = match dispatcher.dispatch(&line) {
        Ok(result) => result,
        Err(ShellError::EmptyInput) => return Ok(ExitCode::SUCCESS),
        Err(err) => err.into(),
    };
    repl::render(&result, &mut io::stdout().lock(), &mut io::stderr().lock())?;
    Ok(ExitCode::from(config::process_exit_code(result.exit_code)))
}
