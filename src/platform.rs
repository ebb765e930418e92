//! Host operating system detection and the Ctrl-C guard.

use std::fmt;

/// Family of native shell the pass-through commands end up in.
///
/// Detected once at startup with [`HostOs::current`] and passed explicitly to
/// the translator, the wildcard expander and the execution engine, so both
/// branches can be tested on any machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Posix,
    Windows,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            HostOs::Windows
        } else {
            HostOs::Posix
        }
    }

    /// Whether file names compare case-insensitively on this host.
    pub fn case_insensitive_names(self) -> bool {
        self == HostOs::Windows
    }

    /// Characters that separate path segments in user input.
    pub fn is_separator(self, c: char) -> bool {
        match self {
            HostOs::Posix => c == '/',
            HostOs::Windows => c == '/' || c == '\\',
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOs::Windows => f.write_str("Windows"),
            HostOs::Posix if cfg!(target_os = "macos") => f.write_str("Darwin"),
            HostOs::Posix => f.write_str("Linux"),
        }
    }
}

/// Keep the shell alive when Ctrl-C is pressed while a child runs.
///
/// On unix a no-op SIGINT handler is installed. Unlike an ignored disposition,
/// a handler is reset to the default on exec, so the child still dies on
/// Ctrl-C while the shell survives.
#[cfg(unix)]
pub fn install_interrupt_guard() -> anyhow::Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    extern "C" fn on_interrupt(_signal: nix::libc::c_int) {}

    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler does nothing, so it is trivially async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }?;
    Ok(())
}

/// Keep the shell alive when Ctrl-C is pressed while a child runs.
///
/// The console delivers CTRL_C_EVENT to every attached process; the handler
/// swallows it for the shell and leaves the child to the default behavior.
#[cfg(windows)]
pub fn install_interrupt_guard() -> anyhow::Result<()> {
    use windows_sys::Win32::System::Console::{CTRL_C_EVENT, SetConsoleCtrlHandler};

    unsafe extern "system" fn on_ctrl(ctrl_type: u32) -> i32 {
        if ctrl_type == CTRL_C_EVENT { 1 } else { 0 }
    }

    // SAFETY: registering a plain function pointer with static lifetime.
    let ok = unsafe { SetConsoleCtrlHandler(Some(on_ctrl), 1) };
    if ok == 0 {
        anyhow::bail!("SetConsoleCtrlHandler failed: {}", std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
pub fn install_interrupt_guard() -> anyhow::Result<()> {
    Ok(())
}
