use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Component, Path, PathBuf};

/// Process-like state the shell works against.
///
/// The current directory and the variables live here instead of in the real
/// process globals: built-ins mutate this struct, and every spawned child gets
/// `cwd` as its working directory and `vars` as its complete environment.
#[derive(Debug, Clone)]
pub struct ShellState {
    /// Environment variables visible to spawned commands.
    pub vars: HashMap<String, String>,
    /// Directory relative paths are resolved against.
    pub cwd: PathBuf,
    /// Set by `exit`; the REPL stops once this is true.
    pub should_exit: bool,
}

impl ShellState {
    /// Capture the current process environment and working directory.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let cwd = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with(cwd, vars)
    }

    pub fn with(cwd: PathBuf, vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            cwd,
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Home directory: `HOME`, then `USERPROFILE`, then the platform default.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .or_else(|| self.get_var("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    }

    /// Turn user input into an absolute, lexically normalized path.
    ///
    /// `~` and `~/...` expand to the home directory, relative paths are joined
    /// onto `cwd`, and `.`/`..` are folded without touching the filesystem.
    pub fn resolve(&self, input: &str) -> PathBuf {
        let expanded = match input.strip_prefix('~') {
            Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
                match self.home_dir() {
                    Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                    None => PathBuf::from(input),
                }
            }
            _ => PathBuf::from(input),
        };
        let joined = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };
        normalize(&joined)
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // popping the root is a no-op, so `/..` stays `/`
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
