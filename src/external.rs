//! Execution engine for pass-through commands.

use crate::command::{ExecutionResult, ExitCode};
use crate::env::ShellState;
use crate::error::ShellError;
use crate::platform::HostOs;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use tracing::debug;

/// Exit code reported when the child could not be started at all.
pub const SPAWN_FAILURE: ExitCode = -1;

/// Extensions tried when `PATHEXT` is unset.
const DEFAULT_PATHEXT: &str = ".COM;.EXE;.BAT;.CMD";

/// Commands cmd.exe implements itself; they have no file to look up.
const CMD_BUILTINS: &[&str] = &[
    "assoc", "break", "call", "cd", "chdir", "cls", "color", "copy", "date", "del", "dir", "echo",
    "endlocal", "erase", "for", "ftype", "goto", "if", "md", "mkdir", "mklink", "move", "path",
    "pause", "popd", "prompt", "pushd", "rd", "rem", "ren", "rename", "rmdir", "set", "setlocal",
    "shift", "start", "time", "title", "type", "ver", "verify", "vol",
];

/// Characters cmd.exe treats as operators outside double quotes.
const CMD_METACHARS: &[char] = &['&', '|', '<', '>', '^', '(', ')'];

/// Run `tokens` as a native command and capture the outcome.
///
/// Never fails: a command that cannot be spawned yields a result with
/// [`SPAWN_FAILURE`] and a diagnostic on stderr.
pub fn execute(tokens: &[String], state: &ShellState, host: HostOs) -> ExecutionResult {
    match spawn(tokens, state, host) {
        Ok(output) => ExecutionResult::from_output(
            exit_code(output.status),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Err(err) => {
            debug!(%err, "spawn failed");
            ExecutionResult::failure(SPAWN_FAILURE, err.to_string())
        }
    }
}

fn spawn(tokens: &[String], state: &ShellState, host: HostOs) -> Result<Output, ShellError> {
    let (name, args) = tokens
        .split_first()
        .ok_or_else(|| ShellError::InvalidSyntax("no command given".to_string()))?;

    let not_found = || ShellError::Spawn {
        program: name.clone(),
        reason: "command not found".to_string(),
    };

    let mut cmd = match host {
        // dir, type, del and friends are cmd.exe built-ins, not programs
        HostOs::Windows => {
            if !is_cmd_builtin(name) {
                let search_paths = host_var(state, host, "PATH").unwrap_or_default();
                let extensions = host_var(state, host, "PATHEXT").unwrap_or(DEFAULT_PATHEXT);
                find_windows_program(OsStr::new(search_paths), extensions, &state.cwd, Path::new(name))
                    .ok_or_else(not_found)?;
            }
            cmd_invocation(tokens)
        }
        HostOs::Posix => {
            let search_paths = host_var(state, host, "PATH").unwrap_or_default();
            let program = find_command_path(OsStr::new(search_paths), &state.cwd, Path::new(name))
                .ok_or_else(not_found)?;
            let mut cmd = Command::new(&*program);
            cmd.args(args);
            cmd
        }
    };

    debug!(?cmd, cwd = %state.cwd.display(), "spawning");
    let child = cmd
        .env_clear()
        .envs(&state.vars)
        .current_dir(&state.cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ShellError::Spawn {
            program: name.clone(),
            reason: e.to_string(),
        })?;

    child.wait_with_output().map_err(|e| ShellError::Spawn {
        program: name.clone(),
        reason: e.to_string(),
    })
}

/// Variable lookup; names are case-insensitive on Windows (`Path`, `PATH`).
fn host_var<'a>(state: &'a ShellState, host: HostOs, key: &str) -> Option<&'a str> {
    match host {
        HostOs::Posix => state.get_var(key),
        HostOs::Windows => state
            .vars
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str()),
    }
}

fn is_cmd_builtin(name: &str) -> bool {
    CMD_BUILTINS.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// `cmd /S /C "<line>"` with the line passed verbatim.
fn cmd_invocation(tokens: &[String]) -> Command {
    let line = cmd_command_line(tokens);
    let mut cmd = Command::new("cmd");
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.raw_arg(format!("/S /C \"{}\"", line));
    }
    #[cfg(not(windows))]
    {
        cmd.arg("/C").arg(line);
    }
    cmd
}

/// Build the command line cmd.exe should run so every token reaches the
/// program as one argument and no token acts as an operator.
///
/// Tokens are quoted the way the MSVC runtime splits arguments, then every
/// metacharacter cmd would see outside double quotes gets a caret.
pub fn cmd_command_line(tokens: &[String]) -> String {
    let quoted: Vec<String> = tokens.iter().map(|t| quote_arg(t)).collect();
    let line = quoted.join(" ");

    let mut out = String::with_capacity(line.len() + 8);
    let mut in_quotes = false;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && CMD_METACHARS.contains(&c) {
            out.push('^');
        }
        out.push(c);
    }
    out
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '\n', '\x0b', '"']) {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        let escapes = if c == '"' { backslashes * 2 + 1 } else { backslashes };
        out.extend(std::iter::repeat_n('\\', escapes));
        backslashes = 0;
        out.push(c);
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}

/// Resolve a program the way cmd.exe does: the current directory first,
/// then each PATH entry, trying the `PATHEXT` extensions when the name has
/// none. A name with a separator is only looked up relative to `cwd`.
pub fn find_windows_program(search_paths: &OsStr, extensions: &str, cwd: &Path, name: &Path) -> Option<PathBuf> {
    let try_base = |base: PathBuf| -> Option<PathBuf> {
        if base.extension().is_some() && base.is_file() {
            return Some(base);
        }
        extensions
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                let mut candidate = base.clone().into_os_string();
                candidate.push(ext);
                PathBuf::from(candidate)
            })
            .find(|candidate| candidate.is_file())
    };

    if name.as_os_str().is_empty() {
        return None;
    }
    if name.components().count() > 1 || name.is_absolute() {
        return try_base(cwd.join(name));
    }
    std::iter::once(cwd.to_path_buf())
        .chain(std::env::split_paths(search_paths))
        .find_map(|dir| try_base(dir.join(name)))
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - Relative path with a separator (`bin/tool`, `./run.sh`): resolved against
///   `cwd`, returned if it exists.
/// - Single component: each directory of `search_paths` (PATH) is tried.
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, cwd: &Path, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, _) => None,
        (Some(std::path::Component::Normal(x)), None) => find_in_path(search_paths, x).map(Cow::Owned),
        _ => {
            let joined = cwd.join(path);
            find_by_path(&joined).map(|p| Cow::Owned(p.to_path_buf()))
        }
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if path.is_file() {
            return Some(path);
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    #[cfg(unix)]
    fn test_captures_stdout_and_exit_code() {
        let state = ShellState::new();
        let result = execute(&strings(&["sh", "-c", "echo out; echo err >&2; exit 3"]), &state, HostOs::Posix);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded);
    }

    #[test]
    #[cfg(unix)]
    fn test_child_sees_state_cwd_and_vars() {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = ShellState::new();
        state.cwd = tmp.path().to_path_buf();
        state.set_var("MINISHELL_PROBE", "42");

        let result = execute(&strings(&["sh", "-c", "pwd; echo $MINISHELL_PROBE"]), &state, HostOs::Posix);
        assert!(result.succeeded);
        let mut lines = result.stdout.lines();
        let printed = PathBuf::from(lines.next().unwrap());
        assert_eq!(
            std::fs::canonicalize(printed).unwrap(),
            std::fs::canonicalize(tmp.path()).unwrap()
        );
        assert_eq!(lines.next(), Some("42"));
    }

    #[test]
    fn test_missing_program_is_sentinel_failure() {
        let state = ShellState::new();
        let result = execute(&strings(&["doesnotexist123"]), &state, HostOs::current());
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, SPAWN_FAILURE);
        assert!(result.stderr.contains("doesnotexist123"));
    }

    #[test]
    fn test_cmd_line_escapes_operators_outside_quotes() {
        assert_eq!(cmd_command_line(&strings(&["findstr", "a&b", "f"])), "findstr a^&b f");
        assert_eq!(
            cmd_command_line(&strings(&["findstr", "two words", "x|y>z"])),
            r#"findstr "two words" x^|y^>z"#
        );
        // inside quotes cmd leaves operators alone
        assert_eq!(cmd_command_line(&strings(&["echo", "a & b"])), r#"echo "a & b""#);
        // an escaped quote flips cmd's view of quoting
        assert_eq!(cmd_command_line(&strings(&["x", r#"a"&b"#])), r#"x "a\"^&b""#);
    }

    #[test]
    fn test_quote_arg_backslashes() {
        assert_eq!(quote_arg(r"C:\dir\"), r"C:\dir\");
        assert_eq!(quote_arg(r"C:\my dir\"), r#""C:\my dir\\""#);
        assert_eq!(quote_arg(""), r#""""#);
    }

    #[test]
    fn test_cmd_builtins_are_case_insensitive() {
        assert!(is_cmd_builtin("DIR"));
        assert!(is_cmd_builtin("type"));
        assert!(!is_cmd_builtin("findstr"));
    }

    #[test]
    fn test_windows_program_lookup_uses_pathext() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = tmp.path().join("bin");
        let work = tmp.path().join("work");
        std::fs::create_dir(&bin).unwrap();
        std::fs::create_dir(&work).unwrap();
        File::create(bin.join("tool.exe")).unwrap();
        File::create(work.join("local.bat")).unwrap();

        let search = bin.clone().into_os_string();
        let exts = ".com;.exe;.bat";
        assert_eq!(find_windows_program(&search, exts, &work, Path::new("tool")), Some(bin.join("tool.exe")));
        assert_eq!(
            find_windows_program(&search, exts, &work, Path::new("tool.exe")),
            Some(bin.join("tool.exe"))
        );
        assert_eq!(find_windows_program(&search, exts, &work, Path::new("local")), Some(work.join("local.bat")));
        assert_eq!(find_windows_program(&search, exts, &work, Path::new("doesnotexist123")), None);
    }

    #[test]
    fn test_windows_vars_ignore_case() {
        let mut state = ShellState::with(PathBuf::from("/"), Default::default());
        state.set_var("Path", "C:\\bin");
        assert_eq!(host_var(&state, HostOs::Windows, "PATH"), Some("C:\\bin"));
        assert_eq!(host_var(&state, HostOs::Posix, "PATH"), None);
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let found = find_command_path(OsStr::new("/bin"), Path::new("/"), path).unwrap();
        assert_eq!(found.as_ref(), path);
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = find_command_path(OsStr::new("/nonexistent:/bin"), Path::new("/"), Path::new("sh"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found.as_ref(), Path::new("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_not_found_in_path() {
        let res = find_command_path(OsStr::new("/bin"), Path::new("/"), Path::new("nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    fn relative_with_separator_uses_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("bin")).unwrap();
        File::create(tmp.path().join("bin").join("tool")).unwrap();

        let found = find_command_path(OsStr::new(""), tmp.path(), Path::new("./bin/tool"))
            .expect("Expected to find ./bin/tool under cwd");
        assert!(found.as_ref().ends_with("bin/tool"));
        assert!(found.as_ref().starts_with(tmp.path()));
    }

    #[test]
    fn empty_path_is_none() {
        assert!(find_command_path(OsStr::new("/bin"), Path::new("/"), Path::new("")).is_none());
    }
}
