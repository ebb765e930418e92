use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::dispatcher::Factory;
use crate::env::ShellState;
use crate::error::ShellError;
use crate::platform::HostOs;
use crate::wildcard;
use argh::{EarlyExit, FromArgs};
use chrono::{DateTime, Local};
use std::fs::{self, File, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly against the filesystem and [`ShellState`], never through the
/// native shell.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "my_ls".
    fn name() -> &'static str;

    fn summary() -> &'static str;

    /// Letters of the switches that may be clustered, as in `-la`.
    fn short_flags() -> &'static str {
        ""
    }

    /// Expand wildcards in the positional operands. Runs after parsing, so a
    /// matched file named like a flag (`-r`) stays an operand.
    fn expand_globs(&mut self, _cwd: &Path, _host: HostOs) {}

    /// Executes the command, writing normal output to `stdout`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
        host: HostOs,
    ) -> Result<ExitCode, ShellError>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
        host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        <T as BuiltinCommand>::execute(*self, stdout, stderr, state, host)
    }
}

/// Output of the argument parser: usage errors or `--help` text.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        if self.is_error {
            writeln!(stderr, "{}", self.output.trim_end()).map_err(write_error)?;
            Ok(1)
        } else {
            writeln!(stdout, "{}", self.output.trim_end()).map_err(write_error)?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn summary(&self) -> &'static str {
        T::summary()
    }

    fn create(&self, state: &ShellState, host: HostOs, args: &[String]) -> Box<dyn ExecutableCommand> {
        let args = split_clustered_flags(args, T::short_flags());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match T::from_args(&[T::name()], &args) {
            Ok(mut cmd) => {
                cmd.expand_globs(&state.cwd, host);
                Box::new(cmd)
            }
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }
}

/// Rewrite `-la` as `-l -a` when every letter is a known switch; argh only
/// accepts one switch per argument. Nothing after `--` is touched.
fn split_clustered_flags(args: &[String], short_flags: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut operands_only = false;
    for arg in args {
        let cluster = arg.strip_prefix('-').filter(|letters| {
            !operands_only && letters.chars().count() > 1 && letters.chars().all(|c| short_flags.contains(c))
        });
        match cluster {
            Some(letters) => out.extend(letters.chars().map(|c| format!("-{c}"))),
            None => {
                operands_only |= arg == "--";
                out.push(arg.clone());
            }
        }
    }
    out
}

/// Writes go to in-memory buffers; a failure there is not tied to any path.
fn write_error(err: std::io::Error) -> ShellError {
    ShellError::from_io(Path::new("<output>"), err)
}

fn usage(text: &str) -> ShellError {
    ShellError::InvalidSyntax(format!("usage: {}", text))
}

#[derive(FromArgs)]
/// List directory contents.
pub struct Ls {
    #[argh(switch, short = 'a')]
    /// include entries whose names start with a dot.
    pub all: bool,

    #[argh(switch, short = 'l')]
    /// show type, size and modification time for each entry.
    pub long: bool,

    #[argh(positional)]
    /// directories to list; defaults to the current directory.
    pub paths: Vec<String>,
}

impl Ls {
    fn list(&self, dir: &Path, shown_as: &Path, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let meta = fs::metadata(dir).map_err(|e| ShellError::from_io(shown_as, e))?;
        if !meta.is_dir() {
            return Err(ShellError::NotADirectory(shown_as.to_path_buf()));
        }

        let mut entries: Vec<(String, Option<Metadata>)> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ShellError::from_io(shown_as, e))? {
            let entry = entry.map_err(|e| ShellError::from_io(shown_as, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.all && name.starts_with('.') {
                continue;
            }
            let meta = fs::metadata(entry.path()).or_else(|_| entry.metadata()).ok();
            entries.push((name, meta));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, meta) in entries {
            let is_dir = meta.as_ref().is_some_and(Metadata::is_dir);
            let suffix = if is_dir { "/" } else { "" };
            if self.long {
                let kind = if is_dir { 'd' } else { '-' };
                let size = meta.as_ref().map_or(0, Metadata::len);
                let modified = meta
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "?".repeat(16));
                writeln!(stdout, "{} {:>10} {} {}{}", kind, size, modified, name, suffix)
                    .map_err(write_error)?;
            } else {
                writeln!(stdout, "{}{}", name, suffix).map_err(write_error)?;
            }
        }
        Ok(())
    }
}

impl BuiltinCommand for Ls {
    fn name() -> &'static str {
        "my_ls"
    }

    fn summary() -> &'static str {
        "my_ls [-a] [-l] [path...]   list directory contents"
    }

    fn short_flags() -> &'static str {
        "al"
    }

    fn expand_globs(&mut self, cwd: &Path, host: HostOs) {
        self.paths = wildcard::expand_args(&self.paths, cwd, host);
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        if self.paths.is_empty() {
            self.list(&state.cwd, &state.cwd, stdout)?;
            return Ok(0);
        }

        let with_headers = self.paths.len() > 1;
        for (i, path) in self.paths.iter().enumerate() {
            if with_headers {
                if i > 0 {
                    writeln!(stdout).map_err(write_error)?;
                }
                writeln!(stdout, "{}:", path).map_err(write_error)?;
            }
            self.list(&state.resolve(path), Path::new(path), stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; `~`, `.` and `..` are understood. Defaults to home.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "my_cd"
    }

    fn summary() -> &'static str {
        "my_cd [dir]                 change directory (default: home)"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        let (target, shown_as) = match &self.target {
            Some(t) if !t.is_empty() => (state.resolve(t), PathBuf::from(t)),
            _ => {
                let home = state.home_dir().ok_or_else(|| {
                    ShellError::InvalidSyntax("no target and HOME not set".to_string())
                })?;
                (state.resolve(&home.to_string_lossy()), home)
            }
        };

        let meta = fs::metadata(&target).map_err(|e| ShellError::from_io(&shown_as, e))?;
        if !meta.is_dir() {
            return Err(ShellError::NotADirectory(shown_as));
        }
        state.cwd = target;
        writeln!(stdout, "[INFO] Changed directory to {}", state.cwd.display()).map_err(write_error)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "my_pwd"
    }

    fn summary() -> &'static str {
        "my_pwd                      show current directory"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        writeln!(stdout, "{}", state.cwd.to_string_lossy()).map_err(write_error)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create a directory. The parent directory must already exist.
pub struct Mkdir {
    #[argh(positional)]
    /// directory to create.
    pub dir: String,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "my_mkdir"
    }

    fn summary() -> &'static str {
        "my_mkdir <dir>              create directory"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        let target = state.resolve(&self.dir);
        let shown_as = PathBuf::from(&self.dir);

        if fs::symlink_metadata(&target).is_ok() {
            return Err(ShellError::AlreadyExists(shown_as));
        }
        if let Some(parent) = target.parent() {
            if !parent.is_dir() {
                let shown_parent = shown_as
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map_or_else(|| parent.to_path_buf(), Path::to_path_buf);
                return Err(ShellError::ParentNotFound(shown_parent));
            }
        }
        fs::create_dir(&target).map_err(|e| ShellError::from_io(&shown_as, e))?;
        writeln!(stdout, "[INFO] Directory '{}' created.", self.dir).map_err(write_error)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create empty files, or set the modification time of existing ones to now.
pub struct Touch {
    #[argh(positional)]
    /// files to create or refresh.
    pub files: Vec<String>,
}

impl BuiltinCommand for Touch {
    fn name() -> &'static str {
        "my_touch"
    }

    fn summary() -> &'static str {
        "my_touch <file...>          create file or update its timestamp"
    }

    fn expand_globs(&mut self, cwd: &Path, host: HostOs) {
        self.files = wildcard::expand_args(&self.files, cwd, host);
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        if self.files.is_empty() {
            return Err(usage("my_touch <file>..."));
        }
        for name in &self.files {
            let path = state.resolve(name);
            let shown_as = Path::new(name);
            let file = if path.is_dir() {
                File::open(&path)
            } else {
                File::options().create(true).append(true).open(&path)
            }
            .map_err(|e| ShellError::from_io(shown_as, e))?;
            file.set_modified(SystemTime::now())
                .map_err(|e| ShellError::from_io(shown_as, e))?;
            writeln!(stdout, "[INFO] File '{}' created or updated.", name).map_err(write_error)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove files, or directories with -r.
/// Without -r only empty directories are removed.
pub struct Rm {
    #[argh(switch, short = 'r')]
    /// remove directories and their contents recursively.
    pub recursive: bool,

    #[argh(switch, short = 'f')]
    /// ignore targets that do not exist.
    pub force: bool,

    #[argh(positional)]
    /// files or directories to remove.
    pub targets: Vec<String>,
}

impl Rm {
    fn remove(&self, path: &Path, shown_as: &Path, stdout: &mut dyn Write) -> Result<(), ShellError> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if self.force && e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ShellError::from_io(shown_as, e)),
        };

        let removed = if !meta.is_dir() {
            fs::remove_file(path)
        } else if self.recursive {
            fs::remove_dir_all(path)
        } else {
            let mut entries = fs::read_dir(path).map_err(|e| ShellError::from_io(shown_as, e))?;
            if entries.next().is_some() {
                return Err(ShellError::DirectoryNotEmpty(shown_as.to_path_buf()));
            }
            fs::remove_dir(path)
        };
        removed.map_err(|e| ShellError::from_io(shown_as, e))?;

        let kind = if meta.is_dir() { "Directory" } else { "File" };
        writeln!(stdout, "[INFO] {} '{}' removed.", kind, shown_as.display()).map_err(write_error)
    }
}

impl BuiltinCommand for Rm {
    fn name() -> &'static str {
        "my_rm"
    }

    fn summary() -> &'static str {
        "my_rm [-r] [-f] <target...> remove files (-r: directories recursively)"
    }

    fn short_flags() -> &'static str {
        "rf"
    }

    fn expand_globs(&mut self, cwd: &Path, host: HostOs) {
        self.targets = wildcard::expand_args(&self.targets, cwd, host);
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        if self.targets.is_empty() {
            return Err(usage("my_rm [-r] <target>..."));
        }
        for target in &self.targets {
            self.remove(&state.resolve(target), Path::new(target), stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "my_clear"
    }

    fn summary() -> &'static str {
        "my_clear                    clear the screen"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        // erase display, then cursor home
        write!(stdout, "\x1b[2J\x1b[H").map_err(write_error)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set environment variables for commands started from this shell.
pub struct Set {
    #[argh(positional)]
    /// assignments of the form VAR=value.
    pub assignments: Vec<String>,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "my_set"
    }

    fn summary() -> &'static str {
        "my_set VAR=value...         set environment variable"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        if self.assignments.is_empty() {
            return Err(usage("my_set VAR=value"));
        }

        let mut parsed = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            match assignment.split_once('=') {
                Some((name, value)) if !name.is_empty() => parsed.push((name, value)),
                _ => {
                    return Err(ShellError::InvalidSyntax(format!(
                        "invalid format: {}. Use VAR=value",
                        assignment
                    )));
                }
            }
        }
        for (name, value) in parsed {
            writeln!(stdout, "[INFO] Set {}={}", name, value).map_err(write_error)?;
            state.set_var(name, value);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the value of an environment variable.
pub struct Get {
    #[argh(positional)]
    /// name of the variable.
    pub name: String,
}

impl BuiltinCommand for Get {
    fn name() -> &'static str {
        "my_get"
    }

    fn summary() -> &'static str {
        "my_get VAR                  print environment variable"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        let written = match state.get_var(&self.name) {
            Some(value) => writeln!(stdout, "{}", value),
            None => writeln!(stderr, "{} is not set", self.name),
        };
        written.map_err(write_error)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "my_echo"
    }

    fn summary() -> &'static str {
        "my_echo [-n] <text...>      print text"
    }

    fn short_flags() -> &'static str {
        "n"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
        _host: HostOs,
    ) -> Result<ExitCode, ShellError> {
        let s = self.args.join(" ");
        let written = if self.no_newline {
            write!(stdout, "{}", s)
        } else {
            writeln!(stdout, "{}", s)
        };
        written.map_err(write_error)?;
        Ok(0)
    }
}
