//! Command history storage.
//!
//! The dispatcher appends every non-empty line; the REPL loads the stored
//! entries into the line editor for recall, and `history` prints them.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default history file name, placed in the home directory.
pub const DEFAULT_HISTORY_FILE: &str = ".minishell_history";

/// Maximum number of history entries to keep by default.
pub const MAX_HISTORY_ENTRIES: usize = 100;

pub trait History {
    fn append(&mut self, line: &str) -> Result<()>;

    fn load_all(&self) -> Vec<String>;
}

/// History kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: Vec<String>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl History for InMemoryHistory {
    fn append(&mut self, line: &str) -> Result<()> {
        self.entries.push(line.to_string());
        Ok(())
    }

    fn load_all(&self) -> Vec<String> {
        self.entries.clone()
    }
}

/// History persisted to a plain text file, one entry per line.
pub struct FileHistory {
    path: PathBuf,
    entries: VecDeque<String>,
    max_size: usize,
    /// The file's last line has no terminating newline yet.
    unterminated: bool,
}

impl FileHistory {
    /// Open (or create) the history file and load its last `max_size` lines.
    ///
    /// An oversized file is rewritten with only the kept entries.
    pub fn open(path: impl Into<PathBuf>, max_size: usize) -> Result<Self> {
        let path = path.into();
        let mut entries = VecDeque::new();
        let mut total = 0;
        let mut unterminated = false;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("can't read history file {}", path.display()))?;
            unterminated = !contents.is_empty() && !contents.ends_with('\n');
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                total += 1;
                entries.push_back(line.to_string());
                if entries.len() > max_size {
                    entries.pop_front();
                }
            }
        }

        let mut history = Self {
            path,
            entries,
            max_size,
            unterminated,
        };
        if total > max_size {
            history.rewrite()?;
            history.unterminated = false;
        }
        Ok(history)
    }

    /// `~/.minishell_history`, or `None` when there is no home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self) -> Result<()> {
        let mut contents = self.entries.iter().cloned().collect::<Vec<_>>().join("\n");
        contents.push('\n');
        fs::write(&self.path, contents)
            .with_context(|| format!("can't write history file {}", self.path.display()))
    }
}

impl History for FileHistory {
    fn append(&mut self, line: &str) -> Result<()> {
        // multi-line entries would split into several on reload
        let line = line.replace(['\r', '\n'], " ");
        self.entries.push_back(line.clone());
        if self.entries.len() > self.max_size {
            self.entries.pop_front();
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("can't open history file {}", self.path.display()))?;
        let separator = if self.unterminated { "\n" } else { "" };
        writeln!(file, "{}{}", separator, line)
            .with_context(|| format!("can't append to {}", self.path.display()))?;
        self.unterminated = false;
        Ok(())
    }

    fn load_all(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}
