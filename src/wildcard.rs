//! Filesystem wildcard expansion for argument tokens.
//!
//! Only `*` and `?` are special. A pattern is expanded against the entries of
//! a single directory: the current directory, or the literal directory prefix
//! written in front of the pattern (`src/*.rs`). Wildcards in that prefix are
//! not expanded.

use crate::error::ShellError;
use crate::platform::HostOs;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::Path;
use tracing::debug;

pub fn is_glob(token: &str) -> bool {
    token.contains(['*', '?'])
}

/// Expand one token.
///
/// A token without wildcards comes back unchanged. Matches are sorted by file
/// name. Zero matches is [`ShellError::NoGlobMatch`].
pub fn expand(token: &str, cwd: &Path, host: HostOs) -> Result<Vec<String>, ShellError> {
    if !is_glob(token) {
        return Ok(vec![token.to_string()]);
    }

    let split_at = token
        .char_indices()
        .filter(|&(_, c)| host.is_separator(c))
        .map(|(i, c)| i + c.len_utf8())
        .last();
    let (prefix, file_pattern) = match split_at {
        Some(i) => token.split_at(i),
        None => ("", token),
    };

    if file_pattern.is_empty() || is_glob(prefix) {
        return Err(ShellError::NoGlobMatch(token.to_string()));
    }

    let dir = if prefix.is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(prefix)
    };
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Err(ShellError::NoGlobMatch(token.to_string())),
    };

    let re = compile(file_pattern, host)?;
    let show_hidden = file_pattern.starts_with('.');
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| match entry.file_name().into_string() {
            Ok(name) => Some(name),
            Err(raw) => {
                debug!(name = ?raw, "skipping non-UTF-8 file name");
                None
            }
        })
        .filter(|name| show_hidden || !name.starts_with('.'))
        .filter(|name| re.is_match(name))
        .collect();

    if names.is_empty() {
        return Err(ShellError::NoGlobMatch(token.to_string()));
    }
    names.sort();
    Ok(names.into_iter().map(|name| format!("{prefix}{name}")).collect())
}

/// Expand every token, keeping a pattern that matches nothing as a literal.
pub fn expand_args(tokens: &[String], cwd: &Path, host: HostOs) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        match expand(token, cwd, host) {
            Ok(expanded) => out.extend(expanded),
            Err(err) => {
                debug!(%err, "passing pattern through unexpanded");
                out.push(token.clone());
            }
        }
    }
    out
}

/// Translate a single-segment glob into an anchored regex.
fn compile(pattern: &str, host: HostOs) -> Result<Regex, ShellError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if c == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(host.case_insensitive_names())
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| ShellError::InvalidSyntax(format!("bad pattern {pattern}: {e}")))
}
