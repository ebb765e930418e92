//! Rewriting Unix-style pass-through commands into their native form.
//!
//! On a Posix host this is the identity. On Windows the first token is looked
//! up in [`RULES`] and, when found, the rule rebuilds the whole token sequence
//! (command name plus translated flags). Anything unmapped is forwarded
//! verbatim; if it is not a valid native command the error comes from the
//! execution engine.

use crate::platform::HostOs;
use tracing::debug;

/// One Unix command name and the function producing its Windows form.
pub struct TranslationRule {
    pub unix_name: &'static str,
    pub windows: fn(&[String]) -> Vec<String>,
}

pub static RULES: &[TranslationRule] = &[
    TranslationRule { unix_name: "ls", windows: ls },
    TranslationRule { unix_name: "cat", windows: cat },
    TranslationRule { unix_name: "rm", windows: rm },
    TranslationRule { unix_name: "cp", windows: cp },
    TranslationRule { unix_name: "mv", windows: mv },
    TranslationRule { unix_name: "clear", windows: clear },
    TranslationRule { unix_name: "pwd", windows: pwd },
    TranslationRule { unix_name: "grep", windows: grep },
];

pub fn lookup(name: &str) -> Option<&'static TranslationRule> {
    RULES.iter().find(|rule| rule.unix_name == name)
}

pub fn translate(tokens: Vec<String>, host: HostOs) -> Vec<String> {
    if host == HostOs::Posix {
        return tokens;
    }
    let Some((name, args)) = tokens.split_first() else {
        return tokens;
    };
    match lookup(name) {
        Some(rule) => {
            let translated = (rule.windows)(args);
            debug!(from = ?tokens, to = ?translated, "translated command");
            translated
        }
        None => tokens,
    }
}

fn native(command: &str, fixed: &[&str], rest: &[String]) -> Vec<String> {
    std::iter::once(command)
        .chain(fixed.iter().copied())
        .map(str::to_string)
        .chain(rest.iter().cloned())
        .collect()
}

/// Split `args` into single-letter flags (`-la` gives `l`, `a`) and operands.
/// A bare `-` or anything after `--` is an operand.
fn split_flags(args: &[String]) -> (Vec<char>, Vec<String>) {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut only_operands = false;
    for arg in args {
        if only_operands {
            operands.push(arg.clone());
        } else if arg == "--" {
            only_operands = true;
        } else if let Some(letters) = arg.strip_prefix('-').filter(|l| !l.is_empty()) {
            flags.extend(letters.chars());
        } else {
            operands.push(arg.clone());
        }
    }
    (flags, operands)
}

/// Map flag letters to switches; letters without a mapping are dropped.
fn switches(flags: &[char], table: &[(char, &'static str)]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for flag in flags {
        if let Some(&(_, switch)) = table.iter().find(|(letter, _)| letter == flag) {
            if !out.contains(&switch) {
                out.push(switch);
            }
        }
    }
    out
}

// `dir` always prints the long form, so `-l` has no counterpart.
fn ls(args: &[String]) -> Vec<String> {
    let (flags, operands) = split_flags(args);
    native("dir", &switches(&flags, &[('a', "/A"), ('R', "/S")]), &operands)
}

fn cat(args: &[String]) -> Vec<String> {
    native("type", &[], args)
}

fn mv(args: &[String]) -> Vec<String> {
    native("move", &[], args)
}

fn clear(_args: &[String]) -> Vec<String> {
    native("cls", &[], &[])
}

// `cd` without arguments prints the current directory on Windows.
fn pwd(_args: &[String]) -> Vec<String> {
    native("cd", &[], &[])
}

fn rm(args: &[String]) -> Vec<String> {
    let (flags, operands) = split_flags(args);
    if flags.iter().any(|f| matches!(f, 'r' | 'R')) {
        native("rmdir", &["/S", "/Q"], &operands)
    } else {
        native("del", &["/Q"], &operands)
    }
}

fn cp(args: &[String]) -> Vec<String> {
    let (flags, operands) = split_flags(args);
    if flags.iter().any(|f| matches!(f, 'r' | 'R')) {
        native("xcopy", &["/E", "/I", "/Y"], &operands)
    } else {
        native("copy", &[], &operands)
    }
}

fn grep(args: &[String]) -> Vec<String> {
    let (flags, operands) = split_flags(args);
    native(
        "findstr",
        &switches(&flags, &[('i', "/I"), ('n', "/N"), ('v', "/V")]),
        &operands,
    )
}
