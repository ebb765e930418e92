//! Splitting an input line into argument tokens.
//!
//! Tokens are separated by unquoted whitespace. Single and double quotes group
//! text into one token and are removed. A backslash outside single quotes
//! escapes a following whitespace, quote or backslash; any other backslash is
//! kept literally so Windows paths like `C:\Users` survive.

use std::fmt;

/// Errors that can occur while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote(char),
}

impl fmt::Display for LexingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexingError::UnfinishedQuote(q) => write!(f, "unterminated {} quote", q),
        }
    }
}

impl std::error::Error for LexingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    /// Set once any character (or an empty quoted pair) belongs to the word.
    in_word: bool,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            in_word: false,
        }
    }

    fn make_tokens(&mut self) -> Result<Vec<String>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexingError::UnfinishedQuote('\'')),
            LexingState::ReadingDoubleQuote => return Err(LexingError::UnfinishedQuote('"')),
            _ => {}
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if c.is_whitespace() => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.in_word = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.in_word = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => {
                self.push_escaped(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'));
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => self.push_escaped(|c| matches!(c, '"' | '\\')),
            c => self.push(c),
        }
    }

    /// Called after a backslash: consume the next char if it is escapable.
    fn push_escaped(&mut self, escapable: impl Fn(char) -> bool) {
        match self.peek_char() {
            Some(next) if escapable(next) => {
                self.pos += 1;
                self.push(next);
            }
            _ => self.push('\\'),
        }
    }

    fn push(&mut self, ch: char) {
        self.in_word = true;
        self.buffer.push(ch);
    }

    fn finish_word(&mut self, out: &mut Vec<String>) {
        if self.in_word {
            out.push(std::mem::take(&mut self.buffer));
            self.in_word = false;
        }
    }
}

/// Tokenize one input line.
///
/// ```
/// use minishell::lexer::split_into_tokens;
/// let tokens = split_into_tokens(r#"my_run grep "two words" 'x y'"#).unwrap();
/// assert_eq!(tokens, ["my_run", "grep", "two words", "x y"]);
/// ```
pub fn split_into_tokens(line: &str) -> Result<Vec<String>, LexingError> {
    let mut lexer = LexingFSM::new(line);
    lexer.make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        split_into_tokens(line).unwrap()
    }

    #[test]
    fn test_whitespace_split() {
        assert_eq!(toks("  ls   -la\tsrc  "), ["ls", "-la", "src"]);
        assert!(toks("   ").is_empty());
    }

    #[test]
    fn test_quotes_group_words() {
        assert_eq!(toks(r#"echo "hello world" 'a  b'"#), ["echo", "hello world", "a  b"]);
        assert_eq!(toks(r#"my_set GREETING="hi there""#), ["my_set", "GREETING=hi there"]);
        assert_eq!(toks(r#"echo '' """#), ["echo", "", ""]);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(toks(r#"echo 'a\"b'"#), ["echo", r#"a\"b"#]);
        assert_eq!(toks(r#"echo "it's""#), ["echo", "it's"]);
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(toks(r"touch my\ file"), ["touch", "my file"]);
        assert_eq!(toks(r#"echo \"x\""#), ["echo", "\"x\""]);
        assert_eq!(toks(r"dir C:\Users\me"), ["dir", r"C:\Users\me"]);
    }

    #[test]
    fn test_unfinished_quote() {
        assert_eq!(
            split_into_tokens("echo \"oops"),
            Err(LexingError::UnfinishedQuote('"'))
        );
        assert_eq!(
            split_into_tokens("echo 'oops"),
            Err(LexingError::UnfinishedQuote('\''))
        );
    }
}
