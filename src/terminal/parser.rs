//! Command line parser
//!
//! Splits raw input into a command name and positional arguments:
//! - whitespace separates tokens
//! - single and double quotes group words; the quotes themselves are dropped
//! - quotes may appear mid-word: `foo"bar baz"` is one token
//! - an unterminated quote runs to the end of the input
//!
//! There is no escaping, no pipes and no variables. This is a website, not
//! a shell.

use std::iter::Peekable;
use std::str::Chars;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    /// First token, as typed
    pub name: String,
    /// Remaining tokens
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Name used for lookups (commands are case-insensitive)
    pub fn normalized_name(&self) -> String {
        self.name.trim().to_lowercase()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    /// Next non-empty token, or None at end of input
    fn next_token(&mut self) -> Option<String> {
        loop {
            self.skip_whitespace();
            self.chars.peek()?;
            let word = self.read_word();
            // `""` yields nothing; keep scanning
            if !word.is_empty() {
                return Some(word);
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => break,
                '"' | '\'' => {
                    self.chars.next();
                    self.read_quoted(c, &mut word);
                }
                _ => {
                    word.push(c);
                    self.chars.next();
                }
            }
        }
        word
    }

    fn read_quoted(&mut self, quote: char, out: &mut String) {
        for c in self.chars.by_ref() {
            if c == quote {
                return;
            }
            out.push(c);
        }
        // unterminated: the rest of the line belongs to this token
    }
}

/// Split input into tokens
pub fn tokenize(input: &str) -> Vec<String> {
    let mut lexer = Lexer::new(input);
    std::iter::from_fn(|| lexer.next_token()).collect()
}

/// Parse a command line into name + arguments
pub fn parse_command(input: &str) -> ParsedCommand {
    let mut tokens = tokenize(input).into_iter();
    match tokens.next() {
        Some(name) => ParsedCommand {
            name,
            args: tokens.collect(),
        },
        None => ParsedCommand::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quoted_argument() {
        let cmd = parse_command(r#"say "hello world" now"#);
        assert_eq!(cmd.name, "say");
        assert_eq!(cmd.args, strings(&["hello world", "now"]));
    }

    #[test_case("help", &["help"] ; "single word")]
    #[test_case("  help   about ", &["help", "about"] ; "extra whitespace")]
    #[test_case("echo 'a b' \"c d\"", &["echo", "a b", "c d"] ; "both quote styles")]
    #[test_case("echo \"it's\"", &["echo", "it's"] ; "other quote is literal")]
    #[test_case("echo foo\"bar baz\"qux", &["echo", "foobar bazqux"] ; "quote mid word")]
    #[test_case("echo \"unterminated here", &["echo", "unterminated here"] ; "unterminated quote")]
    #[test_case("echo \"\" x", &["echo", "x"] ; "empty quotes dropped")]
    #[test_case("a\tb\nc", &["a", "b", "c"] ; "tabs and newlines")]
    fn test_tokenize(input: &str, expected: &[&str]) {
        assert_eq!(tokenize(input), strings(expected));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_command("").is_empty());
        assert!(parse_command("   ").is_empty());
    }

    #[test]
    fn test_name_normalization() {
        let cmd = parse_command("HeLp me");
        assert_eq!(cmd.name, "HeLp");
        assert_eq!(cmd.normalized_name(), "help");
    }
}
