//! Script splitting for the simulated container runtime
//!
//! Plain word splitting goes through `shell_words`; this module only adds
//! the control operators a container script can use. Pure, no I/O.

use thiserror::Error;

/// Errors raised while splitting a line into words
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("unterminated quoted string")]
    UnterminatedQuote,
}

/// Split a script into words the way `shell_words::split` does, except
/// that unquoted `;`, `&&`, `>`, `>>` and newlines are emitted as
/// standalone operator words.
pub fn split_script(script: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ShellError::UnterminatedQuote),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(ShellError::UnterminatedQuote),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ShellError::UnterminatedQuote),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            ';' | '\n' => {
                flush(&mut words, &mut current, &mut in_word);
                words.push(";".to_string());
            }
            '&' if chars.peek() == Some(&'&') => {
                chars.next();
                flush(&mut words, &mut current, &mut in_word);
                words.push("&&".to_string());
            }
            '>' => {
                flush(&mut words, &mut current, &mut in_word);
                if chars.peek() == Some(&'>') {
                    chars.next();
                    words.push(">>".to_string());
                } else {
                    words.push(">".to_string());
                }
            }
            c if c.is_whitespace() => flush(&mut words, &mut current, &mut in_word),
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    flush(&mut words, &mut current, &mut in_word);

    Ok(words)
}

fn flush(words: &mut Vec<String>, current: &mut String, in_word: &mut bool) {
    if *in_word {
        words.push(std::mem::take(current));
        *in_word = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(split_script("echo 'oops"), Err(ShellError::UnterminatedQuote));
    }

    #[test]
    fn test_matches_shell_words_without_operators() {
        let script = r#"echo "a \"b\"" 'c d' e\ f"#;
        assert_eq!(split_script(script).unwrap(), shell_words::split(script).unwrap());
    }

    #[test]
    fn test_joined_words_survive_round_trip() {
        let words = ["echo", "it's", "a;b", "x > y"];
        assert_eq!(split_script(&shell_words::join(words)).unwrap(), words);
    }

    #[test]
    fn test_script_operators() {
        let words = split_script("echo hi > /tmp/a; cat /tmp/a && echo x>>/tmp/b").unwrap();
        assert_eq!(
            words,
            vec!["echo", "hi", ">", "/tmp/a", ";", "cat", "/tmp/a", "&&", "echo", "x", ">>", "/tmp/b"]
        );
    }

    #[test]
    fn test_operators_inside_quotes_are_literal() {
        let words = split_script("echo 'a;b > c'").unwrap();
        assert_eq!(words, vec!["echo", "a;b > c"]);
    }
}
