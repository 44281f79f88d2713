//! Shell-style word splitting for access-log lines.
//!
//! Load balancers quote fields that may contain spaces (`request`,
//! `user_agent`, ...). Splitting follows POSIX shell rules: quotes group,
//! quotes are removed, adjacent segments join into one word.

use crate::core::error::{Error, LineFault, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unquoted,
    Single,
    Double,
}

/// Splits `line` into words.
///
/// Fails with `MalformedLine` on an unterminated quote or a trailing escape.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut state = State::Unquoted;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Unquoted => match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    if in_word {
                        tokens.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    state = State::Single;
                    in_word = true;
                }
                '"' => {
                    state = State::Double;
                    in_word = true;
                }
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| Error::malformed(LineFault::DanglingEscape))?;
                    current.push(escaped);
                    in_word = true;
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
            State::Single => match ch {
                '\'' => state = State::Unquoted,
                c => current.push(c),
            },
            State::Double => match ch {
                '"' => state = State::Unquoted,
                '\\' => match chars.peek() {
                    Some(&next @ ('"' | '\\')) => {
                        current.push(next);
                        chars.next();
                    }
                    Some(_) => current.push('\\'),
                    None => return Err(Error::malformed(LineFault::UnterminatedQuote)),
                },
                c => current.push(c),
            },
        }
    }

    if state != State::Unquoted {
        return Err(Error::malformed(LineFault::UnterminatedQuote));
    }
    if in_word {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_runs() {
        let tokens = tokenize("  a  b\tc\r").expect("tokens");
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }

    #[test]
    fn only_ascii_blanks_separate_words() {
        let tokens = tokenize("a\u{a0}b c\u{0b}d e\u{0c}f").expect("tokens");
        assert_eq!(tokens, vec!["a\u{a0}b", "c\u{0b}d", "e\u{0c}f"]);
    }

    #[test]
    fn quoted_field_with_spaces_is_one_token() {
        let tokens =
            tokenize(r#"h2 2023-01-01T00:00:00Z "GET /path with space HTTP/1.1" "curl/7.46.0""#)
                .expect("tokens");
        assert_eq!(
            tokens,
            vec![
                "h2",
                "2023-01-01T00:00:00Z",
                "GET /path with space HTTP/1.1",
                "curl/7.46.0"
            ]
        );
    }

    #[test]
    fn empty_quotes_yield_empty_token() {
        let tokens = tokenize(r#"a "" b '' "-""#).expect("tokens");
        assert_eq!(tokens, vec!["a", "", "b", "", "-"]);
    }

    #[test]
    fn adjacent_segments_join() {
        let tokens = tokenize(r#"pre"mid dle"'post fix' x"#).expect("tokens");
        assert_eq!(tokens, vec!["premid dlepost fix", "x"]);
    }

    #[test]
    fn escapes() {
        let tokens = tokenize(r#"a\ b "say \"hi\" \n" 'no \escape'"#).expect("tokens");
        assert_eq!(tokens, vec!["a b", r#"say "hi" \n"#, r"no \escape"]);
    }

    #[test]
    fn hash_is_ordinary() {
        let tokens = tokenize("GET /#anchor").expect("tokens");
        assert_eq!(tokens, vec!["GET", "/#anchor"]);
    }

    #[test]
    fn empty_line_has_no_tokens() {
        assert!(tokenize("").expect("tokens").is_empty());
        assert!(tokenize("   ").expect("tokens").is_empty());
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = tokenize(r#"a "b c"#).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLine {
                fault: LineFault::UnterminatedQuote,
                ..
            }
        ));
    }

    #[test]
    fn trailing_escape_is_malformed() {
        let err = tokenize("a b\\").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLine {
                fault: LineFault::DanglingEscape,
                ..
            }
        ));
    }
}
