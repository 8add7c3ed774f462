//! Statement splitting for multi-statement scripts
//!
//! Semicolons inside quoted strings, quoted identifiers, comments and
//! dollar-quoted bodies do not end a statement.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
    DollarQuoted,
}

/// Split a script into trimmed, non-empty statements
///
/// Pieces that contain nothing but whitespace and comments are dropped.
///
/// # Examples
///
/// ```
/// use sql_gateway::query::split_statements;
///
/// let statements = split_statements("CREATE TABLE t(id INT); INSERT INTO t VALUES (1);").unwrap();
/// assert_eq!(statements, vec!["CREATE TABLE t(id INT)", "INSERT INTO t VALUES (1)"]);
/// ```
pub fn split_statements(script: &str) -> Result<Vec<String>> {
    let characters: Vec<char> = script.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = LexState::Normal;
    let mut dollar_delimiter: Vec<char> = Vec::new();
    let mut index = 0;

    while index < characters.len() {
        let ch = characters[index];
        let next = characters.get(index + 1).copied();

        match state {
            LexState::Normal => match ch {
                '\'' => {
                    state = LexState::SingleQuoted;
                    has_code = true;
                    current.push(ch);
                }
                '"' => {
                    state = LexState::DoubleQuoted;
                    has_code = true;
                    current.push(ch);
                }
                '-' if next == Some('-') => {
                    state = LexState::LineComment;
                    current.push_str("--");
                    index += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    state = LexState::BlockComment;
                    current.push_str("/*");
                    index += 2;
                    continue;
                }
                '$' => match dollar_tag_at(&characters, index) {
                    Some(delimiter) => {
                        current.extend(delimiter.iter());
                        index += delimiter.len();
                        dollar_delimiter = delimiter;
                        state = LexState::DollarQuoted;
                        has_code = true;
                        continue;
                    }
                    None => {
                        has_code = true;
                        current.push(ch);
                    }
                },
                ';' => {
                    if has_code {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                }
                _ => {
                    if !ch.is_whitespace() {
                        has_code = true;
                    }
                    current.push(ch);
                }
            },
            LexState::SingleQuoted | LexState::DoubleQuoted => {
                let quote = if state == LexState::SingleQuoted { '\'' } else { '"' };
                current.push(ch);
                if ch == quote {
                    if next == Some(quote) {
                        // Doubled quote stays inside the literal
                        current.push(quote);
                        index += 2;
                        continue;
                    }
                    state = LexState::Normal;
                }
            }
            LexState::LineComment => {
                current.push(ch);
                if ch == '\n' {
                    state = LexState::Normal;
                }
            }
            LexState::BlockComment => {
                if ch == '*' && next == Some('/') {
                    current.push_str("*/");
                    state = LexState::Normal;
                    index += 2;
                    continue;
                }
                current.push(ch);
            }
            LexState::DollarQuoted => {
                if characters[index..].starts_with(&dollar_delimiter) {
                    current.extend(dollar_delimiter.iter());
                    index += dollar_delimiter.len();
                    state = LexState::Normal;
                    continue;
                }
                current.push(ch);
            }
        }

        index += 1;
    }

    match state {
        LexState::SingleQuoted | LexState::DoubleQuoted => {
            return Err(Error::Validation(
                "Unterminated quoted string in script".to_string(),
            ));
        }
        LexState::BlockComment => {
            return Err(Error::Validation(
                "Unterminated block comment in script".to_string(),
            ));
        }
        LexState::DollarQuoted => {
            return Err(Error::Validation(
                "Unterminated dollar-quoted body in script".to_string(),
            ));
        }
        LexState::Normal | LexState::LineComment => {}
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    Ok(statements)
}

/// Dollar-quote delimiter (`$$` or `$tag$`) starting at `start`, if any
///
/// Positional placeholders such as `$1` never open a dollar quote, and a `$`
/// that continues an identifier is left alone.
fn dollar_tag_at(characters: &[char], start: usize) -> Option<Vec<char>> {
    if start > 0 {
        let previous = characters[start - 1];
        if previous.is_alphanumeric() || previous == '_' || previous == '$' {
            return None;
        }
    }

    let mut end = start + 1;
    while let Some(&ch) = characters.get(end) {
        if ch == '$' {
            return Some(characters[start..=end].to_vec());
        }
        let valid = if end == start + 1 {
            ch.is_alphabetic() || ch == '_'
        } else {
            ch.is_alphanumeric() || ch == '_'
        };
        if !valid {
            return None;
        }
        end += 1;
    }

    None
}
