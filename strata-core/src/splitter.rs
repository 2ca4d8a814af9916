//! Quote- and comment-aware SQL statement splitting.
//!
//! Semicolons only end a statement when they appear outside of string
//! literals (`'..'`, `E'..'`), quoted identifiers, dollar-quoted bodies and
//! comments.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    /// Plain SQL text, including quoted identifiers and dollar-quoted bodies.
    Code,
    /// A single-quoted string literal, quotes included.
    Literal,
    Comment,
    Semicolon,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Range<usize>,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Length of a `$tag$` delimiter starting at `start`, if there is one.
fn dollar_tag_len(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if i < bytes.len() && (bytes[i].is_ascii_digit()) {
        return None;
    }
    while i < bytes.len() && bytes[i] != b'$' {
        if !is_ident_byte(bytes[i]) {
            return None;
        }
        i += 1;
    }
    (i < bytes.len()).then(|| i + 1 - start)
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// End (exclusive) of a quoted run opened at `start` by `quote`.
/// Doubled quotes stay inside the run.
fn quoted_end(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if i + 1 < bytes.len() && bytes[i + 1] == quote {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn block_comment_end(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens: Vec<Token> = Vec::new();
    let mut code_start = 0usize;
    let mut i = 0usize;

    let flush = |tokens: &mut Vec<Token>, from: usize, to: usize| {
        if from < to {
            tokens.push(Token {
                kind: TokenKind::Code,
                span: from..to,
            });
        }
    };

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        let prev_is_ident = i > 0 && is_ident_byte(bytes[i - 1]);
        match b {
            b'-' if next == Some(b'-') => {
                flush(&mut tokens, code_start, i);
                let end = find_subslice(bytes, b"\n", i).unwrap_or(bytes.len());
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    span: i..end,
                });
                i = end;
                code_start = i;
            }
            b'/' if next == Some(b'*') => {
                flush(&mut tokens, code_start, i);
                let end = block_comment_end(bytes, i);
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    span: i..end,
                });
                i = end;
                code_start = i;
            }
            b'\'' => {
                let escape = i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && !(i > 1 && is_ident_byte(bytes[i - 2]));
                flush(&mut tokens, code_start, i);
                let end = quoted_end(bytes, i, b'\'', escape);
                tokens.push(Token {
                    kind: TokenKind::Literal,
                    span: i..end,
                });
                i = end;
                code_start = i;
            }
            b'"' => {
                i = quoted_end(bytes, i, b'"', false);
            }
            b'$' if !prev_is_ident => match dollar_tag_len(bytes, i) {
                Some(len) => {
                    let delimiter = &bytes[i..i + len];
                    i = find_subslice(bytes, delimiter, i + len)
                        .map(|close| close + len)
                        .unwrap_or(bytes.len());
                }
                None => i += 1,
            },
            b';' => {
                flush(&mut tokens, code_start, i);
                tokens.push(Token {
                    kind: TokenKind::Semicolon,
                    span: i..i + 1,
                });
                i += 1;
                code_start = i;
            }
            _ => i += 1,
        }
    }
    flush(&mut tokens, code_start, bytes.len());
    tokens
}

/// Split a script into individual statements, without trailing semicolons.
/// Statements consisting only of whitespace and comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;

    for token in tokenize(sql) {
        let text = &sql[token.span.clone()];
        match token.kind {
            TokenKind::Semicolon => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            }
            TokenKind::Code | TokenKind::Literal => {
                has_code |= !text.trim().is_empty();
                current.push_str(text);
            }
            TokenKind::Comment => current.push_str(text),
        }
    }
    if has_code {
        statements.push(current.trim().to_string());
    }
    statements
}

/// Replace every comment with a single space, leaving literals untouched.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for token in tokenize(sql) {
        match token.kind {
            TokenKind::Comment => out.push(' '),
            _ => out.push_str(&sql[token.span]),
        }
    }
    out
}

/// Like [`strip_comments`], also emptying single-quoted string literals so
/// their text is never read as SQL.
pub fn strip_comments_and_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for token in tokenize(sql) {
        match token.kind {
            TokenKind::Comment => out.push(' '),
            TokenKind::Literal => out.push_str("''"),
            _ => out.push_str(&sql[token.span]),
        }
    }
    out
}

/// First keyword of a statement, uppercased, ignoring comments.
pub fn leading_keyword(statement: &str) -> Option<String> {
    let stripped = strip_comments(statement);
    let word: String = stripped
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (!word.is_empty()).then(|| word.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_splits_simple_script() {
        let statements = split_statements("SELECT 1; SELECT 2;\n\nSELECT 3");
        assert_eq!(statements, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_semicolons_inside_literals_do_not_split() {
        let sql = "INSERT INTO t VALUES ('a;b', 'it''s;'); \
                   INSERT INTO \"we;ird\" VALUES (E'x\\';y');";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("'it''s;')"));
        assert!(statements[1].contains("E'x\\';y'"));
    }

    #[test]
    fn test_literals_are_emptied_but_dollar_bodies_kept() {
        assert_eq!(
            strip_comments_and_literals("INSERT INTO t VALUES ('from _x', E'it\\'s') -- c"),
            "INSERT INTO t VALUES ('', E'')  "
        );
        assert_eq!(
            strip_comments_and_literals("DO $$ BEGIN DELETE FROM _x; END $$"),
            "DO $$ BEGIN DELETE FROM _x; END $$"
        );
    }

    #[test]
    fn test_dollar_quoted_function_body() {
        let sql = "CREATE FUNCTION f() RETURNS trigger AS $body$\nBEGIN\n  NEW.x = 1;\n  RETURN NEW;\nEND;\n$body$ LANGUAGE plpgsql;\nSELECT 1;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("LANGUAGE plpgsql"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_anonymous_dollar_quote_and_params() {
        let statements = split_statements("SELECT $$a;b$$; SELECT $1;");
        assert_eq!(statements, vec!["SELECT $$a;b$$", "SELECT $1"]);
    }

    #[test]
    fn test_comments_are_not_statements() {
        let sql = "-- header; with semicolon\n/* block; /* nested; */ */\nSELECT 1; -- trailing\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("SELECT 1"));
    }

    #[test]
    fn test_strip_comments_keeps_literals() {
        assert_eq!(
            strip_comments("INSERT/**/INTO x VALUES ('--not a comment')"),
            "INSERT INTO x VALUES ('--not a comment')"
        );
    }

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  -- c\n create table t()").as_deref(), Some("CREATE"));
        assert_eq!(leading_keyword("/* x */SELECT 1").as_deref(), Some("SELECT"));
        assert_eq!(leading_keyword("  "), None);
    }

    proptest! {
        #[test]
        fn prop_literals_survive_splitting(
            literals in proptest::collection::vec("[a-z;' ]{0,12}", 1..6)
        ) {
            let script: String = literals
                .iter()
                .map(|l| format!("INSERT INTO t VALUES ('{}');\n", l.replace('\'', "''")))
                .collect();
            let statements = split_statements(&script);
            prop_assert_eq!(statements.len(), literals.len());
            for (statement, literal) in statements.iter().zip(&literals) {
                let expected = format!("INSERT INTO t VALUES ('{}')", literal.replace('\'', "''"));
                prop_assert_eq!(statement, &expected);
            }
        }

        #[test]
        fn prop_dollar_bodies_survive_splitting(body in "[a-z;' \n]{0,30}") {
            let script = format!("SELECT $q${}$q$; SELECT 2", body);
            let statements = split_statements(&script);
            prop_assert_eq!(statements.len(), 2);
            prop_assert_eq!(&statements[0], &format!("SELECT $q${}$q$", body).trim().to_string());
        }
    }
}
