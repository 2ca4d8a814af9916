//! Column default encoding and decoding.
//!
//! User-supplied defaults never reach SQL as raw text. A default is either
//! one of the allow-listed functions in [`DefaultFunction`] or a literal
//! wrapped in a dollar-quoted string whose tag does not occur in the
//! literal, so the literal cannot terminate the quoted region early no
//! matter which quote characters it contains.

use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

use crate::column::{ColumnType, DefaultFunction};
use crate::error::{EngineError, EngineResult};

const TAG_PREFIX: &str = "sd_";
const TAG_RANDOM_LEN: usize = 8;

static CAST_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"::(?:"?[A-Za-z_][A-Za-z0-9_ ]*"?)(?:\(\d+(?:,\s*\d+)?\))?(?:\[\])?$"#)
        .expect("Invalid cast suffix regex")
});

/// Encode a column default as a SQL fragment.
///
/// Returns `Ok(None)` when the column gets no default clause at all.
pub fn format_default(
    raw: Option<&str>,
    column_type: ColumnType,
    is_nullable: bool,
) -> EngineResult<Option<String>> {
    let raw = raw.filter(|value| !value.trim().is_empty());

    let Some(raw) = raw else {
        if is_nullable {
            return Ok(None);
        }
        return Ok(column_type
            .mapping()
            .canonical_default
            .map(|function| function.sql().to_string()));
    };

    if let Some(function) = DefaultFunction::parse(raw) {
        if column_type.accepts_function(function) {
            return Ok(Some(function.sql().to_string()));
        }
    }

    if raw.contains('\0') {
        return Err(EngineError::invalid_input(
            "Default value cannot contain NUL characters",
        ));
    }

    Ok(Some(dollar_quote(raw)))
}

/// Wrap `literal` in a dollar-quoted string with a random, non-colliding tag.
pub fn dollar_quote(literal: &str) -> String {
    let mut rng = rand::rng();
    loop {
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(TAG_RANDOM_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let tag = format!("{}{}", TAG_PREFIX, suffix);
        if let Some(quoted) = dollar_quote_with_tag(literal, &tag) {
            return quoted;
        }
    }
}

/// Wrap `literal` with the given tag, or `None` if the tag would collide.
///
/// A tag collides when its delimiter occurs anywhere in `literal` followed
/// by the closing delimiter earlier than the intended end.
pub fn dollar_quote_with_tag(literal: &str, tag: &str) -> Option<String> {
    let delimiter = format!("${}$", tag);
    let body = format!("{}{}", literal, delimiter);
    if body.find(&delimiter) != Some(literal.len()) {
        return None;
    }
    Some(format!("{}{}", delimiter, body))
}

/// Extract the literal from a dollar-quoted string produced by [`dollar_quote`].
pub fn unquote_dollar(quoted: &str) -> Option<String> {
    let rest = quoted.strip_prefix('$')?;
    let tag_end = rest.find('$')?;
    let delimiter = format!("${}$", &rest[..tag_end]);
    let body = &rest[tag_end + 1..];
    let close = body.find(&delimiter)?;
    if close + delimiter.len() != body.len() {
        return None;
    }
    Some(body[..close].to_string())
}

/// Parse a stored default (`information_schema.columns.column_default`)
/// back into the plain value a caller supplied.
///
/// `'it''s'::text` becomes `it's`, `42` stays `42`, and function defaults
/// are returned as written. `NULL` defaults yield `None`.
pub fn parse_stored_default(stored: &str) -> Option<String> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("E'").or_else(|| trimmed.strip_prefix("e'")) {
        return parse_quoted(rest, true).or_else(|| Some(trimmed.to_string()));
    }
    if let Some(rest) = trimmed.strip_prefix('\'') {
        return parse_quoted(rest, false).or_else(|| Some(trimmed.to_string()));
    }
    if trimmed.starts_with('$') {
        if let Some(literal) = unquote_dollar(strip_casts(trimmed)) {
            return Some(literal);
        }
    }

    let mut value = strip_casts(trimmed);
    while value.starts_with('(') && value.ends_with(')') && value.len() >= 2 {
        value = strip_casts(value[1..value.len() - 1].trim());
    }
    if value.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(value.to_string())
}

/// Parse the remainder of a single-quoted literal (after the opening quote).
fn parse_quoted(rest: &str, backslash_escapes: bool) -> Option<String> {
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\'' => {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    out.push('\'');
                    continue;
                }
                let tail = rest[idx + 1..].trim();
                if tail.is_empty() || strip_casts(tail).is_empty() {
                    return Some(out);
                }
                return None;
            }
            '\\' if backslash_escapes => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => return None,
            },
            other => out.push(other),
        }
    }
    None
}

fn strip_casts(mut value: &str) -> &str {
    while let Some(m) = CAST_SUFFIX_RE.find(value) {
        value = value[..m.start()].trim_end();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_nullable_without_default_gets_none() -> EngineResult<()> {
        assert_eq!(format_default(None, ColumnType::Uuid, true)?, None);
        assert_eq!(format_default(Some("   "), ColumnType::String, true)?, None);
        Ok(())
    }

    #[test]
    fn test_non_nullable_falls_back_to_canonical_default() -> EngineResult<()> {
        assert_eq!(
            format_default(None, ColumnType::Uuid, false)?,
            Some("gen_random_uuid()".to_string())
        );
        assert_eq!(
            format_default(None, ColumnType::DateTime, false)?,
            Some("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(format_default(None, ColumnType::String, false)?, None);
        Ok(())
    }

    #[test]
    fn test_allow_listed_functions_emit_unquoted() -> EngineResult<()> {
        assert_eq!(
            format_default(Some("now()"), ColumnType::DateTime, true)?,
            Some("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(
            format_default(Some("GEN_RANDOM_UUID()"), ColumnType::Uuid, true)?,
            Some("gen_random_uuid()".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_function_like_text_is_quoted() -> EngineResult<()> {
        let fragment = format_default(Some("pg_sleep(100)"), ColumnType::String, true)?
            .unwrap_or_default();
        assert!(fragment.starts_with("$sd_"));
        assert_eq!(unquote_dollar(&fragment).as_deref(), Some("pg_sleep(100)"));

        // An allow-listed function on the wrong type is a literal too.
        let fragment = format_default(Some("now()"), ColumnType::String, true)?.unwrap_or_default();
        assert_eq!(unquote_dollar(&fragment).as_deref(), Some("now()"));
        Ok(())
    }

    #[test]
    fn test_nul_is_rejected() {
        assert!(format_default(Some("a\0b"), ColumnType::String, true).is_err());
    }

    #[test]
    fn test_colliding_tag_is_refused() {
        assert_eq!(dollar_quote_with_tag("x $t$ y", "t"), None);
        // Trailing partial delimiter would merge with the closing one.
        assert_eq!(dollar_quote_with_tag("x$t", "t"), None);
        assert_eq!(
            dollar_quote_with_tag("it's", "t"),
            Some("$t$it's$t$".to_string())
        );
    }

    #[test]
    fn test_parse_stored_default() {
        assert_eq!(parse_stored_default("'hello'::text").as_deref(), Some("hello"));
        assert_eq!(parse_stored_default("'it''s $x$'::text").as_deref(), Some("it's $x$"));
        assert_eq!(parse_stored_default("42").as_deref(), Some("42"));
        assert_eq!(parse_stored_default("'-5'::integer").as_deref(), Some("-5"));
        assert_eq!(parse_stored_default("(-5)").as_deref(), Some("-5"));
        assert_eq!(
            parse_stored_default("'{\"a\": 1}'::jsonb").as_deref(),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            parse_stored_default("'2024-01-01'::date").as_deref(),
            Some("2024-01-01")
        );
        assert_eq!(
            parse_stored_default("'x'::character varying(20)").as_deref(),
            Some("x")
        );
        assert_eq!(
            parse_stored_default("gen_random_uuid()").as_deref(),
            Some("gen_random_uuid()")
        );
        assert_eq!(parse_stored_default("CURRENT_TIMESTAMP").as_deref(), Some("CURRENT_TIMESTAMP"));
        assert_eq!(parse_stored_default("E'a\\\\b'::text").as_deref(), Some("a\\b"));
        assert_eq!(parse_stored_default("NULL::text"), None);
        assert_eq!(parse_stored_default(""), None);
    }

    proptest! {
        #[test]
        fn prop_dollar_quote_never_terminates_early(literal in "[a-z$'\"\\\\ ]{0,40}") {
            let quoted = dollar_quote(&literal);
            prop_assert_eq!(unquote_dollar(&quoted), Some(literal));
        }

        #[test]
        fn prop_dollar_quote_resists_embedded_tags(
            head in "[a-z ]{0,10}",
            tag in "sd_[a-z0-9]{8}",
            tail in "[a-z ]{0,10}",
        ) {
            let literal = format!("{}${}${}", head, tag, tail);
            let quoted = dollar_quote(&literal);
            let embedded_opener = format!("${}$", tag);
            prop_assert!(!quoted.starts_with(&embedded_opener));
            prop_assert_eq!(unquote_dollar(&quoted), Some(literal));
        }

        #[test]
        fn prop_catalog_text_defaults_parse_back(literal in "[^\\x00]{0,40}") {
            let stored = format!("'{}'::text", literal.replace('\'', "''"));
            prop_assert_eq!(parse_stored_default(&stored), Some(literal));
        }
    }
}
