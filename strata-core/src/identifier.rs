//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as parameters, so the identifier
//! grammar enforced here is the primary injection defense for names. Every
//! identifier that reaches rendered SQL goes through [`validate_identifier`]
//! and is then quoted with [`quote_ident`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// PostgreSQL truncates identifiers to NAMEDATALEN - 1 bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex"));

/// Reserved words that cannot be used as bare table or column names.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

/// What kind of object an identifier names. Only used for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
    Constraint,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
            IdentifierKind::Constraint => "constraint",
        };
        write!(f, "{}", value)
    }
}

/// Check that `name` is a safe identifier.
pub fn validate_identifier(name: &str, kind: IdentifierKind) -> EngineResult<()> {
    if name.is_empty() {
        return Err(EngineError::invalid_input(format!("{} name cannot be empty", kind)));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(EngineError::invalid_input(format!(
            "{} name '{}' exceeds {} characters",
            kind, name, MAX_IDENTIFIER_LEN
        )));
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(EngineError::invalid_input(format!(
            "{} name '{}' may only contain letters, digits and underscores and must not start with a digit",
            kind, name
        )));
    }
    if is_reserved_keyword(name) {
        return Err(EngineError::invalid_input(format!(
            "{} name '{}' is a reserved SQL keyword",
            kind, name
        )));
    }
    Ok(())
}

/// Check an identifier for an object that is about to be created or renamed
/// into existence. Such names additionally may not claim the system prefix.
pub fn validate_new_identifier(
    name: &str,
    kind: IdentifierKind,
    system_prefix: &str,
) -> EngineResult<()> {
    validate_identifier(name, kind)?;
    if !system_prefix.is_empty() && name.starts_with(system_prefix) {
        return Err(EngineError::forbidden(format!(
            "{} name '{}' uses the reserved system prefix '{}'",
            kind, name, system_prefix
        )));
    }
    Ok(())
}

pub fn is_reserved_keyword(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_KEYWORDS.binary_search(&lower.as_str()).is_ok()
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a schema-qualified relation name.
pub fn quote_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}
