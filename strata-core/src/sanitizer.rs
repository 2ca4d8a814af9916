//! Pattern-based SQL sanitizer for raw SQL and imports.
//!
//! This is a blocklist, not a parser. It catches the direct ways of
//! touching database-level objects, catalog schemas and system tables, but
//! adversarial SQL can still route around it (dynamic SQL inside functions,
//! comma-separated FROM lists, catalog synonyms). Treat it as one layer on
//! top of database privileges, never as the only one.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, EngineResult};
use crate::splitter::{
    leading_keyword, split_statements, strip_comments, strip_comments_and_literals,
};

const NAME: &str = r#"(?:"(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)"#;

static DATABASE_OP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:CREATE|ALTER|DROP)\s+DATABASE\b").expect("Invalid database op regex")
});

static CATALOG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:\b|")(?:pg_catalog|information_schema)(?:\b|")"#)
        .expect("Invalid catalog regex")
});

static TABLE_TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:INSERT\s+INTO|UPDATE|DELETE\s+FROM|DROP\s+TABLE|ALTER\s+TABLE|CREATE\s+(?:(?:TEMP|TEMPORARY|UNLOGGED)\s+)?TABLE|TRUNCATE(?:\s+TABLE)?|COPY|FROM|JOIN|INTO|REFERENCES)\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?(?:ONLY\s+)?({name}(?:\s*\.\s*{name})?)",
        name = NAME
    ))
    .expect("Invalid table target regex")
});

static RENAME_TO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bRENAME\s+TO\s+({})", NAME)).expect("Invalid rename regex")
});

const DDL_KEYWORDS: &[&str] = &["ALTER", "COMMENT", "CREATE", "DROP", "GRANT", "REVOKE", "TRUNCATE"];

/// Strip quotes from an identifier, folding unquoted names to lowercase.
fn normalize_name(raw: &str) -> String {
    let raw = raw.trim();
    match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => raw.to_ascii_lowercase(),
    }
}

/// Last component of a possibly schema-qualified name.
fn relation_name(qualified: &str) -> String {
    let mut last = qualified;
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in qualified.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => start = idx + 1,
            _ => {}
        }
    }
    if start > 0 {
        last = &qualified[start..];
    }
    normalize_name(last)
}

#[derive(Debug, Clone)]
pub struct SqlSanitizer {
    system_prefix: String,
}

impl SqlSanitizer {
    pub fn new(system_prefix: impl Into<String>) -> Self {
        Self {
            system_prefix: system_prefix.into(),
        }
    }

    fn is_system(&self, name: &str) -> bool {
        !self.system_prefix.is_empty() && name.starts_with(&self.system_prefix)
    }

    /// Reject SQL that targets database-level objects, the catalog schemas
    /// or system tables. Checks the whole text with comments removed; table
    /// targets are only looked for outside string literals.
    pub fn check(&self, sql: &str) -> EngineResult<()> {
        let text = strip_comments(sql);
        let code = strip_comments_and_literals(sql);

        if DATABASE_OP_RE.is_match(&text) {
            return Err(EngineError::forbidden(
                "Database-level operations (CREATE/ALTER/DROP DATABASE) are not allowed",
            ));
        }
        if CATALOG_RE.is_match(&text) {
            return Err(EngineError::forbidden(
                "Direct access to pg_catalog or information_schema is not allowed",
            ));
        }
        for caps in TABLE_TARGET_RE.captures_iter(&code) {
            if let Some(target) = caps.get(1) {
                let name = relation_name(target.as_str());
                if self.is_system(&name) {
                    return Err(EngineError::forbidden(format!(
                        "Access to system table '{}' is not allowed",
                        name
                    )));
                }
            }
        }
        for caps in RENAME_TO_RE.captures_iter(&code) {
            if let Some(target) = caps.get(1) {
                let name = normalize_name(target.as_str());
                if self.is_system(&name) {
                    return Err(EngineError::forbidden(format!(
                        "Cannot rename to '{}': the '{}' prefix is reserved for system tables",
                        name, self.system_prefix
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check the whole script, then every statement on its own.
    pub fn check_script(&self, sql: &str) -> EngineResult<Vec<String>> {
        self.check(sql)?;
        let statements = split_statements(sql);
        for statement in &statements {
            self.check(statement)?;
        }
        Ok(statements)
    }
}

impl Default for SqlSanitizer {
    fn default() -> Self {
        Self::new(crate::policy::DEFAULT_SYSTEM_PREFIX)
    }
}

/// Whether any statement in `sql` changes schema.
pub fn is_ddl(sql: &str) -> bool {
    split_statements(sql).iter().any(|statement| {
        leading_keyword(statement)
            .map(|kw| DDL_KEYWORDS.contains(&kw.as_str()))
            .unwrap_or(false)
    })
}
