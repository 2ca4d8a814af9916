//! API Configuration Module
//!
//! CORS settings for the HTTP layer and the engine limits shared by the
//! catalog, SQL gateway, import and bulk upsert services. Configuration is
//! loaded from environment variables with sensible defaults for development.

use std::time::Duration;

use strata_core::{SqlSanitizer, SystemSchemaPolicy, DEFAULT_SYSTEM_PREFIX};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://strata.run,https://app.strata.run"
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: 86400, // 24 hours
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STRATA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `STRATA_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `STRATA_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("STRATA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("STRATA_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("STRATA_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86400);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.strata.run
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern)
                        || origin_domain == pattern.strip_prefix('.').unwrap_or(pattern);
                }
            }
            false
        })
    }
}

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

pub const DEFAULT_SQL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_RELOAD_CHANNEL: &str = "pgrst";

/// Limits and naming shared by the engine services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard timeout for raw SQL statements.
    pub sql_timeout: Duration,
    /// Tables starting with this prefix are invisible to the engine.
    pub system_prefix: String,
    /// Upper bound for import and bulk upsert uploads.
    pub max_upload_bytes: usize,
    /// LISTEN/NOTIFY channel of the schema cache consumer.
    pub reload_channel: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sql_timeout: Duration::from_secs(DEFAULT_SQL_TIMEOUT_SECS),
            system_prefix: DEFAULT_SYSTEM_PREFIX.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            reload_channel: DEFAULT_RELOAD_CHANNEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create EngineConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STRATA_SQL_TIMEOUT_SECS`: Raw SQL timeout (default: 30)
    /// - `STRATA_SYSTEM_PREFIX`: System table prefix (default: "_")
    /// - `STRATA_MAX_UPLOAD_BYTES`: Upload limit (default: 50 MiB)
    /// - `STRATA_SCHEMA_RELOAD_CHANNEL`: NOTIFY channel (default: "pgrst")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sql_timeout: std::env::var("STRATA_SQL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sql_timeout),
            system_prefix: std::env::var("STRATA_SYSTEM_PREFIX")
                .unwrap_or(defaults.system_prefix),
            max_upload_bytes: std::env::var("STRATA_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            reload_channel: std::env::var("STRATA_SCHEMA_RELOAD_CHANNEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.reload_channel),
        }
    }

    pub fn policy(&self) -> SystemSchemaPolicy {
        SystemSchemaPolicy::new(self.system_prefix.clone())
    }

    pub fn sanitizer(&self) -> SqlSanitizer {
        SqlSanitizer::new(self.system_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
    }

    #[test]
    fn test_is_production() {
        let mut config = ApiConfig::default();
        assert!(!config.is_production());

        config.cors_origins = vec!["https://strata.run".to_string()];
        assert!(config.is_production());
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://strata.run".to_string(),
                "*.console.strata.run".to_string(),
            ],
            ..Default::default()
        };

        assert!(config.is_origin_allowed("https://strata.run"));
        assert!(config.is_origin_allowed("https://eu.console.strata.run"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notstrata.run"));
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sql_timeout, Duration::from_secs(30));
        assert_eq!(config.system_prefix, "_");
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.reload_channel, "pgrst");
        assert!(config.policy().is_system_table("_audit"));
        assert!(config.sanitizer().check("SELECT * FROM _audit").is_err());
    }
}
