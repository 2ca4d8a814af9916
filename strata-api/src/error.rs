//! Error Types for the Strata API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - The mapping from engine errors to HTTP errors
//!
//! All errors are serialized as `{error, message, statusCode, nextActions?, details?}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use strata_core::EngineError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401, 403)
    // ========================================================================
    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Request is authenticated but lacks permission, or targets a
    /// system table, reserved column or frozen column
    Forbidden,

    /// Authentication token is invalid or malformed
    InvalidToken,

    /// Authentication token has expired
    TokenExpired,

    // ========================================================================
    // Validation Errors (400, 413)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// A reserved column was declared with the wrong type
    ReservedColumnMismatch,

    /// Table would be left without user-defined columns
    NoUserColumns,

    /// Raw SQL failed to execute
    SqlExecutionFailed,

    /// Import file could not be applied
    ImportFailed,

    /// Uploaded file exceeds the configured limit
    PayloadTooLarge,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested table does not exist
    TableNotFound,

    /// Requested column does not exist
    ColumnNotFound,

    /// Some other catalog object does not exist
    EntityNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Table with the same name already exists
    TableAlreadyExists,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::ReservedColumnMismatch
            | ErrorCode::NoUserColumns
            | ErrorCode::SqlExecutionFailed
            | ErrorCode::ImportFailed => StatusCode::BAD_REQUEST,

            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            ErrorCode::TableNotFound | ErrorCode::ColumnNotFound | ErrorCode::EntityNotFound => {
                StatusCode::NOT_FOUND
            }

            ErrorCode::TableAlreadyExists => StatusCode::CONFLICT,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::InvalidToken => "Invalid authentication token",
            ErrorCode::TokenExpired => "Authentication token has expired",

            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::ReservedColumnMismatch => "Reserved column has the wrong type",
            ErrorCode::NoUserColumns => "Table needs at least one user-defined column",
            ErrorCode::SqlExecutionFailed => "SQL execution failed",
            ErrorCode::ImportFailed => "Import failed",
            ErrorCode::PayloadTooLarge => "Uploaded file is too large",

            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::ColumnNotFound => "Column not found",
            ErrorCode::EntityNotFound => "Entity not found",

            ErrorCode::TableAlreadyExists => "Table already exists",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code categorizing the error
    #[serde(rename = "error")]
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code, repeated in the body
    pub status_code: u16,

    /// Remediation hint for the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<String>,

    /// Optional additional details (SQLSTATE, failing statement, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: code.status_code().as_u16(),
            next_actions: None,
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a remediation hint.
    pub fn with_next_actions(mut self, hint: impl Into<String>) -> Self {
        self.next_actions = Some(hint.into());
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn payload_too_large(limit_bytes: usize) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            format!("Uploaded file exceeds the {} byte limit", limit_bytes),
        )
    }

    pub fn table_not_found(table: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TableNotFound, format!("Table '{}' not found", table))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Engine errors carry their own taxonomy; map each to a stable code and
/// attach the remediation hint.
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let hint = err.remediation();
        let message = err.to_string();
        let api = match &err {
            EngineError::InvalidInput { .. } => ApiError::new(ErrorCode::InvalidInput, message),
            EngineError::ReservedTypeMismatch { column, expected, got } => {
                ApiError::new(ErrorCode::ReservedColumnMismatch, message).with_details(
                    serde_json::json!({
                        "column": column,
                        "expected": expected,
                        "got": got,
                    }),
                )
            }
            EngineError::NoUserColumns { .. } => ApiError::new(ErrorCode::NoUserColumns, message),
            EngineError::Forbidden { .. } => ApiError::new(ErrorCode::Forbidden, message),
            EngineError::NotFound { kind, .. } => {
                let code = match *kind {
                    "Table" => ErrorCode::TableNotFound,
                    "Column" => ErrorCode::ColumnNotFound,
                    _ => ErrorCode::EntityNotFound,
                };
                ApiError::new(code, message)
            }
            EngineError::DuplicateTable { .. } => {
                ApiError::new(ErrorCode::TableAlreadyExists, message)
            }
            EngineError::SqlExecution { sqlstate, .. } => {
                let api = ApiError::new(ErrorCode::SqlExecutionFailed, message);
                match sqlstate {
                    Some(code) => api.with_details(serde_json::json!({ "sqlstate": code })),
                    None => api,
                }
            }
            EngineError::Timeout { .. } => ApiError::new(ErrorCode::Timeout, message),
            EngineError::Import { statement, .. } => {
                let api = ApiError::new(ErrorCode::ImportFailed, message);
                match statement {
                    Some(statement) => {
                        api.with_details(serde_json::json!({ "statement": statement }))
                    }
                    None => api,
                }
            }
        };
        match hint {
            Some(hint) => api.with_next_actions(hint),
            None => api,
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Log the full error for debugging
        tracing::error!("Database error: {:?}", err);

        // Return a generic database error to avoid leaking internal details
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
