//! Middleware modules for the Strata API
//!
//! - `auth`: admin authorization for the engine routes
//!
//! Request tracing and metrics live in `telemetry::middleware`.

mod auth;

pub use auth::{admin_auth_middleware, AuthExtractor, AuthMiddlewareError, AuthMiddlewareState};
