//! Axum middleware for admin authorization.
//!
//! Engine routes sit behind `admin_auth_middleware`; it reads the
//! `X-API-Key` and `Authorization` headers, rejects with 401/403 and injects
//! the resulting [`AuthContext`] into request extensions.

use crate::auth::{authorize_admin, AuthConfig, AuthContext};
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// State handed to the middleware through `from_fn_with_state`.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

/// # Example
///
/// ```ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
/// let app = Router::new()
///     .route("/tables", axum::routing::get(list_tables))
///     .layer(middleware::from_fn_with_state(auth_state, admin_auth_middleware));
/// ```
pub async fn admin_auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|h| h.to_str().ok());
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let auth_context = authorize_admin(&state.auth_config, api_key_header, auth_header)
        .map_err(AuthMiddlewareError)?;

    tracing::debug!(subject = %auth_context.subject, method = ?auth_context.method, "Admin request authorized");
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Middleware rejection; renders through [`ApiError`]'s JSON body.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

/// Typed extractor for the context injected by [`admin_auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure admin_auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt_token, AuthMethod, FixedClock, JwtSecret};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn state() -> AuthMiddlewareState {
        let mut config = AuthConfig::default();
        config.add_api_key("k1".to_string());
        config.jwt_secret = JwtSecret::new("middleware_secret".to_string()).expect("secret");
        config.clock = Arc::new(FixedClock(1_704_067_200));
        AuthMiddlewareState::new(config)
    }

    async fn whoami(AuthExtractor(ctx): AuthExtractor) -> String {
        match ctx.method {
            AuthMethod::ApiKey => format!("key:{}", ctx.subject),
            AuthMethod::Jwt => format!("jwt:{}", ctx.subject),
        }
    }

    fn app(state: AuthMiddlewareState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
    }

    async fn status_for(request: axum::http::Request<Body>) -> StatusCode {
        app(state())
            .oneshot(request)
            .await
            .expect("router is infallible")
            .status()
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unauthorized() {
        let request = axum::http::Request::get("/whoami").body(Body::empty()).expect("request");
        assert_eq!(status_for(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_api_key_passes() {
        let request = axum::http::Request::get("/whoami")
            .header("x-api-key", "k1")
            .body(Body::empty())
            .expect("request");
        assert_eq!(status_for(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_admin_bearer_is_forbidden() {
        let state = state();
        let token = generate_jwt_token(&state.auth_config, "u1", Some("anon".to_string()), 60)
            .expect("token");
        let request = axum::http::Request::get("/whoami")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .expect("request");
        assert_eq!(status_for(request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_bearer_passes() {
        let state = state();
        let token = generate_jwt_token(
            &state.auth_config,
            "u1",
            Some(state.auth_config.admin_role.clone()),
            60,
        )
        .expect("token");
        let request = axum::http::Request::get("/whoami")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .expect("request");
        assert_eq!(status_for(request).await, StatusCode::OK);
    }
}
