//! Authentication middleware and extractors for axum.
//!
//! This module provides:
//! - `auth_middleware` - Layer that resolves Bearer tokens and injects the identity into extensions
//! - `RequireAuth` - Extractor that requires authentication
//!
//! # Architecture
//!
//! The middleware uses the `BackendAuth` port, so it works the same against the
//! hosted auth service and the in-memory backend.
//!
//! ```text
//! Request → auth_middleware → injects Identity into extensions
//!                                      ↓
//!                              Handler → RequireAuth extractor reads from extensions
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::ports::{AuthError, BackendAuth, Identity, SessionToken};

/// Auth middleware state - wraps the backend auth port.
pub type AuthState = Arc<dyn BackendAuth>;

/// Authentication middleware that resolves Bearer tokens.
///
/// A request without a token passes through untouched; handlers that need a
/// user reject it through `RequireAuth`. A token that does not resolve is
/// answered with 401 here.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = SessionToken::from_headers(request.headers()) else {
        return next.run(request).await;
    };

    match auth.get_user(&token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            let (status, message) = match &e {
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                AuthError::ServiceUnavailable(msg) => {
                    tracing::error!(error = %msg, "Auth service unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Authentication service unavailable",
                    )
                }
            };
            (status, Json(ErrorResponse::new("AUTH_ERROR", message))).into_response()
        }
    }
}

/// Extractor that requires authentication.
///
/// Fails with 401 when `auth_middleware` did not resolve an identity.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<Identity>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Rejection type for authentication failures.
#[derive(Debug, Clone)]
pub enum AuthRejection {
    /// No valid authentication token was provided.
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "UNAUTHENTICATED",
                    "Authentication required",
                )),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::backend::InMemoryBackend;
    use crate::domain::foundation::UserId;
    use axum::{body::Body, extract::FromRequestParts, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new("user-123").unwrap(),
            email: Some("dr@example.com".to_string()),
        }
    }

    fn app() -> Router {
        let auth: AuthState = Arc::new(InMemoryBackend::new().with_user("good", identity()));
        Router::new()
            .route(
                "/me",
                get(|RequireAuth(user): RequireAuth| async move {
                    user.user_id.to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(auth, auth_middleware))
    }

    async fn get_me(authorization: Option<&str>) -> StatusCode {
        let mut request = axum::http::Request::builder().uri("/me");
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Middleware Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        assert_eq!(get_me(Some("Bearer good")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected_by_middleware() {
        assert_eq!(get_me(Some("Bearer bad")).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_token_is_rejected_by_extractor() {
        assert_eq!(get_me(None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(get_me(Some("Basic dXNlcjpwYXNz")).await, StatusCode::UNAUTHORIZED);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // RequireAuth Extractor Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn require_auth_extracts_identity_from_extensions() {
        let mut request: axum::http::Request<()> =
            axum::http::Request::builder().uri("/test").body(()).unwrap();
        request.extensions_mut().insert(identity());
        let (mut parts, _body) = request.into_parts();

        let result = RequireAuth::from_request_parts(&mut parts, &()).await;

        let RequireAuth(user) = result.unwrap();
        assert_eq!(user.email.as_deref(), Some("dr@example.com"));
    }

    #[test]
    fn auth_rejection_returns_401() {
        let response = AuthRejection::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn auth_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthState>();
        assert_send_sync::<RequireAuth>();
    }
}
