//! BackendAuth port - resolves session tokens issued by the hosted auth service.
//!
//! Practitioners sign in against the backend's auth service from the browser.
//! Requests to this server carry the resulting access token as a bearer
//! token, which the server exchanges for the user it belongs to.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

use crate::domain::foundation::UserId;

/// Access token presented by a signed-in user.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads `Authorization: Bearer <token>` from request headers.
    ///
    /// Returns `None` when the header is absent, not a bearer token, or empty.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// The signed-in user behind a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Session lookup against the hosted auth service.
///
/// # Contract
///
/// - Unknown, expired, or revoked tokens are `AuthError::InvalidToken`
/// - Network or upstream failures are `AuthError::ServiceUnavailable`
#[async_trait]
pub trait BackendAuth: Send + Sync {
    async fn get_user(&self, token: &SessionToken) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn reads_bearer_token() {
        let token = SessionToken::from_headers(&headers_with("Bearer abc.def")).unwrap();
        assert_eq!(token.as_str(), "abc.def");
    }

    #[test]
    fn missing_header_has_no_token() {
        assert!(SessionToken::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn non_bearer_scheme_has_no_token() {
        assert!(SessionToken::from_headers(&headers_with("Basic dXNlcjpwYXNz")).is_none());
    }

    #[test]
    fn empty_bearer_has_no_token() {
        assert!(SessionToken::from_headers(&headers_with("Bearer   ")).is_none());
    }

    #[test]
    fn debug_output_redacts_token() {
        let token = SessionToken::new("secret-token");
        assert!(!format!("{:?}", token).contains("secret-token"));
    }

    #[test]
    fn only_service_unavailable_is_transient() {
        assert!(AuthError::ServiceUnavailable("down".into()).is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
    }
}
