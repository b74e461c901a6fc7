//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Internal auth error kind used by the core guard logic.
///
/// Everything ambiguous maps to 401; only role failures are 403 and only
/// store connectivity is 500. The guard never grants on ambiguous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No credential on either transport.
    NotAuthenticated,
    /// Credential present but malformed, bad signature, or wrong kind.
    InvalidToken,
    /// Access token expired and no usable refresh token was available.
    TokenExpired,
    /// Refresh token verifies but does not match the session store.
    TokenRevoked,
    /// Valid identity, insufficient role.
    InsufficientRole,
    /// Session store unreachable. Fails closed.
    StoreUnavailable,
}

/// Guard rejection returned to API callers as JSON.
#[derive(Debug)]
pub struct AuthError {
    pub(super) kind: AuthErrorKind,
}

impl AuthError {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::TokenExpired
            | AuthErrorKind::TokenRevoked => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken => "Invalid token",
            AuthErrorKind::TokenExpired => "Token has expired",
            AuthErrorKind::TokenRevoked => "Token has been revoked",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::StoreUnavailable => "Session store unavailable",
        }
    }
}

impl From<AuthErrorKind> for AuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
