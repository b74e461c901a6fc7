//! The session guard: per-request credential gate.
//!
//! Runs as an axum extractor. Valid access tokens pass straight through;
//! expired ones trigger a silent refresh against the session store, which
//! rotates the refresh token and stages replacement cookies on the response.
//! Anything else is rejected with 401 before the handler runs.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use std::time::Duration;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie, session_cookie};
use super::errors::{AuthError, AuthErrorKind};
use super::extract::extract_access_token;
use super::state::HasAuthState;
use crate::identity::Identity;
use crate::jwt::AccessCheck;

tokio::task_local! {
    /// Task-local staging area for Set-Cookie values produced during
    /// extraction. The guard cannot touch the response directly, so the
    /// `stage_session_cookies` middleware drains this after the handler.
    pub static NEW_SESSION_COOKIES: RefCell<Vec<String>>;
}

/// Response middleware that applies cookies staged by the guard.
/// Must wrap every router that uses the auth extractors.
pub async fn stage_session_cookies(request: Request, next: Next) -> Response {
    NEW_SESSION_COOKIES
        .scope(RefCell::new(Vec::new()), async move {
            let mut response = next.run(request).await;

            let staged = NEW_SESSION_COOKIES.with(|cell| cell.borrow_mut().split_off(0));
            for cookie in staged {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(SET_COOKIE, value);
                }
            }
            response
        })
        .await
}

fn stage_cookie(cookie: String) {
    let _ = NEW_SESSION_COOKIES.try_with(|cell| cell.borrow_mut().push(cookie));
}

/// Core guard state machine. Terminal states: Authorized (valid access
/// token), Authorized-via-refresh (expired access token recovered through
/// the session store), or rejection.
async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Identity, AuthErrorKind>
where
    S: HasAuthState + Send + Sync,
{
    let access_token = extract_access_token(&parts.headers).map(|(token, _)| token);

    match state.jwt().check_access_token(access_token) {
        AccessCheck::Valid(claims) => Ok(claims.identity()),
        AccessCheck::Missing => Err(AuthErrorKind::NotAuthenticated),
        AccessCheck::Invalid => Err(AuthErrorKind::InvalidToken),
        AccessCheck::Expired => refresh_session(parts, state).await,
    }
}

/// Silent refresh path: exchange a refresh cookie for a new token pair
/// without the caller noticing. The stored token is the source of truth;
/// a cryptographically valid token that mismatches it has been revoked
/// (logout elsewhere, or it lost a rotation race).
async fn refresh_session<S>(parts: &Parts, state: &S) -> Result<Identity, AuthErrorKind>
where
    S: HasAuthState + Send + Sync,
{
    let refresh_token =
        get_cookie(&parts.headers, REFRESH_COOKIE_NAME).ok_or(AuthErrorKind::TokenExpired)?;

    let claims = state
        .jwt()
        .validate_refresh_token(refresh_token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    let stored = state.sessions().get(&claims.sub).await.map_err(|e| {
        tracing::error!(error = %e, "Session store read failed during refresh");
        AuthErrorKind::StoreUnavailable
    })?;

    if stored.as_deref() != Some(refresh_token) {
        return Err(AuthErrorKind::TokenRevoked);
    }

    let identity = claims.identity();

    // Rotate: the presented refresh token is spent, the replacement becomes
    // the only valid one for this identity.
    let new_refresh = state
        .jwt()
        .generate_refresh_token(&identity)
        .map_err(|_| AuthErrorKind::InvalidToken)?;
    state
        .sessions()
        .put(
            &identity.user_id,
            &new_refresh.token,
            Duration::from_secs(new_refresh.duration),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session store write failed during refresh");
            AuthErrorKind::StoreUnavailable
        })?;

    let new_access = state
        .jwt()
        .generate_access_token(&identity)
        .map_err(|_| AuthErrorKind::InvalidToken)?;

    let secure = state.secure_cookies();
    stage_cookie(session_cookie(
        ACCESS_COOKIE_NAME,
        &new_access.token,
        new_access.duration,
        secure,
    ));
    stage_cookie(session_cookie(
        REFRESH_COOKIE_NAME,
        &new_refresh.token,
        new_refresh.duration,
        secure,
    ));

    tracing::debug!(user_id = %identity.user_id, "Access token refreshed via session guard");

    Ok(identity)
}

/// Extractor for endpoints that require an authenticated identity.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(AuthError::from)
    }
}

/// Extractor for endpoints restricted to privileged accounts.
/// Runs the session guard first, then checks the resolved role.
pub struct RequirePrivileged(pub Identity);

impl<S> FromRequestParts<S> for RequirePrivileged
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;

        if !identity.is_privileged() {
            return Err(AuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(RequirePrivileged(identity))
    }
}
