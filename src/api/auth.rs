//! Session lifecycle endpoints.
//!
//! - POST `/signup` - Create an account and issue the initial token pair
//! - POST `/login` - Verify credentials and issue a token pair
//! - POST `/refresh-token` - Exchange the refresh cookie for a new pair
//! - GET `/profile` - Resolve the acting identity (protected)
//! - POST `/logout` - Revoke the session and clear both cookies
//! - DELETE `/sessions/{user_id}` - Revoke another identity's session (privileged)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, HasAuthState, REFRESH_COOKIE_NAME, RequirePrivileged, clear_cookie,
    get_cookie, session_cookie,
};
use crate::directory::{DirectoryError, UserDirectory};
use crate::identity::{Identity, Role};
use crate::jwt::JwtConfig;
use crate::store::SessionStore;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub secure_cookies: bool,
}

impl HasAuthState for AuthState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/profile", get(profile))
        .route("/logout", post(logout))
        .route("/sessions/{user_id}", delete(revoke_session))
        .with_state(state)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: String,
    role: Role,
}

#[derive(Serialize)]
struct SessionResponse {
    user: UserResponse,
    /// Also exposed in the body for clients that prefer bearer transport
    /// over the cookie jar.
    access_token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
}

/// Issue a token pair for an identity, record the refresh token as the only
/// valid one for that identity, and build the matching Set-Cookie headers.
async fn open_session(
    state: &AuthState,
    identity: &Identity,
) -> Result<(String, [(axum::http::HeaderName, String); 2]), ApiError> {
    let pair = state.jwt.issue(identity).map_err(|e| {
        error!(error = %e, "Failed to sign token pair");
        ApiError::internal("Failed to issue session")
    })?;

    state
        .sessions
        .put(
            &identity.user_id,
            &pair.refresh.token,
            Duration::from_secs(pair.refresh.duration),
        )
        .await
        .store_err("Failed to record refresh token")?;

    let cookies = [
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                &pair.access.token,
                pair.access.duration,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                &pair.refresh.token,
                pair.refresh.duration,
                state.secure_cookies,
            ),
        ),
    ];

    Ok((pair.access.token, cookies))
}

fn session_response(identity: &Identity, access_token: String) -> SessionResponse {
    SessionResponse {
        user: UserResponse {
            id: identity.user_id.clone(),
            role: identity.role,
        },
        access_token,
    }
}

async fn signup(
    State(state): State<AuthState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let identity = match state.directory.register(&body.email, &body.password).await {
        Ok(identity) => identity,
        Err(DirectoryError::EmailTaken) => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => {
            error!(error = %e, "Directory registration failed");
            return Err(ApiError::internal("User directory unavailable"));
        }
    };

    let (access_token, cookies) = open_session(&state, &identity).await?;
    info!(user_id = %identity.user_id, "Account created");

    Ok((
        StatusCode::CREATED,
        AppendHeaders(cookies),
        Json(session_response(&identity, access_token)),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = match state
        .directory
        .verify_credentials(&body.email, &body.password)
        .await
    {
        Ok(Some(identity)) => identity,
        Ok(None) => return Err(ApiError::unauthorized("Invalid email or password")),
        Err(e) => {
            error!(error = %e, "Directory lookup failed");
            return Err(ApiError::internal("User directory unavailable"));
        }
    };

    let (access_token, cookies) = open_session(&state, &identity).await?;
    info!(user_id = %identity.user_id, "Logged in");

    Ok((
        StatusCode::OK,
        AppendHeaders(cookies),
        Json(session_response(&identity, access_token)),
    ))
}

/// Exchange the refresh cookie for a new token pair.
///
/// The presented token must match the session store exactly; a match rotates
/// it, so each refresh token is usable once. This endpoint is deliberately
/// outside the session guard: it is the recovery path when no valid access
/// token exists, and must never trigger a nested refresh.
async fn refresh_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    let claims = state
        .jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let stored = state
        .sessions
        .get(&claims.sub)
        .await
        .store_err("Failed to read stored refresh token")?;

    if stored.as_deref() != Some(refresh_token) {
        return Err(ApiError::unauthorized("Refresh token has been revoked"));
    }

    let identity = claims.identity();
    let (access_token, cookies) = open_session(&state, &identity).await?;

    Ok((
        StatusCode::OK,
        AppendHeaders(cookies),
        Json(RefreshResponse { access_token }),
    ))
}

/// Identity resolution entry point for authenticated callers.
async fn profile(Auth(identity): Auth) -> impl IntoResponse {
    Json(serde_json::json!({
        "user": {
            "id": identity.user_id,
            "role": identity.role,
        }
    }))
}

/// Revoke the caller's session and clear both cookies.
///
/// Best-effort: a missing or already-invalid refresh cookie still clears
/// the cookies and reports success, there is nothing left to revoke.
async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Ok(claims) = state.jwt.validate_refresh_token(refresh_token) {
            state
                .sessions
                .delete(&claims.sub)
                .await
                .store_err("Failed to delete session record")?;
            info!(user_id = %claims.sub, "Logged out");
        }
    }

    let clear = [
        (
            SET_COOKIE,
            clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
        ),
        (
            SET_COOKIE,
            clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
        ),
    ];

    Ok((
        StatusCode::OK,
        AppendHeaders(clear),
        Json(serde_json::json!({ "success": true })),
    ))
}

#[derive(Serialize)]
struct RevokeResponse {
    revoked: bool,
}

/// Explicitly revoke another identity's session. Privileged accounts only.
async fn revoke_session(
    State(state): State<AuthState>,
    RequirePrivileged(actor): RequirePrivileged,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let existed = state
        .sessions
        .get(&user_id)
        .await
        .store_err("Failed to read session record")?
        .is_some();

    state
        .sessions
        .delete(&user_id)
        .await
        .store_err("Failed to delete session record")?;

    info!(user_id = %user_id, actor = %actor.user_id, "Session revoked");

    Ok((StatusCode::OK, Json(RevokeResponse { revoked: existed })))
}
