//! API client with transparent session recovery.
//!
//! Wraps reqwest so token expiry is invisible to callers: a 401 on a
//! retryable request triggers at most one refresh-and-replay cycle, and
//! concurrent 401s collapse onto a single refresh call through the
//! [`coordinator::RefreshCoordinator`]. Refresh, login and signup fail
//! directly; retrying those would recurse.
//!
//! The refresh token travels in the cookie jar only. The access token is
//! attached as a bearer header so the client can swap it without a
//! round-trip through cookie parsing.

mod coordinator;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::identity::Role;
use coordinator::RefreshCoordinator;

const REFRESH_PATH: &str = "api/auth/refresh-token";

/// How long a refresh (or any other) call may take before it counts as
/// failed. A hung refresh would otherwise stall every queued caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether a request may go through the refresh-and-replay cycle on 401.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    /// Ordinary request: one refresh-and-replay cycle allowed.
    Auto,
    /// Login, signup, refresh: surface the failure directly.
    Never,
}

/// The acting user as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
}

#[derive(Deserialize)]
struct SessionBody {
    user: SessionUser,
    access_token: String,
}

#[derive(Deserialize)]
struct ProfileBody {
    user: SessionUser,
}

#[derive(Deserialize)]
struct RefreshBody {
    access_token: String,
}

#[derive(Deserialize)]
struct RevokeBody {
    revoked: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    refresh_url: Url,
    access_token: RwLock<Option<String>>,
    refresh: RefreshCoordinator,
}

/// Client for the session API. Cheap to clone; clones share the cookie jar,
/// the stored access token and the refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client against a base URL such as `http://127.0.0.1:7380/`.
    pub fn new(base_url: Url) -> Result<Self, ClientError> {
        let refresh_url = base_url.join(REFRESH_PATH).map_err(ClientError::Url)?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                refresh_url,
                access_token: RwLock::new(None),
                refresh: RefreshCoordinator::new(),
            }),
        })
    }

    /// The access token currently attached to outgoing requests.
    pub fn access_token(&self) -> Option<String> {
        self.inner.access_token.read().unwrap().clone()
    }

    /// Replace the stored access token (e.g. when restoring a session).
    pub fn set_access_token(&self, token: Option<String>) {
        *self.inner.access_token.write().unwrap() = token;
    }

    /// Create an account and open a session.
    pub async fn signup(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        self.open_session("api/auth/signup", email, password).await
    }

    /// Authenticate and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ClientError> {
        self.open_session("api/auth/login", email, password).await
    }

    async fn open_session(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser, ClientError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .send(Method::POST, path, Some(body), RetryPolicy::Never)
            .await?;
        let session: SessionBody = parse_json(response).await?;
        self.set_access_token(Some(session.access_token));
        Ok(session.user)
    }

    /// Fetch the acting identity. Recovers transparently from an expired
    /// access token.
    pub async fn profile(&self) -> Result<SessionUser, ClientError> {
        let response = self
            .send(Method::GET, "api/auth/profile", None, RetryPolicy::Auto)
            .await?;
        let profile: ProfileBody = parse_json(response).await?;
        Ok(profile.user)
    }

    /// Close the session server-side and drop local credentials.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .send(Method::POST, "api/auth/logout", None, RetryPolicy::Auto)
            .await?;
        let _: serde_json::Value = parse_json(response).await?;
        self.set_access_token(None);
        Ok(())
    }

    /// Revoke another identity's session (privileged accounts only).
    /// Returns whether a session record existed.
    pub async fn revoke_session(&self, user_id: &str) -> Result<bool, ClientError> {
        let path = format!("api/auth/sessions/{}", user_id);
        let response = self
            .send(Method::DELETE, &path, None, RetryPolicy::Auto)
            .await?;
        let body: RevokeBody = parse_json(response).await?;
        Ok(body.revoked)
    }

    /// GET an arbitrary endpoint under the base URL with the full
    /// refresh-and-replay behavior. For resources outside the session API.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, ClientError> {
        let response = self.send(Method::GET, path, None, RetryPolicy::Auto).await?;
        parse_json(response).await
    }

    /// Issue a request, replaying it once after a shared refresh if it comes
    /// back 401 and the policy allows. The replay's outcome is final: a
    /// second 401 is surfaced, never retried again.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        policy: RetryPolicy,
    ) -> Result<reqwest::Response, ClientError> {
        let token = self.access_token();
        let response = self
            .dispatch(method.clone(), path, &body, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || policy == RetryPolicy::Never {
            return Ok(response);
        }

        let new_token = self.refresh_access_token().await?;
        self.dispatch(method, path, &body, Some(&new_token)).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: &Option<serde_json::Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.inner.base_url.join(path).map_err(ClientError::Url)?;
        let mut request = self.inner.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(ClientError::Transport)
    }

    /// Obtain a fresh access token, collapsing onto an in-flight refresh if
    /// one exists. On failure the stored token is cleared; the caller must
    /// re-authenticate.
    async fn refresh_access_token(&self) -> Result<String, ClientError> {
        let shared = self
            .inner
            .refresh
            .await_or_start(run_refresh(self.inner.clone()));
        let result = shared.clone().await;
        self.inner.refresh.clear(&shared);

        match result {
            Ok(token) => Ok(token),
            Err(e) => {
                self.set_access_token(None);
                tracing::debug!(error = %e, "Session refresh failed");
                Err(e.into())
            }
        }
    }
}

/// The shared refresh call. Runs once per collapse window regardless of how
/// many requests failed; stores the new access token before waking waiters.
async fn run_refresh(inner: Arc<ClientInner>) -> Result<String, RefreshError> {
    let response = inner
        .http
        .post(inner.refresh_url.clone())
        .send()
        .await
        .map_err(|e| RefreshError::Transport(Arc::new(e)))?;

    if !response.status().is_success() {
        return Err(RefreshError::Status(response.status().as_u16()));
    }

    let body: RefreshBody = response
        .json()
        .await
        .map_err(|e| RefreshError::Transport(Arc::new(e)))?;

    *inner.access_token.write().unwrap() = Some(body.access_token.clone());
    Ok(body.access_token)
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthenticated);
    }
    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        return Err(ClientError::Api { status, message });
    }

    response.json().await.map_err(ClientError::Transport)
}

/// Failure of the shared refresh call. Cloneable so every collapsed waiter
/// receives it.
#[derive(Debug, Clone)]
pub(crate) enum RefreshError {
    /// Refresh endpoint answered with a non-success status.
    Status(u16),
    /// Network failure or timeout; a timed-out refresh counts as failed.
    Transport(Arc<reqwest::Error>),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::Status(status) => write!(f, "Refresh rejected with status {}", status),
            RefreshError::Transport(e) => write!(f, "Refresh transport error: {}", e),
        }
    }
}

/// Client-side errors.
#[derive(Debug)]
pub enum ClientError {
    /// Network failure or timeout.
    Transport(reqwest::Error),
    /// Invalid base URL or path.
    Url(url::ParseError),
    /// The session is gone and could not be refreshed; re-authenticate.
    Unauthenticated,
    /// Any other non-success response.
    Api {
        status: StatusCode,
        message: String,
    },
}

impl From<RefreshError> for ClientError {
    fn from(_: RefreshError) -> Self {
        // The session is dead whether the server said so or the refresh call
        // never completed; either way the caller must log in again.
        ClientError::Unauthenticated
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "Transport error: {}", e),
            ClientError::Url(e) => write!(f, "Invalid URL: {}", e),
            ClientError::Unauthenticated => write!(f, "Not authenticated"),
            ClientError::Api { status, message } => {
                write!(f, "API error {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for ClientError {}
