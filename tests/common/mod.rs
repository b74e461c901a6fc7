#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use sessiongate::directory::MemoryDirectory;
use sessiongate::identity::Role;
use sessiongate::jwt::{Claims, JwtConfig, TokenType};
use sessiongate::store::{MemorySessionStore, SessionStore, StoreError};
use sessiongate::{ServerConfig, create_app};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

/// Session store decorator that counts operations, for asserting how many
/// writes a scenario performs.
pub struct CountingStore {
    inner: MemorySessionStore,
    puts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemorySessionStore::new(),
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn put(
        &self,
        user_id: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(user_id, refresh_token, ttl).await
    }

    async fn get(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(user_id).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(user_id).await
    }
}

/// Session store that is permanently unreachable.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::new("connection refused"))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::new("connection refused"))
    }

    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::new("connection refused"))
    }
}

pub struct TestBackend {
    pub app: axum::Router,
    pub sessions: Arc<CountingStore>,
    pub directory: Arc<MemoryDirectory>,
    pub jwt: JwtConfig,
}

/// Build a test app over a counting in-memory store. The returned JwtConfig
/// uses the same secrets as the server, so tests can mint their own tokens.
pub fn test_backend() -> TestBackend {
    let sessions = Arc::new(CountingStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let config = server_config(sessions.clone(), directory.clone());

    TestBackend {
        app: create_app(&config),
        sessions,
        directory,
        jwt: JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET),
    }
}

pub fn server_config(
    sessions: Arc<dyn SessionStore>,
    directory: Arc<MemoryDirectory>,
) -> ServerConfig {
    ServerConfig {
        sessions,
        directory,
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        secure_cookies: false,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Mint an access token that expired `expired_ago` seconds ago, signed with
/// the test access secret.
pub fn mint_expired_access(user_id: &str, role: Role, expired_ago: u64) -> String {
    let now = unix_now();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        token_type: TokenType::Access,
        iat: now - expired_ago - 900,
        exp: now - expired_ago,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(ACCESS_SECRET),
    )
    .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Pull the value of a named cookie out of Set-Cookie lines, skipping
/// cleared (Max-Age=0) entries.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies
        .iter()
        .filter(|c| !c.contains("Max-Age=0"))
        .find_map(|c| {
            let (key, rest) = c.split_once('=')?;
            if key == name {
                Some(rest.split(';').next().unwrap_or("").to_string())
            } else {
                None
            }
        })
}

/// Check if cookies contain a token being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

pub fn refresh_cookie_only(refresh_token: &str) -> String {
    format!("refresh_token={}", refresh_token)
}
