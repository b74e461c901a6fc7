//! Session store: the single source of truth for refresh-token validity.
//!
//! One record per identity, keyed `refresh_token:{user_id}`, holding the
//! currently valid refresh token string with a TTL equal to the token's
//! lifetime. A refresh token that verifies cryptographically but does not
//! match the stored value is revoked and must be rejected.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Key-value store mapping a user identity to its current refresh token.
///
/// `put` is a last-writer-wins overwrite; no locking is required across
/// requests because a losing concurrent refresh produces a token that will
/// mismatch the store on its next use.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record the current refresh token for an identity, replacing any
    /// previous one. Expiry is handled by the store, not by sweeping.
    async fn put(&self, user_id: &str, refresh_token: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// Fetch the current refresh token for an identity, if any.
    async fn get(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Drop the record for an identity (logout or explicit revocation).
    async fn delete(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Session store backed by Redis with native key expiry (`SET ... EX`).
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

fn session_key(user_id: &str) -> String {
    format!("refresh_token:{}", user_id)
}

impl RedisSessionStore {
    /// Connect to Redis at the given URL (e.g. `redis://127.0.0.1:6379`).
    /// The connection manager reconnects on its own after outages.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(StoreError::from)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        user_id: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(session_key(user_id), refresh_token, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(session_key(user_id)).await?;
        Ok(value)
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(session_key(user_id)).await?;
        Ok(())
    }
}

/// In-process session store for tests and `--memory-store` development runs.
/// Entries past their deadline read as absent, mirroring Redis expiry.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        user_id: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap()
            .insert(user_id.to_string(), (refresh_token.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(user_id) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(user_id);
                Ok(None)
            }
            Some((token, _)) => Ok(Some(token.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(user_id);
        Ok(())
    }
}

/// Session store failure. Always fails the request closed (500), never open.
#[derive(Debug)]
pub struct StoreError(String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        Self(e.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session store unavailable: {}", self.0)
    }
}

impl std::error::Error for StoreError {}
