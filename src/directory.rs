//! User credential directory.
//!
//! Credential storage and password verification live outside this service;
//! the session core only ever receives a resolved identity and role. The
//! trait is the seam: production deployments back it with their user
//! service, tests and development runs use [`MemoryDirectory`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::identity::{Identity, Role};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve credentials to an identity. `Ok(None)` means unknown email or
    /// wrong password; the caller must not learn which.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, DirectoryError>;

    /// Create a new standard account and return its identity.
    async fn register(&self, email: &str, password: &str) -> Result<Identity, DirectoryError>;
}

/// In-process directory stand-in. Holds credentials in plain form and exists
/// only for tests and local development; it is not a credential store.
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<String, (String, Identity)>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with an explicit role. Used to create privileged
    /// accounts, which `register` never produces.
    pub fn insert(&self, email: &str, password: &str, role: Role) -> Identity {
        let identity = Identity::new(uuid::Uuid::new_v4().to_string(), role);
        self.users.lock().unwrap().insert(
            email.to_string(),
            (password.to_string(), identity.clone()),
        );
        identity
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(email)
            .filter(|(stored, _)| stored == password)
            .map(|(_, identity)| identity.clone()))
    }

    async fn register(&self, email: &str, password: &str) -> Result<Identity, DirectoryError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(DirectoryError::EmailTaken);
        }
        let identity = Identity::new(uuid::Uuid::new_v4().to_string(), Role::Standard);
        users.insert(
            email.to_string(),
            (password.to_string(), identity.clone()),
        );
        Ok(identity)
    }
}

#[derive(Debug)]
pub enum DirectoryError {
    /// An account already exists for this email.
    EmailTaken,
    /// The backing user service could not be reached.
    Unavailable(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::EmailTaken => write!(f, "Email is already registered"),
            DirectoryError::Unavailable(msg) => write!(f, "User directory unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DirectoryError {}
