//! Acting identity resolved from a verified credential.

use serde::{Deserialize, Serialize};

/// Role attribute attached to an identity. Closed set; stored in token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular customer account.
    Standard,
    /// Back-office account, passes the privilege guard.
    Privileged,
}

/// The identity a request acts as.
///
/// The user identifier is opaque to this crate; the directory that resolved
/// the credential owns its meaning. The identifier is immutable, the role is
/// whatever the directory reported at issuance time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role == Role::Privileged
    }
}
