//! JWT token issuing and verification.
//!
//! Dual-token system: short-lived access tokens (15 min) authorize requests
//! directly; long-lived refresh tokens (7 days) are only ever exchanged for
//! new access tokens and are tracked in the session store. The two kinds are
//! signed with distinct secrets so leaking one does not compromise the other.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::identity::{Identity, Role};

/// Token type discriminator embedded in the claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token (15 minutes), used as the request credential.
    Access,
    /// Long-lived refresh token (7 days), matched against the session store.
    Refresh,
}

/// Claims carried by both token kinds: identity plus issued-at/expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (opaque user id)
    pub sub: String,
    /// Role at issuance time
    pub role: Role,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub.clone(), self.role)
    }
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// A freshly signed token with its lifetime.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// Access/refresh pair issued together at login or signup.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Outcome of checking an access credential.
///
/// Expiry is an expected state the guard switches on, not an error: it is
/// the trigger for the silent refresh path.
#[derive(Debug)]
pub enum AccessCheck {
    Valid(Claims),
    Expired,
    Invalid,
    Missing,
}

/// Configuration for JWT operations. One key pair per token kind.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with distinct access/refresh secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        }
    }

    /// Issue a full access/refresh pair for an identity.
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.generate_access_token(identity)?,
            refresh: self.generate_refresh_token(identity)?,
        })
    }

    /// Generate a short-lived access token.
    pub fn generate_access_token(&self, identity: &Identity) -> Result<SignedToken, JwtError> {
        self.generate(
            identity,
            TokenType::Access,
            ACCESS_TOKEN_DURATION_SECS,
            &self.access_encoding,
        )
    }

    /// Generate a long-lived refresh token. The caller is responsible for
    /// recording it in the session store.
    pub fn generate_refresh_token(&self, identity: &Identity) -> Result<SignedToken, JwtError> {
        self.generate(
            identity,
            TokenType::Refresh,
            REFRESH_TOKEN_DURATION_SECS,
            &self.refresh_encoding,
        )
    }

    fn generate(
        &self,
        identity: &Identity,
        token_type: TokenType,
        duration: u64,
        key: &EncodingKey,
    ) -> Result<SignedToken, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let claims = Claims {
            sub: identity.user_id.clone(),
            role: identity.role,
            token_type,
            iat: now,
            exp: now + duration,
        };

        let token =
            jsonwebtoken::encode(&Header::default(), &claims, key).map_err(JwtError::Encoding)?;

        Ok(SignedToken { token, duration })
    }

    /// Check an access credential. Expiry is reported as its own state so
    /// the guard can branch into the refresh path.
    pub fn check_access_token(&self, token: Option<&str>) -> AccessCheck {
        let Some(token) = token else {
            return AccessCheck::Missing;
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match jsonwebtoken::decode::<Claims>(token, &self.access_decoding, &validation) {
            Ok(data) if data.claims.token_type == TokenType::Access => {
                AccessCheck::Valid(data.claims)
            }
            Ok(_) => AccessCheck::Invalid,
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AccessCheck::Expired,
                _ => AccessCheck::Invalid,
            },
        }
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.refresh_decoding, &validation)
            .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using an access token as a refresh token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new(b"access-secret-for-testing", b"refresh-secret-for-testing")
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_generate_and_check_access_token() {
        let config = test_config();
        let identity = Identity::new("u1", Role::Standard);

        let result = config.generate_access_token(&identity).unwrap();
        assert_eq!(result.duration, ACCESS_TOKEN_DURATION_SECS);

        match config.check_access_token(Some(&result.token)) {
            AccessCheck::Valid(claims) => {
                assert_eq!(claims.sub, "u1");
                assert_eq!(claims.role, Role::Standard);
                assert_eq!(claims.token_type, TokenType::Access);
                assert!(claims.exp > claims.iat);
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = test_config();
        let identity = Identity::new("u1", Role::Privileged);

        let result = config.generate_refresh_token(&identity).unwrap();
        assert_eq!(result.duration, REFRESH_TOKEN_DURATION_SECS);

        let claims = config.validate_refresh_token(&result.token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Privileged);
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_issue_produces_both_kinds() {
        let config = test_config();
        let pair = config.issue(&Identity::new("u1", Role::Standard)).unwrap();

        assert!(matches!(
            config.check_access_token(Some(&pair.access.token)),
            AccessCheck::Valid(_)
        ));
        assert!(config.validate_refresh_token(&pair.refresh.token).is_ok());
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = test_config();
        let identity = Identity::new("u1", Role::Standard);

        let access = config.generate_access_token(&identity).unwrap();
        let refresh = config.generate_refresh_token(&identity).unwrap();

        // Signed with different secrets, so cross-use fails at signature level
        assert!(config.validate_refresh_token(&access.token).is_err());
        assert!(matches!(
            config.check_access_token(Some(&refresh.token)),
            AccessCheck::Invalid
        ));
    }

    #[test]
    fn test_same_secret_cross_use_caught_by_typ() {
        // Even with identical secrets the typ claim rejects confusion
        let config = JwtConfig::new(b"shared-secret", b"shared-secret");
        let identity = Identity::new("u1", Role::Standard);

        let access = config.generate_access_token(&identity).unwrap();
        let refresh = config.generate_refresh_token(&identity).unwrap();

        assert!(matches!(
            config.validate_refresh_token(&access.token),
            Err(JwtError::WrongTokenType)
        ));
        assert!(matches!(
            config.check_access_token(Some(&refresh.token)),
            AccessCheck::Invalid
        ));
    }

    #[test]
    fn test_missing_and_garbage_tokens() {
        let config = test_config();

        assert!(matches!(
            config.check_access_token(None),
            AccessCheck::Missing
        ));
        assert!(matches!(
            config.check_access_token(Some("not-a-token")),
            AccessCheck::Invalid
        ));
        assert!(config.validate_refresh_token("not-a-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"access-1", b"refresh-1");
        let config2 = JwtConfig::new(b"access-2", b"refresh-2");
        let identity = Identity::new("u1", Role::Standard);

        let result = config1.generate_access_token(&identity).unwrap();
        assert!(matches!(
            config2.check_access_token(Some(&result.token)),
            AccessCheck::Invalid
        ));
    }

    #[test]
    fn test_expired_access_token_reports_expired() {
        let secret = b"access-secret";
        let encoding_key = EncodingKey::from_secret(secret);
        let now = unix_now();

        // Claims with exp in the past
        let claims = Claims {
            sub: "u1".to_string(),
            role: Role::Standard,
            token_type: TokenType::Access,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(secret, b"refresh-secret");
        assert!(matches!(
            config.check_access_token(Some(&token)),
            AccessCheck::Expired
        ));
    }

    #[test]
    fn test_expired_refresh_token_rejected() {
        let secret = b"refresh-secret";
        let encoding_key = EncodingKey::from_secret(secret);
        let now = unix_now();

        let claims = Claims {
            sub: "u1".to_string(),
            role: Role::Standard,
            token_type: TokenType::Refresh,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(b"access-secret", secret);
        assert!(config.validate_refresh_token(&token).is_err());
    }
}
