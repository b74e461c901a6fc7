//! Credential extraction from incoming requests.
//!
//! The access token rides on one of two transports: an explicit
//! `Authorization: Bearer` header (API clients) or the `access_token` cookie
//! (browsers). Extractors are tried in that order; the first match wins.

use axum::http::{HeaderMap, header};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};

/// Where the access credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    BearerHeader,
    AccessCookie,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Extract the access credential, preferring the bearer header over the
/// cookie. Returns the token and which transport carried it.
pub fn extract_access_token(headers: &HeaderMap) -> Option<(&str, CredentialSource)> {
    if let Some(token) = bearer_token(headers) {
        return Some((token, CredentialSource::BearerHeader));
    }
    get_cookie(headers, ACCESS_COOKIE_NAME).map(|t| (t, CredentialSource::AccessCookie))
}
