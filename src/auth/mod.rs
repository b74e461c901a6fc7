//! Session guard and credential plumbing.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless) and
//! long-lived refresh tokens (7 days, tracked in the session store). Access
//! tokens are accepted from a bearer header or cookie and are transparently
//! refreshed by the guard when expired.

mod cookie;
mod errors;
mod extract;
mod guard;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
pub use errors::{AuthError, AuthErrorKind};
pub use extract::{CredentialSource, extract_access_token};
pub use guard::{Auth, NEW_SESSION_COOKIES, RequirePrivileged, stage_session_cookies};
pub use state::HasAuthState;
