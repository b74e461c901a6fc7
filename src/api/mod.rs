mod auth;
mod error;

use axum::Router;
use std::sync::Arc;

use crate::directory::UserDirectory;
use crate::jwt::JwtConfig;
use crate::store::SessionStore;

pub use auth::AuthState;

/// Create the API router.
pub fn create_api_router(
    jwt: Arc<JwtConfig>,
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn UserDirectory>,
    secure_cookies: bool,
) -> Router {
    let auth_state = AuthState {
        jwt,
        sessions,
        directory,
        secure_cookies,
    };

    Router::new().nest("/auth", auth::router(auth_state))
}
