//! Authentication state trait.

use std::sync::Arc;

use crate::jwt::JwtConfig;
use crate::store::SessionStore;

/// Trait for router state types the session guard can run against.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn sessions(&self) -> &Arc<dyn SessionStore>;
    fn secure_cookies(&self) -> bool;
}
