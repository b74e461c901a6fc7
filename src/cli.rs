//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crate::store::{MemorySessionStore, RedisSessionStore, SessionStore};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sessiongate",
    about = "Access/refresh session service for the storefront API"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7380")]
    pub port: u16,

    /// Redis URL for the session store
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Keep sessions in process memory instead of Redis (development only;
    /// sessions are lost on restart)
    #[arg(long)]
    pub memory_store: bool,

    /// Set the Secure flag on session cookies (required behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Path to file containing the access-token secret.
    /// Prefer the ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh-token secret.
    /// Prefer the REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded: missing
/// secrets are a fatal configuration error, never a per-request one.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or pass a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Open the configured session store, logging errors if it fails.
pub async fn open_session_store(args: &Args) -> Option<Arc<dyn SessionStore>> {
    if args.memory_store {
        info!("Using in-memory session store");
        return Some(Arc::new(MemorySessionStore::new()));
    }

    match RedisSessionStore::connect(&args.redis_url).await {
        Ok(store) => {
            info!(url = %args.redis_url, "Connected to Redis session store");
            Some(Arc::new(store))
        }
        Err(e) => {
            error!(url = %args.redis_url, error = %e, "Failed to connect to Redis");
            None
        }
    }
}
