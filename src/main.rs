use std::sync::Arc;

use clap::Parser;
use sessiongate::ServerConfig;
use sessiongate::cli::{Args, init_logging, load_secret, open_session_store};
use sessiongate::directory::MemoryDirectory;
use sessiongate::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret("ACCESS_TOKEN_SECRET", args.access_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(refresh_secret) =
        load_secret("REFRESH_TOKEN_SECRET", args.refresh_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    if access_secret == refresh_secret {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        std::process::exit(1);
    }

    let Some(sessions) = open_session_store(&args).await else {
        std::process::exit(1);
    };

    // Stand-in directory until wired to the real user service; accounts
    // exist for the lifetime of the process.
    let directory = Arc::new(MemoryDirectory::new());

    let config = ServerConfig {
        sessions,
        directory,
        access_secret,
        refresh_secret,
        secure_cookies: args.secure_cookies,
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();
    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
