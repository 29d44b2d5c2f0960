//! Web server entry point.
//!
//! # Responsibility
//! - Load settings, initialize logging and open the database.
//! - Serve the router until interrupted.

use fst_core::{init_logging, open_db, Settings};
use fst_web::{router, AppState};
use log::{error, info};
use std::error::Error;
use std::net::SocketAddr;

/// Environment variable overriding the listen address.
const BIND_ENV: &str = "FST_BIND";
const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("event=server_exit module=web status=error error={err}");
        eprintln!("fst_web: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load(None)?;
    init_logging("fst_web", &settings.logging)?;

    let conn = open_db(&settings.storage.database_path)?;
    let state = AppState::new(conn, &settings).into_shared();

    let bind = std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let addr: SocketAddr = bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "event=server_start module=web status=ok addr={addr} base_url={} media_root={}",
        settings.site.base_url,
        settings.storage.media_root.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=web status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=server_signal module=web status=error error={err}");
    }
}
