//! # petstore-rs
//!
//! In-memory pet store HTTP service in Rust.
//!
//! Serves pets, orders/inventory, and users (with login/logout sessions) over
//! HTTP. Every resource route requires a single shared-secret token.
//!
//! ## Architecture
//!
//! - **Store**: generic record table with monotonic ids and a status index, one lock per table
//! - **Pets / Orders / Users**: domain facades over the store
//!   (form merges, inventory, batch create)
//! - **Sessions**: username -> login instant, with a configurable TTL
//! - **HTTP**: Axum router with token gate, rate limiting, request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod error;
mod http;
mod orders;
mod pets;
mod sessions;
mod store;
mod users;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::sessions::SessionRegistry;
use crate::users::UserDirectory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        token_source = %config.token.describe(),
        session_ttl = %humantime::format_duration(config.session_ttl),
        "configuration loaded"
    );

    let gate = config
        .token
        .into_gate()
        .context("failed to initialize auth token")?;
    let users = UserDirectory::new(SessionRegistry::new(config.session_ttl));
    let app = router(AppState::new(gate, users));

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "petstore-rs listening");

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
            info!("shutting down gracefully");
        })
        .await
        .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
