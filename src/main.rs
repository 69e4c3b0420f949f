//! # tienda-rs
//!
//! Barebones e-commerce backend in Rust.
//!
//! Serves CRUD endpoints for users, products, and deliveries over a MongoDB
//! document store, with bcrypt-hashed credentials and JWT cookie sessions.
//!
//! ## Architecture
//!
//! - **Model**: user/product/delivery documents; `active: false` is the soft-delete tombstone
//! - **Store**: MongoDB behind a small trait seam; tombstone filtering lives there, not in handlers
//! - **Auth**: bcrypt password hashes plus HS256 session tokens carried in an http-only cookie
//! - **HTTP**: Axum router with rate limiting, request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod http;
mod model;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::TokenService;
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::store::mongo::MongoStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    info!(
        bind = %config.bind,
        database = %config.database,
        "configuration loaded"
    );

    let store = MongoStore::connect(&config.mongo_uri, &config.database)
        .await
        .context("failed to connect to MongoDB")?;
    store
        .ensure_indexes()
        .await
        .context("failed to create user indexes")?;

    let state = AppState {
        store: Arc::new(store),
        tokens: TokenService::new(config.token_secret.as_bytes()),
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "tienda-rs listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
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
