//! HTTP boundary: routing, query parsing, status codes and JSON errors.
//!
//! Handlers translate requests into calls on the compose pipelines and map [`CardError`] to
//! responses. All state here is immutable after startup.
//!
//! [`CardError`]: crate::foundation::error::CardError

pub mod routes;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::{Router, routing::get};

use crate::{
    assets::store::AssetStore,
    compose::lineup::LineupService,
    config::CardConfig,
    fetch::client::Fetcher,
    foundation::error::CardResult,
    render::text::TextRenderer,
};

/// Shared, read-only service state. Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CardConfig>,
    pub fetcher: Fetcher,
    pub lineup: LineupService,
}

impl AppState {
    /// Build the fetcher and resolve the font chain once for the process lifetime.
    pub fn new(cfg: CardConfig, asset_root: impl Into<PathBuf>) -> CardResult<Self> {
        cfg.validate()?;
        let cfg = Arc::new(cfg);
        let assets = AssetStore::new(asset_root);
        let fetcher = Fetcher::new(&cfg.fetch)?;
        let text = TextRenderer::from_chain(&TextRenderer::strategies(&cfg.fonts, &assets));
        let lineup = LineupService::new(
            Arc::clone(&cfg),
            assets,
            fetcher.clone(),
            Arc::new(text),
        );
        Ok(Self {
            cfg,
            fetcher,
            lineup,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::discovery))
        .route("/health", get(routes::health))
        .route("/generate", get(routes::generate))
        .route("/vimage", get(routes::vimage))
        .with_state(state)
}

/// Serve on an already-bound listener until ctrl-c.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> CardResult<()> {
    let addr = listener.local_addr().context("listener address")?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;
    Ok(())
}

/// Bind `addr` and serve.
pub async fn bind_and_serve(addr: SocketAddr, state: AppState) -> CardResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    serve(listener, state).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
