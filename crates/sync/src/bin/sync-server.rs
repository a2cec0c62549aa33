//! Sync service entry point.
//!
//! Wires configuration, the GitHub tracker, the wrapper index, and the
//! sync engine into the webhook HTTP server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use sync::bootstrap::ensure_status_labels;
use sync::{build_router, AppState, Config, SyncEngine, WrapperIndex};
use tracker::{GitHubTracker, IssueTracker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    info!("Starting sync server...");

    let config = Config::default();

    let meta_repo = config
        .meta_repo
        .clone()
        .context("META_REPO must be set (owner/repo)")?;
    let token = config
        .github_token
        .clone()
        .context("GITHUB_TOKEN must be set")?;

    info!(
        meta_repo = %meta_repo,
        port = config.port,
        index_path = %config.index_path,
        signature_checks = config.webhook_secret.is_some(),
        "Sync service configured"
    );

    let tracker: Arc<dyn IssueTracker> =
        Arc::new(GitHubTracker::new(&token).context("Failed to build GitHub client")?);

    if config.bootstrap_labels {
        ensure_status_labels(tracker.as_ref(), &meta_repo).await;
    }

    let index = WrapperIndex::load(&config.index_path).await;
    let engine = Arc::new(SyncEngine::new(tracker, meta_repo, index));

    let state = AppState {
        config: config.clone(),
        engine,
    };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(addr = %addr, "Starting HTTP server");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
