pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ExecutionMode};
use crate::jobs::{JobQueue, JobWorkers};
use crate::pipeline::{Pipeline, PublishRunner};
use api::{AppState, Dispatch, SharedState};

/// Build the application router with request tracing.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the dispatch strategy for the configured mode. Deferred mode also
/// returns the worker pool so the caller can drain it on shutdown.
pub fn build_state(config: &AppConfig, runner: Arc<dyn PublishRunner>) -> (SharedState, Option<JobWorkers>) {
    let (dispatch, workers) = match config.server.mode {
        ExecutionMode::Sync => (Dispatch::Inline(runner), None),
        ExecutionMode::Deferred => {
            let (queue, workers) =
                JobQueue::start(runner, config.server.workers, config.server.queue_capacity);
            (Dispatch::Queued(queue), Some(workers))
        }
    };
    let state = Arc::new(AppState {
        secret: config.secret.clone(),
        dispatch,
    });
    (state, workers)
}

/// Start the HTTP server and run until Ctrl+C. Queued jobs are drained
/// before returning.
pub async fn start_server(config: AppConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(&config).context("Failed to build publish pipeline")?;
    let (state, workers) = build_state(&config, Arc::new(pipeline));
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        mode = %config.server.mode,
        staging_dir = %config.staging_dir.display(),
        "pagesmith listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(workers) = workers {
        tracing::info!("waiting for queued jobs to finish");
        workers.join().await;
    }
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
