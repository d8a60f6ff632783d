use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Secret;
use crate::errors::{JobError, PipelineError};
use crate::jobs::JobQueue;
use crate::models::TaskRequest;
use crate::pipeline::PublishRunner;

// ── Shared application state ──────────────────────────────────────────

/// How accepted requests are executed.
pub enum Dispatch {
    /// Run the pipeline inside the request; respond with the result.
    Inline(Arc<dyn PublishRunner>),
    /// Queue the request; respond immediately with a job id.
    Queued(JobQueue),
}

pub struct AppState {
    pub secret: Secret,
    pub dispatch: Dispatch,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EchoRequest {
    pub text: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Upstream(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (
            status,
            Json(serde_json::json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        ApiError::Unavailable(e.to_string())
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api-endpoint", post(submit_task))
        .route("/api/tasks", post(submit_task))
        .route("/api/jobs/{id}", get(get_job))
        .route("/generate", post(echo))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn submit_task(
    State(state): State<SharedState>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if !state.secret.matches(&request.secret) {
        tracing::warn!(task = %request.task, "rejected task request with invalid secret");
        return Err(ApiError::Forbidden("Invalid secret".to_string()));
    }
    request.validate().map_err(ApiError::BadRequest)?;

    match &state.dispatch {
        Dispatch::Inline(runner) => {
            // Runs to completion even if the caller disconnects
            let runner = runner.clone();
            let result = tokio::spawn(async move { runner.run(request).await })
                .await
                .map_err(|e| ApiError::Upstream(format!("Pipeline task failed: {}", e)))??;
            Ok(Json(serde_json::json!({
                "status": "ok",
                "repo": result.repo_url,
                "pages_url": result.pages_url,
                "commit_sha": result.commit_sha,
            }))
            .into_response())
        }
        Dispatch::Queued(queue) => {
            let job_id = queue.submit(request).await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "status": "ok",
                    "message": "accepted",
                    "job_id": job_id,
                })),
            )
                .into_response())
        }
    }
}

async fn get_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest(format!("Invalid job id: {}", id)))?;
    let Dispatch::Queued(queue) = &state.dispatch else {
        return Err(ApiError::NotFound(format!("Job {} not found", id)));
    };
    queue
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", id)))
}

async fn echo(Json(req): Json<EchoRequest>) -> impl IntoResponse {
    Json(serde_json::json!({"message": format!("You said: {}", req.text)}))
}
