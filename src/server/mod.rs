//! HTTP surface.
//!
//! - `POST /upload` runs one ingestion job from form fields and returns its outcome
//! - `GET /frames/:filename` serves sampled frames to the description model
//! - `GET /health` liveness probe
//!
//! Jobs are serialized: workspace release empties shared areas, so two jobs
//! must never overlap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::core::IngestionController;
use crate::domain::{JobOutcome, JobRequest, Stage};
use crate::error::IngestError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    controller: Arc<IngestionController>,
    frames_dir: PathBuf,
    job_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(controller: IngestionController) -> Self {
        let frames_dir = controller.workspace().frames_dir().to_path_buf();
        Self {
            controller: Arc::new(controller),
            frames_dir,
            job_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/frames/:filename", get(serve_frame))
        .route("/health", get(health))
        .fallback(|| async { not_found() })
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &ResolvedConfig) -> Result<()> {
    config.validate()?;

    let state = AppState::new(IngestionController::from_config(config));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(address = %config.bind, base_url = %config.base_url, "Listening");

    axum::serve(listener, app).await.context("HTTP server failed")
}

async fn upload(
    State(state): State<AppState>,
    form: Result<Form<JobRequest>, FormRejection>,
) -> (StatusCode, Json<JobOutcome>) {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            let reason = rejection.body_text();
            warn!(error = %reason, "Malformed upload form");
            let outcome: JobOutcome = IngestError::validation(reason).into();
            return (status_for(&outcome), Json(outcome));
        }
    };

    let _guard = state.job_lock.lock().await;
    let outcome = state.controller.run(request).await;
    (status_for(&outcome), Json(outcome))
}

async fn serve_frame(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    if !is_plain_file_name(&filename) {
        debug!(%filename, "Rejected frame path");
        return not_found();
    }

    match tokio::fs::read(state.frames_dir.join(&filename)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&filename))], bytes).into_response(),
        Err(_) => not_found(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

fn status_for(outcome: &JobOutcome) -> StatusCode {
    match outcome.failed_stage() {
        None => StatusCode::OK,
        Some(Stage::Validating) => StatusCode::BAD_REQUEST,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A single path component that cannot escape the frames area
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && !name.starts_with('.')
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        _ => "application/octet-stream",
    }
}
