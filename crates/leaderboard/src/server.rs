use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::errors::{StorageError, SubmitError};
use crate::html::{render_leaderboard, render_submit_form};
use crate::service::LeaderboardService;
use crate::types::{LeaderboardEntry, Submission, TeamHistory};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeaderboardService>,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: Arc<LeaderboardService>, max_upload_bytes: usize) -> Self {
        Self {
            service,
            metrics: None,
            start_time: Instant::now(),
            max_upload_bytes,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    environment: String,
    submission_limit: u32,
    expected_rows: usize,
    classes: usize,
    averaging: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::internal(format!("storage failure: {err}"))
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        let status = match &err {
            SubmitError::UnknownTeam => StatusCode::FORBIDDEN,
            SubmitError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            SubmitError::Encoding(_) => StatusCode::BAD_REQUEST,
            SubmitError::Grade(grade) if grade.is_submission_error() => StatusCode::BAD_REQUEST,
            SubmitError::Grade(_) | SubmitError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!("Leaderboard listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(handle_index))
        .route("/submit", get(handle_submit_form).post(handle_submit_form_post))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/api/leaderboard", get(handle_api_leaderboard))
        .route("/api/teams/:id/submissions", get(handle_api_team_submissions))
        .route("/api/submissions", post(handle_api_submit))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Fields of the upload form
struct UploadForm {
    team_key: String,
    submission: Option<Vec<u8>>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        team_key: String::new(),
        submission: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid form data: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "team_key" => {
                form.team_key = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("invalid team key: {err}")))?
                    .trim()
                    .to_string();
            }
            "submission" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("invalid upload: {err}")))?;
                form.submission = Some(bytes.to_vec());
            }
            other => warn!("ignoring unexpected form field '{}'", other),
        }
    }

    Ok(form)
}

impl UploadForm {
    fn require(self) -> Result<(String, Vec<u8>), ApiError> {
        if self.team_key.is_empty() {
            return Err(ApiError::bad_request("Team key is required"));
        }
        let upload = self
            .submission
            .ok_or_else(|| ApiError::bad_request("Submission file is required"))?;
        Ok((self.team_key, upload))
    }
}

/// Grading and the submission lock are blocking, so they run off the async
/// workers.
async fn submit_blocking(
    state: &SharedState,
    team_key: String,
    upload: Vec<u8>,
) -> Result<Submission, ApiError> {
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || service.submit(&team_key, &upload))
        .await
        .map_err(|err| ApiError::internal(format!("submission task failed: {err}")))?
        .map_err(ApiError::from)
}

async fn handle_index(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let entries = state.service.leaderboard()?;
    let history = state.service.history()?;
    Ok(Html(render_leaderboard(&entries, &history)))
}

async fn handle_submit_form() -> Html<String> {
    Html(render_submit_form(None, ""))
}

async fn handle_submit_form_post(State(state): State<SharedState>, multipart: Multipart) -> Response {
    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(err) => {
            return (err.status, Html(render_submit_form(Some(&err.message), ""))).into_response()
        }
    };

    let team_key = form.team_key.clone();
    let outcome = match form.require() {
        Ok((key, upload)) => submit_blocking(&state, key, upload).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(_) => Redirect::to("/").into_response(),
        Err(err) => (
            err.status,
            Html(render_submit_form(Some(&err.message), &team_key)),
        )
            .into_response(),
    }
}

async fn handle_health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    let service = &state.service;
    let grader = service.grader();
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_seconds(),
        environment: service.environment().to_string(),
        submission_limit: service.limit()?,
        expected_rows: grader.expected_rows(),
        classes: grader.table().len(),
        averaging: grader.config().averaging.to_string(),
    }))
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::not_found("metrics exporter not installed"))?;

    let mut response = Response::new(Body::from(handle.render()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}

async fn handle_api_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    Ok(Json(state.service.leaderboard()?))
}

async fn handle_api_team_submissions(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<TeamHistory>, ApiError> {
    state
        .service
        .team_history(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("team not found"))
}

async fn handle_api_submit(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<Submission>, ApiError> {
    let (team_key, upload) = read_upload_form(multipart).await?.require()?;
    let submission = submit_blocking(&state, team_key, upload).await?;
    Ok(Json(submission))
}
