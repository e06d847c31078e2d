use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path},
    http::{StatusCode, header, request::Parts},
    response::sse::{KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::state::{Analytics, AppState, RunState, RunStatus, SseStream};
use roundtable_core::ResearchSummary;

#[derive(Debug, Deserialize)]
pub struct StartResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResearchResponse {
    pub run_id: String,
    pub state: RunState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub runs: Vec<ResearchSummary>,
}

pub fn research_router() -> Router<AppState> {
    Router::new()
        .route("/research", post(start_research).get(list_history))
        .route("/research/runs/:id", get(get_run))
        .route("/research/runs/:id/stream", get(stream_run))
        .route("/research/:index/report", get(get_report))
        .route("/research/:index/data", get(get_data))
        .route("/analytics", get(get_analytics))
}

#[instrument(skip_all, fields(topic = %payload.topic))]
async fn start_research(
    GuardedState(state): GuardedState,
    Json(payload): Json<StartResearchRequest>,
) -> Result<(StatusCode, Json<StartResearchResponse>), AppError> {
    if payload.topic.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "topic must not be empty",
        ));
    }

    let run_id = state.service().start_run(
        payload.topic,
        payload.instructions.unwrap_or_default(),
    );

    let response = StartResearchResponse {
        run_id,
        state: RunState::Running,
        message: "research started".into(),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn get_run(
    GuardedState(state): GuardedState,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>, AppError> {
    match state.service().status(&run_id) {
        Some(status) => Ok(Json(status)),
        None => Err(AppError::new(StatusCode::NOT_FOUND, "run not found")),
    }
}

async fn stream_run(
    GuardedState(state): GuardedState,
    Path(run_id): Path<String>,
) -> Result<Sse<SseStream>, AppError> {
    match state.service().event_stream(&run_id) {
        Some(stream) => Ok(Sse::new(stream).keep_alive(KeepAlive::new())),
        None => Err(AppError::new(StatusCode::NOT_FOUND, "run not found")),
    }
}

async fn list_history(
    GuardedState(state): GuardedState,
) -> Result<Json<HistoryResponse>, AppError> {
    let runs = state.service().history().await;
    Ok(Json(HistoryResponse { runs }))
}

/// Markdown report for a stored session. Out-of-range indices yield the
/// workflow's literal placeholder text, not an HTTP error.
async fn get_report(GuardedState(state): GuardedState, Path(index): Path<isize>) -> Response {
    let report = state.service().report(index).await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        report,
    )
        .into_response()
}

/// The verbatim stored record as JSON.
async fn get_data(
    GuardedState(state): GuardedState,
    Path(index): Path<isize>,
) -> Result<Response, AppError> {
    match state.service().data(index).await {
        Some(raw) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            raw,
        )
            .into_response()),
        None => Err(AppError::new(StatusCode::NOT_FOUND, "research not found")),
    }
}

async fn get_analytics(GuardedState(state): GuardedState) -> Result<Json<Analytics>, AppError> {
    Ok(Json(state.service().analytics().await))
}

pub struct GuardedState(pub AppState);

#[async_trait]
impl FromRequestParts<AppState> for GuardedState {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let app_state = state.clone();

        if !app_state.gui_enabled() {
            return Err(AppError::new(StatusCode::FORBIDDEN, "GUI disabled"));
        }

        if let Some(expected) = app_state.auth_token() {
            let provided = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim);

            match provided {
                Some(token) if token == expected.as_str() => {}
                _ => {
                    return Err(AppError::new(
                        StatusCode::UNAUTHORIZED,
                        "invalid auth token",
                    ));
                }
            }
        }

        Ok(GuardedState(app_state))
    }
}
