//! Reporting HTTP API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::account_link::LinkedAccount;
use crate::error::WardenError;
use crate::linking::AccountLinker;
use crate::shift_ledger::{ShiftEnd, ShiftLedger, ShiftRecord};
use crate::types::ExternalId;

/// Shared application state.
pub struct AppState {
    pub shifts: Arc<dyn ShiftLedger>,
    pub linker: Arc<AccountLinker>,
    pub registry: Registry,
}

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Result of a shift clock action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftActionResponse {
    pub id: i64,
    /// `"started"`, `"ended"` or `"recorded_empty"`.
    pub action: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkRequest {
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkResponse {
    pub account: LinkedAccount,
    pub group: Option<String>,
    pub role: Option<String>,
    pub message: String,
}

/// Create the HTTP router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/shifts", get(list_shifts))
        .route("/api/shifts/:external_id/start", post(start_shift))
        .route("/api/shifts/:external_id/end", post(end_shift))
        .route("/api/links/:external_id", get(get_link).post(link_account))
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Prometheus text exposition.
async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&state.registry.gather(), &mut buffer)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    ))
}

/// All shifts, newest first.
async fn list_shifts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ShiftRecord>>, AppError> {
    Ok(Json(state.shifts.list_shifts().await?))
}

async fn start_shift(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> Result<Json<ShiftActionResponse>, AppError> {
    let id = state.shifts.start_shift(&ExternalId::new(external_id)).await?;
    Ok(Json(ShiftActionResponse {
        id,
        action: "started".to_string(),
    }))
}

async fn end_shift(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> Result<Json<ShiftActionResponse>, AppError> {
    let response = match state.shifts.end_shift(&ExternalId::new(external_id)).await? {
        ShiftEnd::Closed { id } => ShiftActionResponse {
            id,
            action: "ended".to_string(),
        },
        ShiftEnd::RecordedEmpty { id } => ShiftActionResponse {
            id,
            action: "recorded_empty".to_string(),
        },
    };
    Ok(Json(response))
}

async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> Result<Json<LinkedAccount>, AppError> {
    Ok(Json(
        state
            .linker
            .linked_account(&ExternalId::new(external_id))
            .await?,
    ))
}

async fn link_account(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    let report = state
        .linker
        .link(&ExternalId::new(external_id), &request.username)
        .await?;
    let message = report.summary();
    let (group, role) = match report.group {
        Some(membership) => (Some(membership.group_name), Some(membership.role_name)),
        None => (None, None),
    };
    Ok(Json(LinkResponse {
        account: report.account,
        group,
        role,
        message,
    }))
}

/// Application error type. Lookups that found nothing map to 404, everything
/// else to 500.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.downcast_ref::<WardenError>() {
            Some(WardenError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string()
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
