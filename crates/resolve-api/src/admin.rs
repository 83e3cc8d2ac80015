use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use resolve_types::api::Claims;

use crate::auth::AppState;
use crate::error::blocking;
use crate::middleware::require_staff;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /users: technicians are picked from this list when assigning.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let users = blocking(&state, |s| s.engine.users()).await?;
    Ok(Json(users))
}

/// POST /admin/escalations/run: one sweep outside the timer.
pub async fn run_escalations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let report = blocking(&state, |s| Ok(s.escalator.sweep()?)).await?;
    Ok(Json(report))
}
