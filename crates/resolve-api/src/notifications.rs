use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use resolve_types::api::{Claims, NotificationQuery};

use crate::auth::AppState;
use crate::error::blocking;

/// GET /notifications?unread=true, also served as /notifications/me
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let notifications = blocking(&state, move |s| {
        Ok(s.engine.notifier().list_for_user(&claims.email, query.unread)?)
    })
    .await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let found =
        blocking(&state, move |s| Ok(s.engine.notifier().mark_read(id, claims.sub)?)).await?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
