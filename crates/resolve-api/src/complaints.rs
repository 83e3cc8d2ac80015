use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use resolve_engine::files::{MAX_ATTACHMENT_SIZE, Upload};
use resolve_types::api::{
    AssignRequest, Claims, CommentBody, CommentRequest, ComplaintQuery, ReopenRequest,
};
use resolve_types::models::{Complaint, ComplaintChanges, NewComplaint};

use crate::auth::AppState;
use crate::error::blocking;
use crate::middleware::require_staff;

/// GET /complaints: staff see everything, filtered by the query string.
pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ComplaintQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let complaints = blocking(&state, move |s| s.engine.list(&filter)).await?;
    Ok(Json(complaints))
}

/// GET /complaints/me
pub async fn my_complaints(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let complaints = blocking(&state, move |s| s.engine.list_for_user(&claims.email)).await?;
    Ok(Json(complaints))
}

/// Staff may act on any complaint; everyone else only on complaints they
/// own. Anonymous complaints have no owner.
fn may_access(claims: &Claims, complaint: &Complaint) -> bool {
    claims.is_staff() || complaint.user_id == Some(claims.sub)
}

async fn load_accessible(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
) -> Result<Complaint, StatusCode> {
    let complaint = blocking(state, move |s| s.engine.get(id)).await?;
    if !may_access(claims, &complaint) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(complaint)
}

pub async fn get_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let complaint = load_accessible(&state, &claims, id).await?;
    Ok(Json(complaint))
}

/// POST /complaints: multipart with a `complaint` JSON part and an optional
/// `file` part.
pub async fn submit_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, StatusCode> {
    let mut new: Option<NewComplaint> = None;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        match field.name() {
            Some("complaint") => {
                let raw = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                let parsed = serde_json::from_slice::<NewComplaint>(&raw).map_err(|e| {
                    warn!("Rejected malformed complaint payload: {}", e);
                    StatusCode::BAD_REQUEST
                })?;
                new = Some(parsed);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("attachment").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                if bytes.len() > MAX_ATTACHMENT_SIZE {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE);
                }
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    upload = Some(Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let mut new = new.ok_or(StatusCode::BAD_REQUEST)?;
    if new.title.trim().is_empty() || new.category.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    new.user_id = if new.is_anonymous { None } else { Some(claims.sub) };

    let complaint = blocking(&state, move |s| s.engine.submit(new, upload)).await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

pub async fn update_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(changes): Json<ComplaintChanges>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let complaint = blocking(&state, move |s| s.engine.update(id, changes)).await?;
    Ok(Json(complaint))
}

pub async fn delete_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    blocking(&state, move |s| s.engine.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    load_accessible(&state, &claims, id).await?;
    let is_staff = claims.is_staff();
    let entries = blocking(&state, move |s| s.engine.timeline(id, is_staff)).await?;
    Ok(Json(entries))
}

pub async fn get_attachments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    load_accessible(&state, &claims, id).await?;
    let attachments = blocking(&state, move |s| s.engine.attachments(id)).await?;
    Ok(Json(attachments))
}

pub async fn assign_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let complaint = blocking(&state, move |s| s.engine.assign(id, req.user_id)).await?;
    Ok(Json(complaint))
}

/// POST /complaints/{id}/comment: a comment on a missing complaint is
/// accepted and dropped, so the response carries `null`.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.comment.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let existing = blocking(&state, move |s| Ok(s.db.get_complaint(id)?)).await?;
    if let Some(complaint) = existing {
        if !may_access(&claims, &complaint) {
            return Err(StatusCode::FORBIDDEN);
        }
    }
    let entry = blocking(&state, move |s| {
        s.engine
            .add_comment(id, &req.comment, &claims.email, req.is_public)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn resolve_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<CommentBody>>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let comment = body.and_then(|Json(b)| b.comment);
    let complaint =
        blocking(&state, move |s| s.engine.resolve(id, comment, &claims.email)).await?;
    Ok(Json(complaint))
}

pub async fn close_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Option<Json<CommentBody>>,
) -> Result<impl IntoResponse, StatusCode> {
    load_accessible(&state, &claims, id).await?;
    let comment = body.and_then(|Json(b)| b.comment);
    let complaint = blocking(&state, move |s| s.engine.close(id, comment, &claims.email)).await?;
    Ok(Json(complaint))
}

pub async fn reopen_complaint(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReopenRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.reason.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    load_accessible(&state, &claims, id).await?;
    let complaint =
        blocking(&state, move |s| s.engine.reopen(id, &req.reason, &claims.email)).await?;
    Ok(Json(complaint))
}

pub async fn statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let stats = blocking(&state, |s| s.engine.statistics()).await?;
    Ok(Json(stats))
}

/// GET /complaints/export: CSV download.
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_staff(&claims)?;
    let csv = blocking(&state, |s| s.engine.export_csv()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"grievances.csv\"",
            ),
        ],
        csv,
    ))
}
