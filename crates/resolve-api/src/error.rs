use axum::http::StatusCode;
use tracing::error;

use resolve_engine::EngineError;

use crate::auth::{AppState, AppStateInner};

pub fn status_for(err: EngineError) -> StatusCode {
    match err {
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::UnknownActor(_) => StatusCode::FORBIDDEN,
        EngineError::Storage(e) => {
            error!("Storage error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run blocking engine work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&AppStateInner) -> resolve_engine::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(status_for)
}
