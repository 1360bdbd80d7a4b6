//! HTTP route handlers.

pub mod commits;
pub mod messages;
pub mod search;
pub mod sessions;

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use scrollback_core::ScrollbackError;
use scrollback_types::IndexStats;
use serde::Serialize;
use std::sync::Arc;

/// Handler result: JSON body or a status with a plain-text reason.
pub type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Map an index error to its HTTP status.
pub fn api_error(err: ScrollbackError) -> (StatusCode, String) {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if matches!(err, ScrollbackError::InvalidQuery(_)) {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!(target: "scrollback::api", "Request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}

pub fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

pub fn not_found(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, message.into())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// "full_text" or "substring"
    pub search_mode: &'static str,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let search_mode = if state.index.search_mode().is_ranked() {
        "full_text"
    } else {
        "substring"
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        search_mode,
    })
}

pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<IndexStats> {
    state.index.get_stats().map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_mapping() {
        let (status, body) = api_error(ScrollbackError::MessageNotFound("m1".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("m1"));

        let (status, _) = api_error(ScrollbackError::InteractionNotFound {
            session_id: "s".into(),
            interaction_id: "s-int-9".into(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = api_error(ScrollbackError::InvalidQuery("empty".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let io = std::io::Error::other("disk gone");
        let (status, _) = api_error(ScrollbackError::IoError(io));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
