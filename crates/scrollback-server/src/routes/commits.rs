//! Commit lookup.

use super::{api_error, not_found, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use scrollback_types::Commit;
use std::sync::Arc;

/// A commit by hash. Lookup is case-insensitive.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> ApiResult<Commit> {
    state
        .index
        .get_commit(&hash)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("Commit not found: {}", hash)))
}
