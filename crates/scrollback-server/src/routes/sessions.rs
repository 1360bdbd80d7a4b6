//! Session and interaction timeline endpoints.

use super::{api_error, not_found, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use scrollback_types::{Interaction, InteractionDetail, SessionDetail, SessionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
    pub total_count: usize,
}

/// Indexed sessions, most recent activity first.
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<SessionListResponse> {
    let sessions = state.index.list_sessions().map_err(api_error)?;
    Ok(Json(SessionListResponse {
        total_count: sessions.len(),
        sessions,
    }))
}

/// A session with all of its messages in order.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SessionDetail> {
    state
        .index
        .get_session(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("Session not found: {}", id)))
}

#[derive(Deserialize)]
pub struct InteractionListQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct InteractionListResponse {
    pub interactions: Vec<Interaction>,
    pub total_count: usize,
}

/// Interactions of a session in order.
pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<InteractionListQuery>,
) -> ApiResult<InteractionListResponse> {
    let interactions = state
        .index
        .get_interactions(&id, query.limit)
        .map_err(api_error)?;

    Ok(Json(InteractionListResponse {
        total_count: interactions.len(),
        interactions,
    }))
}

/// One interaction with its member messages and tool usages.
pub async fn get_interaction(
    State(state): State<Arc<AppState>>,
    Path((id, interaction_id)): Path<(String, String)>,
) -> ApiResult<InteractionDetail> {
    state
        .index
        .get_interaction(&id, &interaction_id)
        .map(Json)
        .map_err(api_error)
}
