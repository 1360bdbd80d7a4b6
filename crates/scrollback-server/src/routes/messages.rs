//! Message lookup and context endpoints.

use super::{api_error, not_found, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use scrollback_types::{MessageContext, MessageDetail};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_CONTEXT: usize = 2;
const MAX_CONTEXT: usize = 10;

/// A message with its tool usages.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<MessageDetail> {
    state
        .index
        .get_message(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("Message not found: {}", id)))
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub before: Option<usize>,
    pub after: Option<usize>,
}

impl ContextQuery {
    fn window(&self) -> (usize, usize) {
        let clamp = |n: Option<usize>| n.unwrap_or(DEFAULT_CONTEXT).min(MAX_CONTEXT);
        (clamp(self.before), clamp(self.after))
    }
}

/// A message with neighbouring messages from its session.
pub async fn context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> ApiResult<MessageContext> {
    let (before, after) = query.window();
    state
        .index
        .get_message_with_context(&id, before, after)
        .map(Json)
        .map_err(api_error)
}
