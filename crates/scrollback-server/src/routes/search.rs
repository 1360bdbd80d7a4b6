//! Search endpoints.

use super::{api_error, bad_request, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use scrollback_types::{
    parse_timestamp, Commit, ContentTypeFilter, InteractionHit, SearchFilters, SearchRequest,
    SearchResults, SearchScope,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub role: Option<String>,
    pub tool: Option<String>,
    pub session: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub content_type: Option<String>,
    pub scope: Option<String>,
}

impl SearchQuery {
    fn filters(&self) -> Result<SearchFilters, String> {
        Ok(SearchFilters {
            role: non_empty(&self.role),
            tool: non_empty(&self.tool),
            session_id: non_empty(&self.session),
            since: self.since.as_deref().map(parse_bound).transpose()?,
            until: self.until.as_deref().map(parse_bound).transpose()?,
            content_type: self
                .content_type
                .as_deref()
                .map(str::parse::<ContentTypeFilter>)
                .transpose()?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bound(value: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    parse_timestamp(value).ok_or_else(|| format!("Invalid timestamp: '{}'", value))
}

fn require_query(q: &str) -> Result<(), (axum::http::StatusCode, String)> {
    if q.trim().is_empty() {
        return Err(bad_request("Query parameter 'q' is required"));
    }
    Ok(())
}

/// Full search over messages and tool usages.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchResults> {
    require_query(&query.q)?;
    let filters = query.filters().map_err(bad_request)?;
    let scope = query
        .scope
        .as_deref()
        .map(str::parse::<SearchScope>)
        .transpose()
        .map_err(bad_request)?
        .unwrap_or_default();

    let request = SearchRequest::new(query.q.clone())
        .with_limit(state.config.clamp_limit(query.limit))
        .with_filters(filters)
        .with_scope(scope);

    tracing::debug!(target: "scrollback::api", "Search {:?} scope={:?}", request.query, scope);

    state.index.search(&request).map(Json).map_err(api_error)
}

#[derive(Debug, Deserialize)]
pub struct ScopedQuery {
    #[serde(default)]
    pub q: String,
    pub session: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct InteractionSearchResponse {
    pub query: String,
    pub interactions: Vec<InteractionHit>,
}

/// Interactions containing matching messages.
pub async fn search_interactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopedQuery>,
) -> ApiResult<InteractionSearchResponse> {
    require_query(&query.q)?;
    let limit = state.config.clamp_limit(query.limit);
    let session = non_empty(&query.session);

    let interactions = state
        .index
        .search_interactions(&query.q, session.as_deref(), limit)
        .map_err(api_error)?;

    Ok(Json(InteractionSearchResponse {
        query: query.q.trim().to_string(),
        interactions,
    }))
}

#[derive(Serialize)]
pub struct CommitSearchResponse {
    pub query: String,
    pub commits: Vec<Commit>,
}

/// Commits whose hash or message contains the query.
pub async fn search_commits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopedQuery>,
) -> ApiResult<CommitSearchResponse> {
    require_query(&query.q)?;
    let limit = state.config.clamp_limit(query.limit);
    let session = non_empty(&query.session);

    let commits = state
        .index
        .search_commits(&query.q, session.as_deref(), limit)
        .map_err(api_error)?;

    Ok(Json(CommitSearchResponse {
        query: query.q.trim().to_string(),
        commits,
    }))
}
