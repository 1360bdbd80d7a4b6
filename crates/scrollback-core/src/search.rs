//! Search query planning.
//!
//! A request is answered from two corpora (message text and tool text),
//! each filtered and scored by the store. Hits are tagged with their match
//! source, merged and ordered best-first, or newest-first when the store has
//! no relevance engine.

use crate::store::Store;
use crate::{Result, ScrollbackError};
use scrollback_types::{
    Commit, InteractionHit, SearchFilters, SearchHit, SearchRequest, SearchResults,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// How many message hits to pull per requested interaction.
const INTERACTION_OVERFETCH: usize = 3;

/// Execute a search request.
pub fn search(store: &Store, request: &SearchRequest) -> Result<SearchResults> {
    let query = validate_query(&request.query)?;
    let ranked = store.search_mode().is_ranked();

    let mut hits = Vec::new();
    if request.limit > 0 {
        if request.scope.includes_messages() {
            hits.extend(store.search_messages(query, &request.filters, request.limit)?);
        }
        if request.scope.includes_tools() {
            hits.extend(store.search_tools(query, &request.filters, request.limit)?);
        }
    }

    merge(&mut hits, ranked);
    hits.truncate(request.limit);

    debug!(
        target: "scrollback::search",
        "Query {:?} ({:?}) returned {} hits, ranked={}",
        query,
        request.scope,
        hits.len(),
        ranked
    );

    Ok(SearchResults {
        query: query.to_string(),
        hits,
        ranked,
    })
}

/// Interactions containing messages that match `query`, best match first,
/// each interaction listed once.
pub fn search_interactions(
    store: &Store,
    query: &str,
    session_id: Option<&str>,
    limit: usize,
) -> Result<Vec<InteractionHit>> {
    let query = validate_query(query)?;
    let filters = SearchFilters {
        session_id: session_id.map(str::to_string),
        ..Default::default()
    };
    let hits = store.search_messages(query, &filters, limit.saturating_mul(INTERACTION_OVERFETCH))?;

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for hit in hits {
        if results.len() >= limit {
            break;
        }
        let Some(interaction) = store.interaction_for_message(&hit.message_id)? else {
            continue;
        };
        if !seen.insert(interaction.interaction_id.clone()) {
            continue;
        }
        results.push(InteractionHit {
            interaction,
            match_message_id: hit.message_id,
            match_content_type: hit
                .content_type
                .map(|ct| ct.as_str().to_string())
                .unwrap_or_default(),
            score: hit.score,
        });
    }

    Ok(results)
}

/// Commits whose hash or message contains `query`, newest first.
pub fn search_commits(
    store: &Store,
    query: &str,
    session_id: Option<&str>,
    limit: usize,
) -> Result<Vec<Commit>> {
    let query = validate_query(query)?;
    store.search_commits(query, session_id, limit)
}

/// Reject queries with nothing to search for.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ScrollbackError::InvalidQuery(
            "search query must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Order merged hits: by score when ranked, otherwise by recency.
/// The sort is stable, so equal keys keep corpus order.
fn merge(hits: &mut [SearchHit], ranked: bool) {
    if ranked {
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    } else {
        hits.sort_by(|a, b| match (a.timestamp, b.timestamp) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}
