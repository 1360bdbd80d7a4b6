//! The search index: ingestion and every read operation, behind one handle.

use crate::context::message_with_context;
use crate::loader::SessionLoader;
use crate::normalizer::{normalize_session, time_span, total_cost};
use crate::search;
use crate::segmenter::segment;
use crate::store::{SearchMode, Store};
use crate::{Result, ScrollbackError};
use chrono::Utc;
use scrollback_types::{
    Commit, IndexStats, Interaction, InteractionDetail, InteractionHit, MessageContext,
    MessageDetail, SearchRequest, SearchResults, SessionDetail, SessionInfo, SessionRecord,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// What one `index_session` call wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub session_id: String,
    pub message_count: usize,
    pub tool_count: usize,
    pub interaction_count: usize,
    pub commit_count: usize,
}

/// Transcript search index.
///
/// Writes for the same session must be serialized by the caller; reads may
/// run concurrently.
pub struct SearchIndex {
    store: Store,
}

impl SearchIndex {
    pub fn open(path: &Path, full_text: bool) -> Result<Self> {
        Ok(Self::from_store(Store::open(path, full_text)?))
    }

    pub fn open_in_memory(full_text: bool) -> Result<Self> {
        Ok(Self::from_store(Store::open_in_memory(full_text)?))
    }

    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    pub fn search_mode(&self) -> SearchMode {
        self.store.search_mode()
    }

    /// Normalize, segment and store one session, replacing any prior state.
    pub fn index_session(
        &self,
        session_id: &str,
        records: &[Value],
        source: &str,
        session_path: Option<&str>,
        project_directory: Option<&str>,
    ) -> Result<IndexSummary> {
        let normalized = normalize_session(session_id, records);
        let interactions = segment(session_id, &normalized);

        let (first, last) = time_span(normalized.iter().map(|r| &r.message));
        let session = SessionRecord {
            session_id: session_id.to_string(),
            source: source.to_string(),
            session_path: session_path.map(str::to_string),
            project_directory: project_directory.map(str::to_string),
            created_at: first,
            last_message_at: last,
            message_count: normalized.len() as u32,
            total_cost_usd: total_cost(normalized.iter().map(|r| &r.message)),
            indexed_at: Utc::now(),
        };

        self.store.replace_session(&session, &normalized, &interactions)?;

        let summary = IndexSummary {
            session_id: session_id.to_string(),
            message_count: normalized.len(),
            tool_count: normalized.iter().map(|r| r.tool_usages.len()).sum(),
            interaction_count: interactions.len(),
            commit_count: interactions.iter().map(|i| i.commits.len()).sum(),
        };

        info!(
            target: "scrollback::index",
            "Indexed session {}: {} messages, {} tool usages, {} interactions, {} commits",
            summary.session_id,
            summary.message_count,
            summary.tool_count,
            summary.interaction_count,
            summary.commit_count
        );

        Ok(summary)
    }

    /// Load a discovered session through `loader` and index it.
    pub fn index_from_loader(
        &self,
        loader: &dyn SessionLoader,
        info: &SessionInfo,
    ) -> Result<IndexSummary> {
        let records = loader.load_session(&info.id)?;
        let path = info.path.as_ref().map(|p| p.to_string_lossy().into_owned());
        self.index_session(
            &info.id,
            &records,
            &info.source,
            path.as_deref(),
            info.project_directory.as_deref(),
        )
    }

    /// Index every session the loader knows about. Sessions that fail to
    /// load are skipped and logged.
    pub fn index_all(&self, loader: &dyn SessionLoader) -> Result<Vec<IndexSummary>> {
        let sessions = loader.discover_sessions()?;
        let mut summaries = Vec::with_capacity(sessions.len());

        for info in &sessions {
            match self.index_from_loader(loader, info) {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    warn!(target: "scrollback::index", "Failed to index session {}: {}", info.id, e);
                }
            }
        }

        debug!(
            target: "scrollback::index",
            "Indexed {}/{} discovered sessions",
            summaries.len(),
            sessions.len()
        );
        Ok(summaries)
    }

    pub fn remove_session(&self, session_id: &str) -> Result<bool> {
        self.store.delete_session(session_id)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        search::search(&self.store, request)
    }

    pub fn search_interactions(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InteractionHit>> {
        search::search_interactions(&self.store, query, session_id, limit)
    }

    pub fn search_commits(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>> {
        search::search_commits(&self.store, query, session_id, limit)
    }

    pub fn get_message_with_context(
        &self,
        message_id: &str,
        before: usize,
        after: usize,
    ) -> Result<MessageContext> {
        message_with_context(&self.store, message_id, before, after)
    }

    /// An interaction of `session_id` with its member messages and tool usages.
    pub fn get_interaction(
        &self,
        session_id: &str,
        interaction_id: &str,
    ) -> Result<InteractionDetail> {
        let interaction = self
            .store
            .get_interaction(session_id, interaction_id)?
            .ok_or_else(|| ScrollbackError::InteractionNotFound {
                session_id: session_id.to_string(),
                interaction_id: interaction_id.to_string(),
            })?;

        let messages = self.store.interaction_messages(&interaction.interaction_id)?;
        let tool_usages = self
            .store
            .interaction_tool_usages(&interaction.interaction_id)?;

        Ok(InteractionDetail {
            interaction,
            messages,
            tool_usages,
        })
    }

    pub fn get_interactions(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Interaction>> {
        self.store.list_interactions(session_id, limit)
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.store.list_sessions()
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionDetail>> {
        let Some(session) = self.store.get_session(session_id)? else {
            return Ok(None);
        };
        let messages = self.store.session_messages(session_id)?;
        Ok(Some(SessionDetail { session, messages }))
    }

    pub fn get_message(&self, message_id: &str) -> Result<Option<MessageDetail>> {
        let Some(message) = self.store.get_message(message_id)? else {
            return Ok(None);
        };
        let tool_usages = self.store.tool_usages_for_message(message_id)?;
        Ok(Some(MessageDetail {
            message,
            tool_usages,
        }))
    }

    pub fn get_commit(&self, commit_hash: &str) -> Result<Option<Commit>> {
        self.store.get_commit(commit_hash)
    }

    pub fn get_stats(&self) -> Result<IndexStats> {
        self.store.stats()
    }
}
