//! Search request and result shapes.

use crate::{ContentType, Message};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which corpus a search hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Matched the message `searchable_text`.
    Message,
    /// Matched tool input, result, command or file path.
    Tool,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Message => "message",
            MatchSource::Tool => "tool",
        }
    }
}

/// Which corpora a search consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    Messages,
    Tools,
}

impl SearchScope {
    pub fn includes_messages(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Messages)
    }

    pub fn includes_tools(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Tools)
    }
}

impl FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(SearchScope::All),
            "messages" | "message" => Ok(SearchScope::Messages),
            "tools" | "tool" => Ok(SearchScope::Tools),
            _ => Err(format!(
                "Invalid search scope: '{}'. Use 'all', 'messages' or 'tools'.",
                s
            )),
        }
    }
}

/// Content type filter. `tool` selects both tool_use and tool_result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeFilter {
    Exact(ContentType),
    AnyTool,
}

impl ContentTypeFilter {
    /// Content type names this filter accepts.
    pub fn accepted(&self) -> Vec<&'static str> {
        match self {
            ContentTypeFilter::Exact(ct) => vec![ct.as_str()],
            ContentTypeFilter::AnyTool => vec![
                ContentType::ToolUse.as_str(),
                ContentType::ToolResult.as_str(),
            ],
        }
    }
}

impl FromStr for ContentTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "tool" {
            return Ok(ContentTypeFilter::AnyTool);
        }
        s.parse::<ContentType>().map(ContentTypeFilter::Exact)
    }
}

impl fmt::Display for ContentTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentTypeFilter::Exact(ct) => write!(f, "{}", ct),
            ContentTypeFilter::AnyTool => f.write_str("tool"),
        }
    }
}

/// Filters shared by both corpora.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub role: Option<String>,
    pub tool: Option<String>,
    pub session_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub content_type: Option<ContentTypeFilter>,
}

/// A complete search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub filters: SearchFilters,
    pub scope: SearchScope,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            scope: SearchScope::All,
            limit: 20,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }
}

/// One ranked search result.
///
/// Message hits and tool hits share this shape; fields that do not apply
/// to a hit's source are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub match_source: MatchSource,
    /// Relevance (higher is better), or a constant in substring mode.
    pub score: f64,
    pub message_id: String,
    pub session_id: String,
    pub sequence_num: Option<u32>,
    pub role: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub content_type: Option<ContentType>,
    pub text_content: Option<String>,
    pub thinking_content: Option<String>,
    pub tool_summary: Option<String>,
    pub project_directory: Option<String>,
    pub source: Option<String>,
    pub tool_usage_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_result: Option<String>,
    pub file_path: Option<String>,
    pub command: Option<String>,
    pub is_error: Option<bool>,
}

/// Ranked results for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// False when the relevance engine was unavailable and hits are
    /// ordered by recency.
    pub ranked: bool,
}

/// A message with its chronological neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    pub message: Message,
    /// Preceding messages, oldest first.
    pub before: Vec<Message>,
    /// Following messages, oldest first.
    pub after: Vec<Message>,
}
