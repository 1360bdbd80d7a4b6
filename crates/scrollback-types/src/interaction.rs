//! Interaction types.
//!
//! An interaction is one user-initiated exchange: the leading user prompt
//! followed by every assistant turn, tool call and tool result up to the
//! next user prompt.

use crate::{Commit, Message, ToolUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logical user/assistant exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// `{session_id}-interaction-{sequence_num}`.
    pub interaction_id: String,
    pub session_id: String,
    /// Order within the session, starting at 0.
    pub sequence_num: u32,
    /// Text of the leading user message; empty when the session opens
    /// with a non-prompt message.
    pub user_prompt: String,
    /// Member message ids in transcript order.
    pub message_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub has_thinking: bool,
    /// Unique tool names in first-seen order.
    pub tool_calls: Vec<String>,
    pub commits: Vec<Commit>,
    pub total_cost_usd: f64,
}

impl Interaction {
    pub fn make_id(session_id: &str, sequence_num: u32) -> String {
        format!("{}-interaction-{}", session_id, sequence_num)
    }

    pub fn message_count(&self) -> usize {
        self.message_ids.len()
    }
}

/// An interaction with its member messages resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionDetail {
    pub interaction: Interaction,
    pub messages: Vec<Message>,
    pub tool_usages: Vec<ToolUsage>,
}

/// An interaction surfaced by a search, with the message that matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionHit {
    pub interaction: Interaction,
    pub match_message_id: String,
    pub match_content_type: String,
    pub score: f64,
}
