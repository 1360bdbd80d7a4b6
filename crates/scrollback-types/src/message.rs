//! Normalized message, tool usage and commit types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a normalized message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    ToolUse,
    ToolResult,
    Thinking,
    System,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::ToolUse => "tool_use",
            ContentType::ToolResult => "tool_result",
            ContentType::Thinking => "thinking",
            ContentType::System => "system",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "tool_use" => Ok(ContentType::ToolUse),
            "tool_result" => Ok(ContentType::ToolResult),
            "thinking" => Ok(ContentType::Thinking),
            "system" => Ok(ContentType::System),
            _ => Err(format!("Unknown content type: '{}'", s)),
        }
    }
}

/// One normalized turn within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a session, stable across re-index.
    pub message_id: String,
    pub session_id: String,
    /// 0-based position in the session transcript.
    pub sequence_num: u32,
    /// `user`, `assistant`, or whatever the record carried (`unknown` if nothing).
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_content: Option<String>,
    /// Text and reasoning joined; the only field indexed for message search.
    pub searchable_text: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    pub fn has_thinking(&self) -> bool {
        self.thinking_content
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }
}

/// One tool invocation and, once seen, its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    /// Invocation id from the source block, or synthesized.
    pub tool_usage_id: String,
    /// The message that invoked the tool.
    pub message_id: String,
    pub session_id: String,
    pub tool_name: String,
    /// Tool input serialized as JSON.
    pub tool_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<String>,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Commit message the command was trying to record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_intent: Option<String>,
}

impl ToolUsage {
    pub fn has_result(&self) -> bool {
        self.tool_result.is_some()
    }
}

/// A version-control commit detected in tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub commit_hash: String,
    pub commit_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The message whose tool result surfaced the commit.
    pub message_id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

/// Parse a transcript or filter timestamp.
///
/// Accepts RFC 3339 (`2024-12-25T10:00:00Z`, fractional seconds, offsets)
/// and bare dates (`2024-12-25`, read as midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical storage form for timestamps: fixed-width RFC 3339 in UTC, so
/// lexical order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
