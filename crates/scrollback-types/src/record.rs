//! Raw transcript record model.
//!
//! Transcript lines are heterogeneous: the same file mixes user turns,
//! assistant turns, summaries and file-history snapshots, and the `content`
//! of a turn is either a plain string or a list of typed blocks. Every field
//! here is optional and deserialization is lenient, so a well-formed JSON
//! object never fails to load as a [`RawRecord`].
//!
//! ```json
//! {"uuid":"...","type":"assistant","timestamp":"...","message":{"role":"assistant","content":[{"type":"text","text":"..."}]}}
//! ```

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Outer record types that never carry conversational content.
pub const SYSTEM_RECORD_TYPES: &[&str] = &["file-history-snapshot", "summary", "system"];

/// One line of a session transcript.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Stable message identifier, when the source provides one.
    #[serde(default, deserialize_with = "lenient")]
    pub uuid: Option<String>,
    /// Outer type tag (`user`, `assistant`, `summary`, ...).
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub record_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<RawMessage>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    /// Top-level reasoning text, independent of any thinking block.
    #[serde(default, deserialize_with = "lenient")]
    pub thinking: Option<String>,
    #[serde(rename = "costUSD", default, deserialize_with = "lenient")]
    pub cost_usd: Option<f64>,
    #[serde(rename = "durationMs", default, deserialize_with = "lenient")]
    pub duration_ms: Option<i64>,
}

impl RawRecord {
    /// Build a record from an arbitrary JSON value.
    ///
    /// Non-object values produce an empty record rather than an error.
    pub fn from_value(value: &Value) -> Self {
        RawRecord::deserialize(value).unwrap_or_default()
    }

    /// Whether the outer type tag marks a snapshot/summary/system record.
    pub fn is_system_record(&self) -> bool {
        self.record_type
            .as_deref()
            .is_some_and(|t| SYSTEM_RECORD_TYPES.contains(&t))
    }

    /// Content blocks of the nested message, with string content lifted
    /// into a single text block.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self.message.as_ref().and_then(|m| m.content.as_ref()) {
            Some(MessageContent::Text(text)) => vec![ContentBlock::Text { text: text.clone() }],
            Some(MessageContent::Blocks(blocks)) => blocks.clone(),
            None => Vec::new(),
        }
    }
}

/// The nested `message` object of a record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: a bare string or a sequence of typed blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(text) => MessageContent::Text(text),
            Value::Array(items) => {
                MessageContent::Blocks(items.iter().map(ContentBlock::from_value).collect())
            }
            _ => MessageContent::Blocks(Vec::new()),
        })
    }
}

/// A typed content block.
///
/// Unknown or malformed blocks deserialize to [`ContentBlock::Unknown`] and
/// are skipped by the normalizer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn from_value(value: &Value) -> Self {
        ContentBlock::deserialize(value).unwrap_or(ContentBlock::Unknown)
    }
}

/// Flatten a tool result body to text.
///
/// Lists of blocks are reduced to their text parts (and bare strings),
/// joined by newlines. Other JSON shapes are rendered as JSON.
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("text") => {
                    Some(obj.get("text").and_then(Value::as_str).unwrap_or(""))
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// Deserialize an optional field, treating any shape mismatch as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_content_becomes_text_block() {
        let record = RawRecord::from_value(&json!({
            "uuid": "msg-1",
            "type": "user",
            "message": {"role": "user", "content": "Hello"}
        }));

        assert_eq!(record.uuid.as_deref(), Some("msg-1"));
        assert_eq!(
            record.blocks(),
            vec![ContentBlock::Text { text: "Hello".to_string() }]
        );
    }

    #[test]
    fn test_block_content_parses_each_variant() {
        let record = RawRecord::from_value(&json!({
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "hi"},
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}},
                    {"type": "tool_result", "tool_use_id": "t1", "content": "ok", "is_error": true},
                    {"type": "image", "source": {}},
                    "not a block"
                ]
            }
        }));

        let blocks = record.blocks();
        assert_eq!(blocks.len(), 6);
        assert!(matches!(blocks[0], ContentBlock::Text { .. }));
        assert!(matches!(blocks[1], ContentBlock::Thinking { .. }));
        assert!(matches!(&blocks[2], ContentBlock::ToolUse { name, .. } if name == "Bash"));
        assert!(matches!(
            blocks[3],
            ContentBlock::ToolResult { is_error: Some(true), .. }
        ));
        assert_eq!(blocks[4], ContentBlock::Unknown);
        assert_eq!(blocks[5], ContentBlock::Unknown);
    }

    #[test]
    fn test_mismatched_fields_are_treated_as_absent() {
        let record = RawRecord::from_value(&json!({
            "uuid": 42,
            "message": "plain string message",
            "costUSD": "free",
            "timestamp": null
        }));

        assert!(record.uuid.is_none());
        assert!(record.message.is_none());
        assert!(record.cost_usd.is_none());
        assert!(record.blocks().is_empty());
    }

    #[test]
    fn test_non_object_record_is_empty() {
        let record = RawRecord::from_value(&json!([1, 2, 3]));
        assert!(record.uuid.is_none());
        assert!(record.record_type.is_none());
    }

    #[test]
    fn test_system_record_detection() {
        let snapshot = RawRecord::from_value(&json!({"type": "file-history-snapshot"}));
        let user = RawRecord::from_value(&json!({"type": "user"}));
        assert!(snapshot.is_system_record());
        assert!(!user.is_system_record());
    }

    #[test]
    fn test_tool_result_text_flattens_parts() {
        let content = json!([
            {"type": "text", "text": "line one"},
            {"type": "image", "source": {}},
            "line two"
        ]);
        assert_eq!(tool_result_text(&content), "line one\nline two");
        assert_eq!(tool_result_text(&json!("plain")), "plain");
        assert_eq!(tool_result_text(&Value::Null), "");
        assert_eq!(tool_result_text(&json!({"ok": true})), r#"{"ok":true}"#);
    }
}
