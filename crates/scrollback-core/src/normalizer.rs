//! Record normalization.
//!
//! Turns one raw transcript record into a [`Message`], the [`ToolUsage`]s it
//! invokes and the [`Commit`]s its tool results announce. Tool results are
//! paired with tool uses of the same record first; [`pair_across_records`]
//! then resolves results that arrive in a later record.

use crate::commit::{commit_intent, commits_in_output};
use chrono::{DateTime, Utc};
use scrollback_types::{
    parse_timestamp, tool_result_text, Commit, ContentBlock, ContentType, Message, RawRecord,
    ToolUsage,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const SUMMARY_ITEMS: usize = 3;
const RESULT_PREVIEW_SOURCE_CHARS: usize = 100;
const PREVIEW_CHARS: usize = 80;
const COMMAND_PREVIEW_CHARS: usize = 50;
const SHELL_TOOL: &str = "Bash";

/// Everything one raw record contributes to the index.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub message: Message,
    pub tool_usages: Vec<ToolUsage>,
    pub commits: Vec<Commit>,
    /// Tool results whose invocation was not seen in this record.
    pub unmatched_results: Vec<ToolResultEvent>,
}

/// A tool result block, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultEvent {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

/// Normalize every record of a session, then pair results across records.
pub fn normalize_session(session_id: &str, records: &[Value]) -> Vec<NormalizedRecord> {
    let mut normalized: Vec<NormalizedRecord> = records
        .iter()
        .enumerate()
        .map(|(position, value)| normalize_record(value, session_id, position as u32))
        .collect();
    pair_across_records(&mut normalized);
    normalized
}

/// Normalize one raw record at `position` within `session_id`.
pub fn normalize_record(value: &Value, session_id: &str, position: u32) -> NormalizedRecord {
    let record = RawRecord::from_value(value);
    let message_id = record
        .uuid
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{}-{}", session_id, position));
    let role = record
        .message
        .as_ref()
        .and_then(|m| m.role.clone())
        .or_else(|| record.record_type.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let timestamp = record.timestamp.as_deref().and_then(parse_timestamp);

    let mut text_parts: Vec<String> = Vec::new();
    let mut thinking_parts: Vec<String> = Vec::new();
    let mut tool_usages: Vec<ToolUsage> = Vec::new();
    let mut results: Vec<ToolResultEvent> = Vec::new();
    let mut unmatched_results = Vec::new();
    // Scoped to this record; tool_usage_id -> index into tool_usages.
    let mut pending: HashMap<String, usize> = HashMap::new();

    for block in record.blocks() {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::Thinking { thinking } => {
                if !thinking.is_empty() {
                    thinking_parts.push(thinking);
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                let tool_usage_id = if id.is_empty() {
                    format!("{}-tool-{}", message_id, tool_usages.len())
                } else {
                    id
                };
                let usage = build_tool_usage(tool_usage_id, &message_id, session_id, name, &input);
                pending.insert(usage.tool_usage_id.clone(), tool_usages.len());
                tool_usages.push(usage);
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let event = ToolResultEvent {
                    tool_use_id,
                    content: tool_result_text(&content),
                    is_error: is_error.unwrap_or(false),
                };
                match pending.get(&event.tool_use_id) {
                    Some(&index) => apply_result(&mut tool_usages[index], &event),
                    None => unmatched_results.push(event.clone()),
                }
                results.push(event);
            }
            ContentBlock::Unknown => {}
        }
    }

    let text_content = text_parts.join("\n");
    let has_text = text_parts.iter().any(|part| !part.trim().is_empty());

    let thinking_joined = record
        .thinking
        .iter()
        .chain(thinking_parts.iter())
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    let thinking_content = (!thinking_joined.is_empty()).then_some(thinking_joined);

    let searchable_text = [Some(text_content.as_str()), thinking_content.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let commits: Vec<Commit> = results
        .iter()
        .flat_map(|event| commits_in_output(&event.content))
        .map(|found| Commit {
            commit_hash: found.hash,
            commit_message: found.message,
            branch: found.branch,
            timestamp,
            message_id: message_id.clone(),
            session_id: session_id.to_string(),
            interaction_id: None,
        })
        .collect();

    let (content_type, tool_summary) = classify(
        &record,
        has_text,
        &tool_usages,
        &results,
        &commits,
        thinking_content.as_deref(),
    );

    let message = Message {
        message_id,
        session_id: session_id.to_string(),
        sequence_num: position,
        role,
        timestamp,
        text_content,
        thinking_content,
        searchable_text,
        content_type,
        tool_summary,
        cost_usd: record.cost_usd,
        duration_ms: record.duration_ms,
    };

    NormalizedRecord {
        message,
        tool_usages,
        commits,
        unmatched_results,
    }
}

/// Attach results that arrived in a later record to the earlier tool use
/// with the same id. The first result wins.
pub fn pair_across_records(records: &mut [NormalizedRecord]) {
    let mut open: HashMap<String, (usize, usize)> = HashMap::new();

    for index in 0..records.len() {
        let unmatched = std::mem::take(&mut records[index].unmatched_results);
        let mut still_unmatched = Vec::new();

        for event in unmatched {
            match open.get(&event.tool_use_id) {
                Some(&(owner, slot)) => apply_result(&mut records[owner].tool_usages[slot], &event),
                None => {
                    debug!(
                        target: "scrollback::normalize",
                        "Tool result {} in message {} has no matching tool use",
                        event.tool_use_id,
                        records[index].message.message_id
                    );
                    still_unmatched.push(event);
                }
            }
        }
        records[index].unmatched_results = still_unmatched;

        for (slot, usage) in records[index].tool_usages.iter().enumerate() {
            open.insert(usage.tool_usage_id.clone(), (index, slot));
        }
    }
}

fn apply_result(usage: &mut ToolUsage, event: &ToolResultEvent) {
    if usage.has_result() {
        debug!(
            target: "scrollback::normalize",
            "Ignoring repeated result for tool use {}",
            usage.tool_usage_id
        );
        return;
    }
    usage.tool_result = Some(event.content.clone());
    usage.is_error = event.is_error;
}

fn build_tool_usage(
    tool_usage_id: String,
    message_id: &str,
    session_id: &str,
    tool_name: String,
    input: &Value,
) -> ToolUsage {
    let input_str = |key: &str| input.get(key).and_then(Value::as_str).map(str::to_string);

    let file_path = input_str("path")
        .filter(|p| !p.is_empty())
        .or_else(|| input_str("file_path").filter(|p| !p.is_empty()));
    let command = if tool_name == SHELL_TOOL {
        input_str("command")
    } else {
        None
    };
    let commit_intent = command.as_deref().and_then(commit_intent);
    let tool_input = if input.is_null() {
        "{}".to_string()
    } else {
        input.to_string()
    };

    ToolUsage {
        tool_usage_id,
        message_id: message_id.to_string(),
        session_id: session_id.to_string(),
        tool_name,
        tool_input,
        tool_result: None,
        is_error: false,
        file_path,
        command,
        commit_intent,
    }
}

fn classify(
    record: &RawRecord,
    has_text: bool,
    tool_usages: &[ToolUsage],
    results: &[ToolResultEvent],
    commits: &[Commit],
    thinking: Option<&str>,
) -> (ContentType, Option<String>) {
    if record.is_system_record() {
        return (ContentType::System, None);
    }

    let text_or = |fallback: ContentType| if has_text { ContentType::Text } else { fallback };

    if !results.is_empty() {
        return (
            text_or(ContentType::ToolResult),
            Some(result_summary(results, commits)),
        );
    }

    if !tool_usages.is_empty() {
        return (text_or(ContentType::ToolUse), Some(tool_use_summary(tool_usages)));
    }

    if let Some(thinking) = thinking.filter(|_| !has_text) {
        return (ContentType::Thinking, Some(preview(thinking, PREVIEW_CHARS)));
    }

    (ContentType::Text, None)
}

fn result_summary(results: &[ToolResultEvent], commits: &[Commit]) -> String {
    let mut summary = results
        .iter()
        .take(SUMMARY_ITEMS)
        .map(|event| {
            if event.content.is_empty() {
                "(empty)".to_string()
            } else {
                let head: String = event
                    .content
                    .chars()
                    .take(RESULT_PREVIEW_SOURCE_CHARS)
                    .collect();
                preview(&head, PREVIEW_CHARS)
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    if !commits.is_empty() {
        let hashes: Vec<&str> = commits.iter().map(|c| c.commit_hash.as_str()).collect();
        summary.push_str(&format!(" [commit {}]", hashes.join(", ")));
    }
    summary
}

fn tool_use_summary(tool_usages: &[ToolUsage]) -> String {
    tool_usages
        .iter()
        .take(SUMMARY_ITEMS)
        .map(|usage| match (&usage.file_path, &usage.command) {
            (Some(path), _) => format!("{}: {}", usage.tool_name, path),
            (None, Some(command)) => {
                format!("{}: {}", SHELL_TOOL, truncate(command, COMMAND_PREVIEW_CHARS))
            }
            (None, None) => usage.tool_name.clone(),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Single-line preview, truncated to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let head: String = text.chars().take(max).collect();
    let mut out = head.replace('\n', " ").trim().to_string();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Sum of the per-message costs, absent cost counted as zero.
pub fn total_cost<'a>(messages: impl IntoIterator<Item = &'a Message>) -> f64 {
    messages.into_iter().filter_map(|m| m.cost_usd).sum()
}

/// Earliest and latest timestamps across messages.
pub fn time_span<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    messages
        .into_iter()
        .filter_map(|m| m.timestamp)
        .fold((None, None), |(first, last), ts| {
            (
                Some(first.map_or(ts, |f: DateTime<Utc>| f.min(ts))),
                Some(last.map_or(ts, |l: DateTime<Utc>| l.max(ts))),
            )
        })
}
