//! Interaction segmentation.
//!
//! A single pass over a session's normalized records. A user message that
//! is neither a tool result nor a system record opens a new interaction;
//! every other message joins the open one. A session that starts with a
//! non-prompt message gets a leading interaction with an empty prompt.

use crate::normalizer::NormalizedRecord;
use scrollback_types::{ContentType, Interaction, Message};

/// Whether `message` starts a new interaction.
pub fn is_boundary(message: &Message) -> bool {
    message.is_user()
        && !matches!(
            message.content_type,
            ContentType::ToolResult | ContentType::System
        )
}

/// Group a session's records into interactions, in order.
///
/// Every record lands in exactly one interaction. Commits carry the id of
/// the interaction that surfaced them.
pub fn segment(session_id: &str, records: &[NormalizedRecord]) -> Vec<Interaction> {
    let mut interactions = Vec::new();
    let mut open: Option<Accumulator<'_>> = None;

    for record in records {
        if is_boundary(&record.message) {
            if let Some(done) = open.take() {
                interactions.push(done.finish(session_id, interactions.len() as u32));
            }
            open = Some(Accumulator::new(record, true));
        } else {
            match open.as_mut() {
                Some(acc) => acc.members.push(record),
                None => open = Some(Accumulator::new(record, false)),
            }
        }
    }

    if let Some(done) = open.take() {
        interactions.push(done.finish(session_id, interactions.len() as u32));
    }

    interactions
}

struct Accumulator<'a> {
    starts_with_prompt: bool,
    members: Vec<&'a NormalizedRecord>,
}

impl<'a> Accumulator<'a> {
    fn new(first: &'a NormalizedRecord, starts_with_prompt: bool) -> Self {
        Self {
            starts_with_prompt,
            members: vec![first],
        }
    }

    fn finish(self, session_id: &str, sequence_num: u32) -> Interaction {
        let interaction_id = Interaction::make_id(session_id, sequence_num);

        let user_prompt = if self.starts_with_prompt {
            self.members[0].message.text_content.clone()
        } else {
            String::new()
        };

        let mut tool_calls: Vec<String> = Vec::new();
        for usage in self.members.iter().flat_map(|r| &r.tool_usages) {
            if !tool_calls.contains(&usage.tool_name) {
                tool_calls.push(usage.tool_name.clone());
            }
        }

        let commits = self
            .members
            .iter()
            .flat_map(|r| &r.commits)
            .map(|commit| {
                let mut commit = commit.clone();
                commit.interaction_id = Some(interaction_id.clone());
                commit
            })
            .collect();

        Interaction {
            interaction_id,
            session_id: session_id.to_string(),
            sequence_num,
            user_prompt,
            message_ids: self
                .members
                .iter()
                .map(|r| r.message.message_id.clone())
                .collect(),
            timestamp: self.members[0].message.timestamp,
            has_thinking: self.members.iter().any(|r| r.message.has_thinking()),
            tool_calls,
            commits,
            total_cost_usd: self.members.iter().filter_map(|r| r.message.cost_usd).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_session;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn user(text: &str) -> Value {
        json!({"type": "user", "message": {"role": "user", "content": text}})
    }

    fn assistant(text: &str) -> Value {
        json!({"type": "assistant", "message": {"role": "assistant", "content": [
            {"type": "text", "text": text}
        ]}})
    }

    fn segment_raw(records: &[Value]) -> Vec<Interaction> {
        let normalized = normalize_session("session-1", records);
        segment("session-1", &normalized)
    }

    #[test]
    fn test_simple_exchange() {
        let interactions = segment_raw(&[user("Hello"), assistant("Hi there!")]);

        assert_eq!(interactions.len(), 1);
        let interaction = &interactions[0];
        assert_eq!(interaction.interaction_id, "session-1-interaction-0");
        assert_eq!(interaction.user_prompt, "Hello");
        assert_eq!(interaction.message_ids, vec!["session-1-0", "session-1-1"]);
        assert!(!interaction.has_thinking);
        assert!(interaction.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_round_trip_stays_in_one_interaction() {
        let records = vec![
            user("Create a file"),
            json!({"type": "assistant", "message": {"role": "assistant", "content": [
                {"type": "tool_use", "id": "t1", "name": "Write", "input": {"path": "test.py"}}
            ]}}),
            json!({"type": "user", "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": "Done"}
            ]}}),
        ];
        let normalized = normalize_session("session-1", &records);
        let interactions = segment("session-1", &normalized);

        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].message_count(), 3);
        assert_eq!(interactions[0].tool_calls, vec!["Write"]);
        assert_eq!(normalized[1].message.content_type, ContentType::ToolUse);
        assert_eq!(normalized[2].message.content_type, ContentType::ToolResult);
    }

    #[test]
    fn test_consecutive_tool_results_do_not_split() {
        let result = |id: &str| {
            json!({"type": "user", "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": id, "content": "ok"}
            ]}})
        };
        let interactions = segment_raw(&[
            user("Go"),
            assistant("Working"),
            result("a"),
            result("b"),
            assistant("Finished"),
        ]);
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].message_count(), 5);
    }

    #[test]
    fn test_leading_assistant_message_gets_empty_prompt() {
        let interactions = segment_raw(&[
            assistant("Resuming"),
            user("Next question"),
            assistant("Answer"),
        ]);

        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].user_prompt, "");
        assert_eq!(interactions[0].message_ids, vec!["session-1-0"]);
        assert_eq!(interactions[1].user_prompt, "Next question");
        assert_eq!(interactions[1].sequence_num, 1);
    }

    #[test]
    fn test_system_records_join_open_interaction() {
        let interactions = segment_raw(&[
            user("First"),
            json!({"type": "summary", "message": {"role": "user", "content": "recap"}}),
            user("Second"),
        ]);
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].message_count(), 2);
    }

    #[test]
    fn test_aggregates_tools_thinking_cost_commits() {
        let records = vec![
            json!({"type": "user", "costUSD": 0.01, "message": {"role": "user", "content": "Commit it"}}),
            json!({"type": "assistant", "costUSD": 0.02, "message": {"role": "assistant", "content": [
                {"type": "thinking", "thinking": "plan"},
                {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "git commit -m 'x'"}},
                {"type": "tool_use", "id": "t2", "name": "Read", "input": {"path": "a"}},
                {"type": "tool_use", "id": "t3", "name": "Bash", "input": {"command": "git log"}}
            ]}}),
            json!({"type": "user", "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": "[main abc1234] x"}
            ]}}),
        ];
        let interactions = segment_raw(&records);
        let interaction = &interactions[0];

        assert!(interaction.has_thinking);
        assert_eq!(interaction.tool_calls, vec!["Bash", "Read"]);
        assert!((interaction.total_cost_usd - 0.03).abs() < 1e-9);
        assert_eq!(interaction.commits.len(), 1);
        assert_eq!(
            interaction.commits[0].interaction_id.as_deref(),
            Some("session-1-interaction-0")
        );
    }

    #[test]
    fn test_empty_session() {
        assert!(segment("s", &[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_pairs_yield_one_interaction_each(
            texts in prop::collection::vec(("[a-z]{1,12}", "[a-z]{1,12}"), 1..20)
        ) {
            let records: Vec<Value> = texts
                .iter()
                .flat_map(|(q, a)| [user(q), assistant(a)])
                .collect();
            let normalized = normalize_session("p", &records);
            let interactions = segment("p", &normalized);

            prop_assert_eq!(interactions.len(), texts.len());

            let flattened: Vec<String> = interactions
                .iter()
                .flat_map(|i| i.message_ids.iter().cloned())
                .collect();
            let expected: Vec<String> = normalized
                .iter()
                .map(|r| r.message.message_id.clone())
                .collect();
            prop_assert_eq!(flattened, expected);

            for (n, interaction) in interactions.iter().enumerate() {
                prop_assert_eq!(interaction.sequence_num, n as u32);
                prop_assert_eq!(&interaction.user_prompt, &texts[n].0);
                prop_assert_eq!(interaction.message_count(), 2);
            }
        }

        #[test]
        fn prop_every_record_is_covered(roles in prop::collection::vec(0u8..3, 0..40)) {
            let records: Vec<Value> = roles
                .iter()
                .map(|r| match r {
                    0 => user("q"),
                    1 => assistant("a"),
                    _ => json!({"type": "user", "message": {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "x", "content": "r"}
                    ]}}),
                })
                .collect();
            let normalized = normalize_session("c", &records);
            let interactions = segment("c", &normalized);

            let total: usize = interactions.iter().map(|i| i.message_count()).sum();
            prop_assert_eq!(total, records.len());
        }
    }
}
