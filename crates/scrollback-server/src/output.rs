//! Plain-text rendering for CLI commands.

use scrollback_types::{IndexStats, MatchSource, SearchHit, SessionRecord};

const SNIPPET_CHARS: usize = 160;

/// CLI output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// One search hit as a header line and an indented snippet.
pub fn format_hit(hit: &SearchHit, ranked: bool) -> String {
    let mut header = String::new();
    if ranked {
        header.push_str(&format!("[{:.2}] ", hit.score));
    }
    header.push_str(&hit.session_id);
    if let Some(seq) = hit.sequence_num {
        header.push_str(&format!(" #{}", seq));
    }
    if let Some(role) = &hit.role {
        header.push_str(&format!(" {}", role));
    }
    if let Some(ts) = &hit.timestamp {
        header.push_str(&format!(" {}", ts.format("%Y-%m-%d %H:%M")));
    }
    if hit.match_source == MatchSource::Tool {
        if let Some(name) = &hit.tool_name {
            header.push_str(&format!(" {}:{}", hit.match_source.as_str(), name));
        }
    }

    format!("{}\n    {}", header, snippet(hit))
}

fn snippet(hit: &SearchHit) -> String {
    let text = match hit.match_source {
        MatchSource::Message => hit
            .text_content
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(hit.tool_summary.as_deref())
            .or(hit.thinking_content.as_deref()),
        MatchSource::Tool => hit
            .command
            .as_deref()
            .or(hit.file_path.as_deref())
            .or(hit.tool_result.as_deref())
            .or(hit.tool_input.as_deref()),
    }
    .unwrap_or("");

    truncate(&text.split_whitespace().collect::<Vec<_>>().join(" "), SNIPPET_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

pub fn format_session(session: &SessionRecord) -> String {
    let last = session
        .last_message_at
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {}  {:>5} msgs  ${:.4}  {}",
        session.session_id,
        last,
        session.message_count,
        session.total_cost_usd,
        session.project_directory.as_deref().unwrap_or("-")
    )
}

pub fn format_stats(stats: &IndexStats) -> String {
    let span = match (&stats.earliest_message, &stats.latest_message) {
        (Some(first), Some(last)) => format!(
            "{} .. {}",
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        ),
        _ => "-".to_string(),
    };
    format!(
        "sessions:     {}\nmessages:     {}\ntool usages:  {}\ninteractions: {}\ncommits:      {}\ntotal cost:   ${:.4}\nspan:         {}",
        stats.session_count,
        stats.message_count,
        stats.tool_count,
        stats.interaction_count,
        stats.commit_count,
        stats.total_cost_usd,
        span
    )
}
