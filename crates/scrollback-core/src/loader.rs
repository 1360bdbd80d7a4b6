//! Session discovery and loading.
//!
//! Claude Code stores one JSONL transcript per session under
//! `~/.claude/projects/<project>/<session-id>.jsonl`, where `<project>` is
//! the working directory with path separators flattened to dashes.

use crate::{Result, ScrollbackError};
use chrono::{DateTime, Utc};
use scrollback_types::{parse_timestamp, ContentBlock, RawRecord, SessionInfo};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source label for sessions read from the local filesystem.
pub const LOCAL_SOURCE: &str = "local";

/// Something that can enumerate sessions and produce their raw records.
pub trait SessionLoader: Send + Sync {
    /// All available sessions, most recently modified first.
    fn discover_sessions(&self) -> Result<Vec<SessionInfo>>;

    /// Raw records of one session in transcript order.
    fn load_session(&self, session_id: &str) -> Result<Vec<Value>>;
}

/// Reads sessions from a Claude Code projects directory.
pub struct LocalSessionLoader {
    projects_dir: PathBuf,
}

impl LocalSessionLoader {
    /// Create a loader for the default `~/.claude/projects` directory.
    pub fn new() -> Self {
        Self::with_dir(default_projects_dir())
    }

    /// Create a loader over a custom projects directory.
    pub fn with_dir(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    fn project_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.projects_dir.is_dir() {
            debug!(target: "scrollback::loader", "No projects directory at {:?}", self.projects_dir);
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.projects_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn session_info(&self, path: &Path, project: &str) -> Result<Option<SessionInfo>> {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let records = read_records(path)?;
        if records.is_empty() {
            return Ok(None);
        }

        let timestamps: Vec<DateTime<Utc>> = records
            .iter()
            .filter_map(|r| r.get("timestamp").and_then(Value::as_str))
            .filter_map(parse_timestamp)
            .collect();

        let modified = match records
            .last()
            .and_then(|r| r.get("timestamp"))
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
        {
            Some(ts) => ts,
            None => DateTime::<Utc>::from(std::fs::metadata(path)?.modified()?),
        };

        Ok(Some(SessionInfo {
            id: id.to_string(),
            source: LOCAL_SOURCE.to_string(),
            path: Some(path.to_path_buf()),
            modified,
            preview: first_user_text(&records)
                .map(|text| truncate_preview(&text))
                .unwrap_or_default(),
            message_count: records.len(),
            project_directory: Some(project.to_string()),
            created_at: timestamps.first().copied(),
        }))
    }
}

impl Default for LocalSessionLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLoader for LocalSessionLoader {
    fn discover_sessions(&self) -> Result<Vec<SessionInfo>> {
        let mut sessions = Vec::new();

        for project_dir in self.project_dirs()? {
            let project = project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            for entry in std::fs::read_dir(&project_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                    continue;
                }
                match self.session_info(&path, &project) {
                    Ok(Some(info)) => sessions.push(info),
                    Ok(None) => {}
                    Err(e) => {
                        debug!(target: "scrollback::loader", "Skipping {:?}: {}", path, e);
                    }
                }
            }
        }

        sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));

        debug!(
            target: "scrollback::loader",
            "Found {} sessions under {:?}",
            sessions.len(),
            self.projects_dir
        );

        Ok(sessions)
    }

    fn load_session(&self, session_id: &str) -> Result<Vec<Value>> {
        for project_dir in self.project_dirs()? {
            let path = project_dir.join(format!("{}.jsonl", session_id));
            if path.is_file() {
                return read_records(&path);
            }
        }
        Err(ScrollbackError::SessionNotFound(session_id.to_string()))
    }
}

/// `~/.claude/projects`.
pub fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".claude")
        .join("projects")
}

/// Read a JSONL transcript, skipping blank and malformed lines.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(e) => {
                debug!(
                    target: "scrollback::loader",
                    "Skipping malformed line {} in {:?}: {}",
                    line_no + 1,
                    path,
                    e
                );
            }
        }
    }

    Ok(records)
}

fn first_user_text(records: &[Value]) -> Option<String> {
    let first_user = records
        .iter()
        .map(RawRecord::from_value)
        .find(|r| r.record_type.as_deref() == Some("user"))?;

    first_user.blocks().into_iter().find_map(|block| match block {
        ContentBlock::Text { text } => Some(text),
        _ => None,
    })
}

/// Truncate preview text to a reasonable length.
fn truncate_preview(s: &str) -> String {
    const MAX_CHARS: usize = 100;
    s.chars().take(MAX_CHARS).collect()
}
