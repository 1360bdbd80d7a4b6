//! SQLite persistence for sessions, messages, tool usages, commits and
//! interactions, with FTS5 indexes over the two searchable corpora.
//!
//! Message search ranks over `messages.searchable_text`; tool search ranks
//! over `tool_input`, `tool_result`, `command` and `file_path`. Both FTS
//! tables use external content and are kept in sync by triggers. When FTS5
//! is unavailable (or disabled) the store answers the same queries with a
//! case-insensitive substring test and reports [`SearchMode::Substring`].

use crate::normalizer::NormalizedRecord;
use crate::Result;
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use scrollback_types::{
    format_timestamp, parse_timestamp, Commit, ContentType, IndexStats, Interaction, MatchSource,
    Message, SearchFilters, SearchHit, SessionRecord, ToolUsage,
};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// How free-text matching is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// FTS5 match, ranked by bm25.
    FullText,
    /// Case-insensitive substring containment, newest first.
    Substring,
}

impl SearchMode {
    pub fn is_ranked(&self) -> bool {
        matches!(self, SearchMode::FullText)
    }
}

const MESSAGE_COLUMNS: &str = "m.message_id, m.session_id, m.sequence_num, m.role, m.timestamp, \
     m.text_content, m.thinking_content, m.searchable_text, m.content_type, m.tool_summary, \
     m.cost_usd, m.duration_ms";

const TOOL_COLUMNS: &str = "t.tool_usage_id, t.message_id, t.session_id, t.tool_name, \
     t.tool_input, t.tool_result, t.is_error, t.file_path, t.command, t.commit_intent";

const COMMIT_COLUMNS: &str = "c.commit_hash, c.commit_message, c.branch, c.timestamp, \
     c.message_id, c.session_id, c.interaction_id";

const INTERACTION_COMMIT_COLUMNS: &str = "ic.commit_hash, ic.commit_message, ic.branch, \
     ic.timestamp, ic.message_id, ic.session_id, ic.interaction_id";

const INTERACTION_COLUMNS: &str = "i.interaction_id, i.session_id, i.sequence_num, \
     i.user_prompt, i.timestamp, i.has_thinking, i.tool_calls, i.total_cost_usd";

/// SQLite-backed index storage.
pub struct Store {
    conn: Mutex<Connection>,
    mode: SearchMode,
}

impl Store {
    /// Open or create the store at the given path.
    pub fn open(path: &Path, full_text: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, full_text)
    }

    /// A private in-memory store.
    pub fn open_in_memory(full_text: bool) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, full_text)
    }

    pub fn from_connection(conn: Connection, full_text: bool) -> Result<Self> {
        register_casefold(&conn)?;
        init_schema(&conn)?;

        let mode = if !full_text {
            info!(target: "scrollback::db", "Full-text search disabled, using substring matching");
            SearchMode::Substring
        } else {
            match create_fts_tables(&conn) {
                Ok(()) => SearchMode::FullText,
                Err(e) => {
                    warn!(
                        target: "scrollback::db",
                        "FTS5 unavailable ({}), falling back to substring matching",
                        e
                    );
                    SearchMode::Substring
                }
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            mode,
        })
    }

    pub fn search_mode(&self) -> SearchMode {
        self.mode
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace everything stored for a session in one transaction.
    pub fn replace_session(
        &self,
        session: &SessionRecord,
        records: &[NormalizedRecord],
        interactions: &[Interaction],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        delete_session_rows(&tx, &session.session_id)?;
        upsert_session(&tx, session)?;
        for record in records {
            upsert_message(&tx, &record.message)?;
            for usage in &record.tool_usages {
                upsert_tool_usage(&tx, usage)?;
            }
        }
        for interaction in interactions {
            upsert_interaction(&tx, interaction)?;
            for commit in &interaction.commits {
                upsert_commit(&tx, commit)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove a session and everything it owns. Returns whether it existed.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let deleted = delete_session_rows(&tx, session_id)?;
        tx.commit()?;
        Ok(deleted)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT * FROM sessions WHERE session_id = ?1",
                params![session_id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// All sessions, most recently active first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions ORDER BY last_message_at DESC, session_id",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.session_id = ?1 ORDER BY m.sequence_num"
        ))?;
        let rows = stmt.query_map(params![session_id], row_to_message)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub fn get_message(&self, message_id: &str) -> Result<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let message = conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.message_id = ?1"),
                params![message_id],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Up to `limit` messages immediately preceding `sequence_num`, oldest first.
    pub fn messages_before(
        &self,
        session_id: &str,
        sequence_num: u32,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             WHERE m.session_id = ?1 AND m.sequence_num < ?2
             ORDER BY m.sequence_num DESC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![session_id, sequence_num as i64, limit as i64],
            row_to_message,
        )?;
        let mut messages = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Up to `limit` messages immediately following `sequence_num`, oldest first.
    pub fn messages_after(
        &self,
        session_id: &str,
        sequence_num: u32,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m
             WHERE m.session_id = ?1 AND m.sequence_num > ?2
             ORDER BY m.sequence_num ASC
             LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![session_id, sequence_num as i64, limit as i64],
            row_to_message,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn tool_usages_for_message(&self, message_id: &str) -> Result<Vec<ToolUsage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOOL_COLUMNS} FROM tool_usages t WHERE t.message_id = ?1 ORDER BY t.rowid"
        ))?;
        let rows = stmt.query_map(params![message_id], row_to_tool_usage)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// An interaction, only if it belongs to `session_id`.
    pub fn get_interaction(
        &self,
        session_id: &str,
        interaction_id: &str,
    ) -> Result<Option<Interaction>> {
        let conn = self.conn.lock().unwrap();
        let interaction = conn
            .query_row(
                &format!(
                    "SELECT {INTERACTION_COLUMNS} FROM interactions i
                     WHERE i.interaction_id = ?1 AND i.session_id = ?2"
                ),
                params![interaction_id, session_id],
                row_to_interaction,
            )
            .optional()?;

        match interaction {
            Some(interaction) => Ok(Some(load_interaction_members(&conn, interaction)?)),
            None => Ok(None),
        }
    }

    /// Interactions of a session in order.
    pub fn list_interactions(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Interaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions i
             WHERE i.session_id = ?1
             ORDER BY i.sequence_num
             LIMIT ?2"
        ))?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![session_id, limit], row_to_interaction)?;
        let interactions = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        interactions
            .into_iter()
            .map(|i| load_interaction_members(&conn, i))
            .collect()
    }

    /// The interaction that contains a message.
    pub fn interaction_for_message(&self, message_id: &str) -> Result<Option<Interaction>> {
        let conn = self.conn.lock().unwrap();
        let interaction = conn
            .query_row(
                &format!(
                    "SELECT {INTERACTION_COLUMNS} FROM interaction_messages im
                     JOIN interactions i ON i.interaction_id = im.interaction_id
                     WHERE im.message_id = ?1
                     ORDER BY i.sequence_num
                     LIMIT 1"
                ),
                params![message_id],
                row_to_interaction,
            )
            .optional()?;

        match interaction {
            Some(interaction) => Ok(Some(load_interaction_members(&conn, interaction)?)),
            None => Ok(None),
        }
    }

    /// Member messages of an interaction, in membership order.
    pub fn interaction_messages(&self, interaction_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM interaction_messages im
             JOIN messages m ON m.message_id = im.message_id
             WHERE im.interaction_id = ?1
             ORDER BY im.position"
        ))?;
        let rows = stmt.query_map(params![interaction_id], row_to_message)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Tool usages invoked by an interaction's messages.
    pub fn interaction_tool_usages(&self, interaction_id: &str) -> Result<Vec<ToolUsage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOOL_COLUMNS} FROM interaction_messages im
             JOIN tool_usages t ON t.message_id = im.message_id
             WHERE im.interaction_id = ?1
             ORDER BY im.position, t.rowid"
        ))?;
        let rows = stmt.query_map(params![interaction_id], row_to_tool_usage)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Commits
    // =========================================================================

    pub fn get_commit(&self, commit_hash: &str) -> Result<Option<Commit>> {
        let conn = self.conn.lock().unwrap();
        let commit = conn
            .query_row(
                &format!("SELECT {COMMIT_COLUMNS} FROM commits c WHERE c.commit_hash = ?1"),
                params![commit_hash.to_lowercase()],
                row_to_commit,
            )
            .optional()?;
        Ok(commit)
    }

    /// Commits whose hash or message contains `query`, newest first.
    pub fn search_commits(
        &self,
        query: &str,
        session_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>> {
        let conn = self.conn.lock().unwrap();
        let mut clauses = Clauses::default();
        clauses.push(
            "(instr(casefold(c.commit_hash), casefold(?)) > 0 \
             OR instr(casefold(c.commit_message), casefold(?)) > 0)",
            [SqlValue::from(query.to_string()), SqlValue::from(query.to_string())],
        );
        if let Some(session_id) = session_id {
            clauses.push("c.session_id = ?", [SqlValue::from(session_id.to_string())]);
        }
        clauses.params.push(SqlValue::Integer(limit as i64));

        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits c WHERE {} ORDER BY c.timestamp DESC LIMIT ?",
            clauses.render()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(clauses.params.iter()), row_to_commit)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Match the message corpus.
    ///
    /// Full-text mode returns hits best-first; substring mode newest-first.
    pub fn search_messages(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut clauses = Clauses::default();
        let (from, score, order) = match self.mode {
            SearchMode::FullText => {
                let Some(fts_query) = escape_fts5_query(query) else {
                    return Ok(Vec::new());
                };
                clauses.push("messages_fts MATCH ?", [SqlValue::from(fts_query)]);
                (
                    "messages_fts JOIN messages m ON m.rowid = messages_fts.rowid",
                    "-bm25(messages_fts)",
                    "score DESC",
                )
            }
            SearchMode::Substring => {
                clauses.push(
                    "instr(casefold(m.searchable_text), casefold(?)) > 0",
                    [SqlValue::from(query.trim().to_string())],
                );
                ("messages m", "0.0", "m.timestamp DESC")
            }
        };
        apply_filters(&mut clauses, filters, Corpus::Messages);
        clauses.params.push(SqlValue::Integer(limit as i64));

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS}, s.project_directory, s.source, {score} AS score
             FROM {from}
             LEFT JOIN sessions s ON s.session_id = m.session_id
             WHERE {}
             ORDER BY {order}, m.session_id, m.sequence_num
             LIMIT ?",
            clauses.render()
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(clauses.params.iter()), row_to_message_hit)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Match the tool corpus. Role, session, time and content-type filters
    /// apply through the owning message.
    pub fn search_tools(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut clauses = Clauses::default();
        let (from, score, order) = match self.mode {
            SearchMode::FullText => {
                let Some(fts_query) = escape_fts5_query(query) else {
                    return Ok(Vec::new());
                };
                clauses.push("tool_usages_fts MATCH ?", [SqlValue::from(fts_query)]);
                (
                    "tool_usages_fts JOIN tool_usages t ON t.rowid = tool_usages_fts.rowid",
                    "-bm25(tool_usages_fts)",
                    "score DESC",
                )
            }
            SearchMode::Substring => {
                clauses.push(
                    "instr(casefold(coalesce(t.tool_input, '') || char(10) || coalesce(t.tool_result, '') \
                     || char(10) || coalesce(t.command, '') || char(10) || coalesce(t.file_path, '')), casefold(?)) > 0",
                    [SqlValue::from(query.trim().to_string())],
                );
                ("tool_usages t", "0.0", "m.timestamp DESC")
            }
        };
        apply_filters(&mut clauses, filters, Corpus::Tools);
        clauses.params.push(SqlValue::Integer(limit as i64));

        let sql = format!(
            "SELECT {TOOL_COLUMNS}, m.sequence_num, m.role, m.timestamp, m.content_type,
                    s.project_directory, s.source, {score} AS score
             FROM {from}
             JOIN messages m ON m.message_id = t.message_id
             LEFT JOIN sessions s ON s.session_id = t.session_id
             WHERE {}
             ORDER BY {order}, t.session_id, m.sequence_num
             LIMIT ?",
            clauses.render()
        );

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(clauses.params.iter()), row_to_tool_hit)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> rusqlite::Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
        };

        let total_cost: f64 = conn.query_row(
            "SELECT COALESCE(SUM(total_cost_usd), 0.0) FROM sessions",
            [],
            |row| row.get(0),
        )?;
        let (earliest, latest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM messages WHERE timestamp IS NOT NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(IndexStats {
            session_count: count("sessions")?,
            message_count: count("messages")?,
            tool_count: count("tool_usages")?,
            interaction_count: count("interactions")?,
            commit_count: count("commits")?,
            total_cost_usd: (total_cost * 10_000.0).round() / 10_000.0,
            earliest_message: earliest.as_deref().and_then(parse_timestamp),
            latest_message: latest.as_deref().and_then(parse_timestamp),
        })
    }
}

// =============================================================================
// Schema
// =============================================================================

/// `casefold(text)`: Unicode lowercase, for substring matching beyond ASCII.
fn register_casefold(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            session_path TEXT,
            project_directory TEXT,
            created_at TEXT,
            last_message_at TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            total_cost_usd REAL NOT NULL DEFAULT 0.0,
            indexed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            message_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            sequence_num INTEGER NOT NULL,
            role TEXT NOT NULL,
            timestamp TEXT,
            text_content TEXT NOT NULL DEFAULT '',
            thinking_content TEXT,
            searchable_text TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL,
            tool_summary TEXT,
            cost_usd REAL,
            duration_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session_seq ON messages(session_id, sequence_num);
        CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);

        CREATE TABLE IF NOT EXISTS tool_usages (
            tool_usage_id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            tool_input TEXT NOT NULL DEFAULT '{}',
            tool_result TEXT,
            is_error INTEGER NOT NULL DEFAULT 0,
            file_path TEXT,
            command TEXT,
            commit_intent TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tool_usages_message ON tool_usages(message_id);
        CREATE INDEX IF NOT EXISTS idx_tool_usages_session ON tool_usages(session_id);
        CREATE INDEX IF NOT EXISTS idx_tool_usages_name ON tool_usages(tool_name);

        CREATE TABLE IF NOT EXISTS commits (
            commit_hash TEXT PRIMARY KEY,
            commit_message TEXT NOT NULL,
            branch TEXT,
            timestamp TEXT,
            message_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            interaction_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_commits_session ON commits(session_id);
        CREATE INDEX IF NOT EXISTS idx_commits_interaction ON commits(interaction_id);

        CREATE TABLE IF NOT EXISTS interactions (
            interaction_id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            sequence_num INTEGER NOT NULL,
            user_prompt TEXT NOT NULL DEFAULT '',
            timestamp TEXT,
            has_thinking INTEGER NOT NULL DEFAULT 0,
            tool_calls TEXT NOT NULL DEFAULT '[]',
            total_cost_usd REAL NOT NULL DEFAULT 0.0
        );

        CREATE INDEX IF NOT EXISTS idx_interactions_session ON interactions(session_id, sequence_num);

        CREATE TABLE IF NOT EXISTS interaction_messages (
            interaction_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            message_id TEXT NOT NULL,
            PRIMARY KEY (interaction_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_interaction_messages_message ON interaction_messages(message_id);

        CREATE TABLE IF NOT EXISTS interaction_commits (
            interaction_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            commit_hash TEXT NOT NULL,
            commit_message TEXT NOT NULL,
            branch TEXT,
            timestamp TEXT,
            message_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            PRIMARY KEY (interaction_id, position)
        );
        "#,
    )?;
    Ok(())
}

fn create_fts_tables(conn: &Connection) -> Result<()> {
    let has_fts: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='messages_fts'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(false);
    if has_fts {
        return Ok(());
    }

    info!(target: "scrollback::db", "Creating FTS5 tables for messages and tool usages");

    conn.execute_batch(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
            searchable_text,
            content='messages',
            content_rowid='rowid',
            prefix='2 3'
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS tool_usages_fts USING fts5(
            tool_input,
            tool_result,
            command,
            file_path,
            content='tool_usages',
            content_rowid='rowid',
            prefix='2 3'
        );

        CREATE TRIGGER IF NOT EXISTS messages_fts_insert
        AFTER INSERT ON messages BEGIN
            INSERT INTO messages_fts(rowid, searchable_text)
            VALUES (NEW.rowid, NEW.searchable_text);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_delete
        AFTER DELETE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, searchable_text)
            VALUES ('delete', OLD.rowid, OLD.searchable_text);
        END;

        CREATE TRIGGER IF NOT EXISTS messages_fts_update
        AFTER UPDATE ON messages BEGIN
            INSERT INTO messages_fts(messages_fts, rowid, searchable_text)
            VALUES ('delete', OLD.rowid, OLD.searchable_text);
            INSERT INTO messages_fts(rowid, searchable_text)
            VALUES (NEW.rowid, NEW.searchable_text);
        END;

        CREATE TRIGGER IF NOT EXISTS tool_usages_fts_insert
        AFTER INSERT ON tool_usages BEGIN
            INSERT INTO tool_usages_fts(rowid, tool_input, tool_result, command, file_path)
            VALUES (NEW.rowid, NEW.tool_input, NEW.tool_result, NEW.command, NEW.file_path);
        END;

        CREATE TRIGGER IF NOT EXISTS tool_usages_fts_delete
        AFTER DELETE ON tool_usages BEGIN
            INSERT INTO tool_usages_fts(tool_usages_fts, rowid, tool_input, tool_result, command, file_path)
            VALUES ('delete', OLD.rowid, OLD.tool_input, OLD.tool_result, OLD.command, OLD.file_path);
        END;

        CREATE TRIGGER IF NOT EXISTS tool_usages_fts_update
        AFTER UPDATE ON tool_usages BEGIN
            INSERT INTO tool_usages_fts(tool_usages_fts, rowid, tool_input, tool_result, command, file_path)
            VALUES ('delete', OLD.rowid, OLD.tool_input, OLD.tool_result, OLD.command, OLD.file_path);
            INSERT INTO tool_usages_fts(rowid, tool_input, tool_result, command, file_path)
            VALUES (NEW.rowid, NEW.tool_input, NEW.tool_result, NEW.command, NEW.file_path);
        END;
        "#,
    )?;

    // Rows written while the store ran without FTS.
    conn.execute_batch(
        r#"
        INSERT INTO messages_fts(messages_fts) VALUES('rebuild');
        INSERT INTO tool_usages_fts(tool_usages_fts) VALUES('rebuild');
        "#,
    )?;

    Ok(())
}

/// Build an FTS5 query from free text.
///
/// Each token is wrapped in double quotes and suffixed with `*` for prefix
/// matching; tokens are joined with AND. Tokens without any alphanumeric
/// character cannot match anything and are dropped. Returns `None` when no
/// token remains.
///
/// - `"Re"` → `"Re"*`
/// - `describe project` → `"describe"* AND "project"*`
/// - `package.json` → `"package.json"*`
pub fn escape_fts5_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" AND "))
    }
}

// =============================================================================
// Write helpers
// =============================================================================

fn delete_session_rows(tx: &Transaction<'_>, session_id: &str) -> Result<bool> {
    tx.execute(
        "DELETE FROM interaction_messages WHERE interaction_id IN
            (SELECT interaction_id FROM interactions WHERE session_id = ?1)",
        params![session_id],
    )?;
    tx.execute(
        "DELETE FROM interaction_commits WHERE session_id = ?1",
        params![session_id],
    )?;
    tx.execute("DELETE FROM interactions WHERE session_id = ?1", params![session_id])?;
    tx.execute("DELETE FROM commits WHERE session_id = ?1", params![session_id])?;
    tx.execute("DELETE FROM tool_usages WHERE session_id = ?1", params![session_id])?;
    tx.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
    let sessions = tx.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
    Ok(sessions > 0)
}

fn upsert_session(tx: &Transaction<'_>, session: &SessionRecord) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO sessions (session_id, source, session_path, project_directory, created_at,
                              last_message_at, message_count, total_cost_usd, indexed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(session_id) DO UPDATE SET
            source = excluded.source,
            session_path = excluded.session_path,
            project_directory = excluded.project_directory,
            created_at = excluded.created_at,
            last_message_at = excluded.last_message_at,
            message_count = excluded.message_count,
            total_cost_usd = excluded.total_cost_usd,
            indexed_at = excluded.indexed_at
        "#,
        params![
            session.session_id,
            session.source,
            session.session_path,
            session.project_directory,
            session.created_at.as_ref().map(format_timestamp),
            session.last_message_at.as_ref().map(format_timestamp),
            session.message_count as i64,
            session.total_cost_usd,
            format_timestamp(&session.indexed_at),
        ],
    )?;
    Ok(())
}

fn upsert_message(tx: &Transaction<'_>, message: &Message) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO messages (message_id, session_id, sequence_num, role, timestamp, text_content,
                              thinking_content, searchable_text, content_type, tool_summary,
                              cost_usd, duration_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(message_id) DO UPDATE SET
            session_id = excluded.session_id,
            sequence_num = excluded.sequence_num,
            role = excluded.role,
            timestamp = excluded.timestamp,
            text_content = excluded.text_content,
            thinking_content = excluded.thinking_content,
            searchable_text = excluded.searchable_text,
            content_type = excluded.content_type,
            tool_summary = excluded.tool_summary,
            cost_usd = excluded.cost_usd,
            duration_ms = excluded.duration_ms
        "#,
        params![
            message.message_id,
            message.session_id,
            message.sequence_num as i64,
            message.role,
            message.timestamp.as_ref().map(format_timestamp),
            message.text_content,
            message.thinking_content,
            message.searchable_text,
            message.content_type.as_str(),
            message.tool_summary,
            message.cost_usd,
            message.duration_ms,
        ],
    )?;
    Ok(())
}

fn upsert_tool_usage(tx: &Transaction<'_>, usage: &ToolUsage) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO tool_usages (tool_usage_id, message_id, session_id, tool_name, tool_input,
                                 tool_result, is_error, file_path, command, commit_intent)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(tool_usage_id) DO UPDATE SET
            message_id = excluded.message_id,
            session_id = excluded.session_id,
            tool_name = excluded.tool_name,
            tool_input = excluded.tool_input,
            tool_result = excluded.tool_result,
            is_error = excluded.is_error,
            file_path = excluded.file_path,
            command = excluded.command,
            commit_intent = excluded.commit_intent
        "#,
        params![
            usage.tool_usage_id,
            usage.message_id,
            usage.session_id,
            usage.tool_name,
            usage.tool_input,
            usage.tool_result,
            usage.is_error as i32,
            usage.file_path,
            usage.command,
            usage.commit_intent,
        ],
    )?;
    Ok(())
}

fn upsert_commit(tx: &Transaction<'_>, commit: &Commit) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO commits (commit_hash, commit_message, branch, timestamp, message_id,
                             session_id, interaction_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(commit_hash) DO UPDATE SET
            commit_message = excluded.commit_message,
            branch = excluded.branch,
            timestamp = excluded.timestamp,
            message_id = excluded.message_id,
            session_id = excluded.session_id,
            interaction_id = excluded.interaction_id
        "#,
        params![
            commit.commit_hash,
            commit.commit_message,
            commit.branch,
            commit.timestamp.as_ref().map(format_timestamp),
            commit.message_id,
            commit.session_id,
            commit.interaction_id,
        ],
    )?;
    Ok(())
}

fn upsert_interaction(tx: &Transaction<'_>, interaction: &Interaction) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO interactions (interaction_id, session_id, sequence_num, user_prompt, timestamp,
                                  has_thinking, tool_calls, total_cost_usd)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(interaction_id) DO UPDATE SET
            session_id = excluded.session_id,
            sequence_num = excluded.sequence_num,
            user_prompt = excluded.user_prompt,
            timestamp = excluded.timestamp,
            has_thinking = excluded.has_thinking,
            tool_calls = excluded.tool_calls,
            total_cost_usd = excluded.total_cost_usd
        "#,
        params![
            interaction.interaction_id,
            interaction.session_id,
            interaction.sequence_num as i64,
            interaction.user_prompt,
            interaction.timestamp.as_ref().map(format_timestamp),
            interaction.has_thinking as i32,
            serde_json::to_string(&interaction.tool_calls)?,
            interaction.total_cost_usd,
        ],
    )?;

    tx.execute(
        "DELETE FROM interaction_messages WHERE interaction_id = ?1",
        params![interaction.interaction_id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO interaction_messages (interaction_id, position, message_id) VALUES (?1, ?2, ?3)",
    )?;
    for (position, message_id) in interaction.message_ids.iter().enumerate() {
        stmt.execute(params![interaction.interaction_id, position as i64, message_id])?;
    }

    // A hash may recur across interactions; membership keeps every occurrence.
    tx.execute(
        "DELETE FROM interaction_commits WHERE interaction_id = ?1",
        params![interaction.interaction_id],
    )?;
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO interaction_commits (interaction_id, position, commit_hash, commit_message,
                                         branch, timestamp, message_id, session_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )?;
    for (position, commit) in interaction.commits.iter().enumerate() {
        stmt.execute(params![
            interaction.interaction_id,
            position as i64,
            commit.commit_hash,
            commit.commit_message,
            commit.branch,
            commit.timestamp.as_ref().map(format_timestamp),
            commit.message_id,
            commit.session_id,
        ])?;
    }
    Ok(())
}

fn load_interaction_members(conn: &Connection, mut interaction: Interaction) -> Result<Interaction> {
    let mut stmt = conn.prepare(
        "SELECT message_id FROM interaction_messages WHERE interaction_id = ?1 ORDER BY position",
    )?;
    interaction.message_ids = stmt
        .query_map(params![interaction.interaction_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {INTERACTION_COMMIT_COLUMNS} FROM interaction_commits ic
         WHERE ic.interaction_id = ?1
         ORDER BY ic.position"
    ))?;
    interaction.commits = stmt
        .query_map(params![interaction.interaction_id], row_to_commit)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(interaction)
}

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Corpus {
    Messages,
    Tools,
}

/// WHERE conditions with their positional parameters, in order.
#[derive(Default)]
struct Clauses {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl Clauses {
    fn push(&mut self, condition: &str, values: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition.to_string());
        self.params.extend(values);
    }

    fn render(&self) -> String {
        if self.conditions.is_empty() {
            "1 = 1".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }
}

fn apply_filters(clauses: &mut Clauses, filters: &SearchFilters, corpus: Corpus) {
    let session_column = match corpus {
        Corpus::Messages => "m.session_id",
        Corpus::Tools => "t.session_id",
    };

    if let Some(role) = &filters.role {
        clauses.push("m.role = ?", [SqlValue::from(role.clone())]);
    }
    if let Some(session_id) = &filters.session_id {
        clauses.push(
            &format!("{session_column} = ?"),
            [SqlValue::from(session_id.clone())],
        );
    }
    if let Some(since) = &filters.since {
        clauses.push("m.timestamp >= ?", [SqlValue::from(format_timestamp(since))]);
    }
    if let Some(until) = &filters.until {
        clauses.push("m.timestamp <= ?", [SqlValue::from(format_timestamp(until))]);
    }
    if let Some(content_type) = &filters.content_type {
        let accepted = content_type.accepted();
        let placeholders = vec!["?"; accepted.len()].join(", ");
        clauses.push(
            &format!("m.content_type IN ({placeholders})"),
            accepted.into_iter().map(|ct| SqlValue::from(ct.to_string())),
        );
    }
    if let Some(tool) = &filters.tool {
        let condition = match corpus {
            Corpus::Messages => {
                "EXISTS (SELECT 1 FROM tool_usages tf WHERE tf.message_id = m.message_id AND tf.tool_name = ?)"
            }
            Corpus::Tools => "t.tool_name = ?",
        };
        clauses.push(condition, [SqlValue::from(tool.clone())]);
    }
}

// =============================================================================
// Row conversion helpers
// =============================================================================

fn opt_timestamp(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn content_type(raw: &str) -> ContentType {
    raw.parse().unwrap_or(ContentType::Text)
}

fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
    let message_count: i64 = row.get("message_count")?;
    let indexed_at: String = row.get("indexed_at")?;

    Ok(SessionRecord {
        session_id: row.get("session_id")?,
        source: row.get("source")?,
        session_path: row.get("session_path")?,
        project_directory: row.get("project_directory")?,
        created_at: opt_timestamp(row, "created_at")?,
        last_message_at: opt_timestamp(row, "last_message_at")?,
        message_count: message_count as u32,
        total_cost_usd: row.get("total_cost_usd")?,
        indexed_at: parse_timestamp(&indexed_at).unwrap_or_default(),
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let sequence_num: i64 = row.get("sequence_num")?;
    let content_type_raw: String = row.get("content_type")?;

    Ok(Message {
        message_id: row.get("message_id")?,
        session_id: row.get("session_id")?,
        sequence_num: sequence_num as u32,
        role: row.get("role")?,
        timestamp: opt_timestamp(row, "timestamp")?,
        text_content: row.get("text_content")?,
        thinking_content: row.get("thinking_content")?,
        searchable_text: row.get("searchable_text")?,
        content_type: content_type(&content_type_raw),
        tool_summary: row.get("tool_summary")?,
        cost_usd: row.get("cost_usd")?,
        duration_ms: row.get("duration_ms")?,
    })
}

fn row_to_tool_usage(row: &Row) -> rusqlite::Result<ToolUsage> {
    let is_error: i32 = row.get("is_error")?;

    Ok(ToolUsage {
        tool_usage_id: row.get("tool_usage_id")?,
        message_id: row.get("message_id")?,
        session_id: row.get("session_id")?,
        tool_name: row.get("tool_name")?,
        tool_input: row.get("tool_input")?,
        tool_result: row.get("tool_result")?,
        is_error: is_error != 0,
        file_path: row.get("file_path")?,
        command: row.get("command")?,
        commit_intent: row.get("commit_intent")?,
    })
}

fn row_to_commit(row: &Row) -> rusqlite::Result<Commit> {
    Ok(Commit {
        commit_hash: row.get("commit_hash")?,
        commit_message: row.get("commit_message")?,
        branch: row.get("branch")?,
        timestamp: opt_timestamp(row, "timestamp")?,
        message_id: row.get("message_id")?,
        session_id: row.get("session_id")?,
        interaction_id: row.get("interaction_id")?,
    })
}

/// Interaction without its members; see [`load_interaction_members`].
fn row_to_interaction(row: &Row) -> rusqlite::Result<Interaction> {
    let sequence_num: i64 = row.get("sequence_num")?;
    let has_thinking: i32 = row.get("has_thinking")?;
    let tool_calls: String = row.get("tool_calls")?;

    Ok(Interaction {
        interaction_id: row.get("interaction_id")?,
        session_id: row.get("session_id")?,
        sequence_num: sequence_num as u32,
        user_prompt: row.get("user_prompt")?,
        message_ids: Vec::new(),
        timestamp: opt_timestamp(row, "timestamp")?,
        has_thinking: has_thinking != 0,
        tool_calls: serde_json::from_str(&tool_calls).unwrap_or_default(),
        commits: Vec::new(),
        total_cost_usd: row.get("total_cost_usd")?,
    })
}

fn row_to_message_hit(row: &Row) -> rusqlite::Result<SearchHit> {
    let message = row_to_message(row)?;

    Ok(SearchHit {
        match_source: MatchSource::Message,
        score: row.get("score")?,
        message_id: message.message_id,
        session_id: message.session_id,
        sequence_num: Some(message.sequence_num),
        role: Some(message.role),
        timestamp: message.timestamp,
        content_type: Some(message.content_type),
        text_content: Some(message.text_content),
        thinking_content: message.thinking_content,
        tool_summary: message.tool_summary,
        project_directory: row.get("project_directory")?,
        source: row.get("source")?,
        tool_usage_id: None,
        tool_name: None,
        tool_input: None,
        tool_result: None,
        file_path: None,
        command: None,
        is_error: None,
    })
}

fn row_to_tool_hit(row: &Row) -> rusqlite::Result<SearchHit> {
    let usage = row_to_tool_usage(row)?;
    let sequence_num: Option<i64> = row.get("sequence_num")?;
    let content_type_raw: Option<String> = row.get("content_type")?;

    Ok(SearchHit {
        match_source: MatchSource::Tool,
        score: row.get("score")?,
        message_id: usage.message_id,
        session_id: usage.session_id,
        sequence_num: sequence_num.map(|n| n as u32),
        role: row.get("role")?,
        timestamp: opt_timestamp(row, "timestamp")?,
        content_type: content_type_raw.as_deref().map(content_type),
        text_content: None,
        thinking_content: None,
        tool_summary: None,
        project_directory: row.get("project_directory")?,
        source: row.get("source")?,
        tool_usage_id: Some(usage.tool_usage_id),
        tool_name: Some(usage.tool_name),
        tool_input: Some(usage.tool_input),
        tool_result: usage.tool_result,
        file_path: usage.file_path,
        command: usage.command,
        is_error: Some(usage.is_error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_session;
    use crate::segmenter::segment;
    use scrollback_types::ContentTypeFilter;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn create_test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("test.db"), true).unwrap();
        (store, temp_dir)
    }

    fn session_record(session_id: &str, records: &[NormalizedRecord]) -> SessionRecord {
        let (first, last) =
            crate::normalizer::time_span(records.iter().map(|r| &r.message));
        SessionRecord {
            session_id: session_id.to_string(),
            source: "local".to_string(),
            session_path: None,
            project_directory: Some("/work/demo".to_string()),
            created_at: first,
            last_message_at: last,
            message_count: records.len() as u32,
            total_cost_usd: crate::normalizer::total_cost(records.iter().map(|r| &r.message)),
            indexed_at: Utc::now(),
        }
    }

    fn store_session(store: &Store, session_id: &str, raw: &[Value]) {
        let records = normalize_session(session_id, raw);
        let interactions = segment(session_id, &records);
        store
            .replace_session(&session_record(session_id, &records), &records, &interactions)
            .unwrap();
    }

    fn sample_records() -> Vec<Value> {
        vec![
            json!({"uuid": "u1", "type": "user", "timestamp": "2024-12-25T10:00:00Z",
                   "message": {"role": "user", "content": "Refactor the Python parser"}}),
            json!({"uuid": "a1", "type": "assistant", "timestamp": "2024-12-25T10:00:05Z", "costUSD": 0.02,
                   "message": {"role": "assistant", "content": [
                       {"type": "text", "text": "Reading the parser module first."},
                       {"type": "tool_use", "id": "t1", "name": "Read", "input": {"file_path": "src/parser.py"}}
                   ]}}),
            json!({"uuid": "r1", "type": "user", "timestamp": "2024-12-25T10:00:06Z",
                   "message": {"role": "user", "content": [
                       {"type": "tool_result", "tool_use_id": "t1", "content": "def tokenize(source): ..."}
                   ]}}),
            json!({"uuid": "a2", "type": "assistant", "timestamp": "2024-12-25T10:00:10Z",
                   "message": {"role": "assistant", "content": [
                       {"type": "tool_use", "id": "t2", "name": "Bash",
                        "input": {"command": "git commit -am \"refactor: split tokenizer\""}}
                   ]}}),
            json!({"uuid": "r2", "type": "user", "timestamp": "2024-12-25T10:00:12Z",
                   "message": {"role": "user", "content": [
                       {"type": "tool_result", "tool_use_id": "t2", "content": "[main abc1234] refactor: split tokenizer"}
                   ]}}),
        ]
    }

    #[test]
    fn test_escape_fts5_query() {
        assert_eq!(escape_fts5_query("Re").as_deref(), Some("\"Re\"*"));
        assert_eq!(
            escape_fts5_query("describe project").as_deref(),
            Some("\"describe\"* AND \"project\"*")
        );
        assert_eq!(
            escape_fts5_query("package.json").as_deref(),
            Some("\"package.json\"*")
        );
        assert_eq!(
            escape_fts5_query("say \"hi\"").as_deref(),
            Some("\"say\"* AND \"\"\"hi\"\"\"*")
        );
        assert_eq!(escape_fts5_query("-- ::"), None);
        assert_eq!(escape_fts5_query("   "), None);
    }

    #[test]
    fn test_replace_session_round_trip() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let session = store.get_session("s1").unwrap().unwrap();
        assert_eq!(session.message_count, 5);
        assert_eq!(session.project_directory.as_deref(), Some("/work/demo"));
        assert_eq!(session.last_message_at, parse_timestamp("2024-12-25T10:00:12Z"));

        let messages = store.session_messages("s1").unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].content_type, ContentType::Text);
        assert_eq!(messages[2].content_type, ContentType::ToolResult);
        assert_eq!(messages[1].cost_usd, Some(0.02));

        let usages = store.tool_usages_for_message("a1").unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].tool_result.as_deref(), Some("def tokenize(source): ..."));

        let commit = store.get_commit("abc1234").unwrap().unwrap();
        assert_eq!(commit.message_id, "r2");
        assert_eq!(commit.interaction_id.as_deref(), Some("s1-interaction-0"));
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn test_reindex_supersedes_prior_state() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let shorter = vec![json!({"uuid": "u9", "type": "user",
            "message": {"role": "user", "content": "Only message now"}})];
        store_session(&store, "s1", &shorter);

        assert_eq!(store.session_messages("s1").unwrap().len(), 1);
        assert!(store.get_message("a1").unwrap().is_none());
        assert!(store.get_commit("abc1234").unwrap().is_none());
        assert!(store
            .search_messages("parser", &SearchFilters::default(), 10)
            .unwrap()
            .is_empty());

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.tool_count, 0);
        assert_eq!(stats.interaction_count, 1);
    }

    #[test]
    fn test_search_messages_ranked() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let hits = store
            .search_messages("parser", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.match_source == MatchSource::Message));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].project_directory.as_deref(), Some("/work/demo"));
        assert_eq!(hits[0].source.as_deref(), Some("local"));
        assert!(hits[0].tool_name.is_none());
    }

    #[test]
    fn test_search_messages_prefix_match() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let hits = store
            .search_messages("Refac", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "u1");
    }

    #[test]
    fn test_search_tools_matches_input_result_and_command() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let by_path = store
            .search_tools("parser.py", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(by_path.len(), 1);
        assert_eq!(by_path[0].tool_name.as_deref(), Some("Read"));
        assert_eq!(by_path[0].match_source, MatchSource::Tool);
        assert_eq!(by_path[0].sequence_num, Some(1));
        assert!(by_path[0].text_content.is_none());

        let by_result = store
            .search_tools("source", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(by_result.len(), 1);

        let by_command = store
            .search_tools("tokenizer", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(by_command.len(), 1);
        assert_eq!(by_command[0].tool_usage_id.as_deref(), Some("t2"));
    }

    #[test]
    fn test_filters() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());
        store_session(&store, "s2", &sample_records_renamed("s2"));

        let role = SearchFilters {
            role: Some("assistant".to_string()),
            ..Default::default()
        };
        let hits = store.search_messages("parser", &role, 10).unwrap();
        assert!(hits.iter().all(|h| h.role.as_deref() == Some("assistant")));
        assert_eq!(hits.len(), 2);

        let session = SearchFilters {
            session_id: Some("s2".to_string()),
            ..Default::default()
        };
        let hits = store.search_messages("parser", &session, 10).unwrap();
        assert!(hits.iter().all(|h| h.session_id == "s2"));

        let tool = SearchFilters {
            tool: Some("Read".to_string()),
            ..Default::default()
        };
        let hits = store.search_messages("parser", &tool, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.message_id.ends_with("a1")));
        let tool_hits = store.search_tools("tokenize", &tool, 10).unwrap();
        assert!(tool_hits.iter().all(|h| h.tool_name.as_deref() == Some("Read")));

        let late = SearchFilters {
            since: parse_timestamp("2024-12-25T10:00:04Z"),
            ..Default::default()
        };
        let hits = store.search_messages("parser", &late, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.message_id.ends_with("a1")));

        let early = SearchFilters {
            until: parse_timestamp("2024-12-25T10:00:01Z"),
            ..Default::default()
        };
        let hits = store.search_messages("parser", &early, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.message_id.ends_with("u1")));

        let tools_only = SearchFilters {
            content_type: Some(ContentTypeFilter::AnyTool),
            ..Default::default()
        };
        let hits = store.search_messages("tokenize", &tools_only, 10).unwrap();
        assert!(hits.is_empty());
    }

    fn sample_records_renamed(prefix: &str) -> Vec<Value> {
        sample_records()
            .into_iter()
            .map(|mut record| {
                let uuid = record["uuid"].as_str().unwrap_or_default().to_string();
                record["uuid"] = json!(format!("{}-{}", prefix, uuid));
                if let Some(blocks) = record["message"]["content"].as_array_mut() {
                    for block in blocks {
                        for key in ["id", "tool_use_id"] {
                            if let Some(id) = block.get(key).and_then(Value::as_str) {
                                let renamed = format!("{}-{}", prefix, id);
                                block[key] = json!(renamed);
                            }
                        }
                    }
                }
                record
            })
            .collect()
    }

    #[test]
    fn test_substring_mode() {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(&temp_dir.path().join("plain.db"), false).unwrap();
        assert_eq!(store.search_mode(), SearchMode::Substring);
        store_session(&store, "s1", &sample_records());

        let hits = store
            .search_messages("PYTHON", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.0);

        let hits = store
            .search_messages("parser", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let tool_hits = store
            .search_tools("src/parser", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(tool_hits.len(), 1);
    }

    #[test]
    fn test_substring_mode_folds_non_ascii_case() {
        let store = Store::open_in_memory(false).unwrap();
        store_session(
            &store,
            "s1",
            &[
                json!({"uuid": "z1", "type": "user", "timestamp": "2024-12-25T10:00:00Z",
                       "message": {"role": "user", "content": "Die Straße in Zürich"}}),
                json!({"uuid": "z2", "type": "assistant", "timestamp": "2024-12-25T10:00:02Z",
                       "message": {"role": "assistant", "content": [
                           {"type": "tool_use", "id": "t1", "name": "Read", "input": {"file_path": "docs/ÜBERSICHT.md"}}
                       ]}}),
                json!({"uuid": "z3", "type": "user", "timestamp": "2024-12-25T10:00:03Z",
                       "message": {"role": "user", "content": [
                           {"type": "tool_result", "tool_use_id": "t1", "content": "[main abc1234] fix: Ärger mit Umlauten"}
                       ]}}),
            ],
        );

        for query in ["zürich", "ZÜRICH", "Zürich"] {
            let hits = store
                .search_messages(query, &SearchFilters::default(), 10)
                .unwrap();
            assert_eq!(hits.len(), 1, "{}", query);
            assert_eq!(hits[0].message_id, "z1");
        }

        let tool_hits = store
            .search_tools("übersicht", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(tool_hits.len(), 1);

        let commits = store.search_commits("ÄRGER", None, 10).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].commit_hash, "abc1234");
    }

    #[test]
    fn test_repeated_commit_stays_with_each_interaction() {
        let (store, _dir) = create_test_store();
        let raw = vec![
            json!({"uuid": "u1", "type": "user", "timestamp": "2024-12-25T10:00:00Z",
                   "message": {"role": "user", "content": "Commit the fix"}}),
            json!({"uuid": "r1", "type": "user", "timestamp": "2024-12-25T10:00:01Z",
                   "message": {"role": "user", "content": [
                       {"type": "tool_result", "tool_use_id": "t1", "content": "[main abc1234] fix: x"}
                   ]}}),
            json!({"uuid": "u2", "type": "user", "timestamp": "2024-12-25T10:01:00Z",
                   "message": {"role": "user", "content": "Show me that commit again"}}),
            json!({"uuid": "r2", "type": "user", "timestamp": "2024-12-25T10:01:01Z",
                   "message": {"role": "user", "content": [
                       {"type": "tool_result", "tool_use_id": "t2", "content": "[main abc1234] fix: x"}
                   ]}}),
        ];

        // Re-indexing must not duplicate or drop memberships.
        for _ in 0..2 {
            store_session(&store, "s1", &raw);
        }

        let interactions = store.list_interactions("s1", None).unwrap();
        assert_eq!(interactions.len(), 2);
        for (interaction, message_id) in interactions.iter().zip(["r1", "r2"]) {
            assert_eq!(interaction.commits.len(), 1);
            let commit = &interaction.commits[0];
            assert_eq!(commit.commit_hash, "abc1234");
            assert_eq!(commit.message_id, message_id);
            assert_eq!(
                commit.interaction_id.as_deref(),
                Some(interaction.interaction_id.as_str())
            );
        }

        let first = store
            .get_interaction("s1", "s1-interaction-0")
            .unwrap()
            .unwrap();
        assert_eq!(first.commits.len(), 1);
        assert_eq!(store.stats().unwrap().commit_count, 1);

        assert!(store.delete_session("s1").unwrap());
        store_session(&store, "s1", &raw[..2]);
        let interactions = store.list_interactions("s1", None).unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].commits.len(), 1);
    }

    #[test]
    fn test_switching_to_full_text_indexes_existing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("upgrade.db");
        {
            let store = Store::open(&path, false).unwrap();
            store_session(&store, "s1", &sample_records());
        }
        let store = Store::open(&path, true).unwrap();
        assert_eq!(store.search_mode(), SearchMode::FullText);
        let hits = store
            .search_messages("parser", &SearchFilters::default(), 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_context_windows() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        let before = store.messages_before("s1", 3, 2).unwrap();
        let seqs: Vec<u32> = before.iter().map(|m| m.sequence_num).collect();
        assert_eq!(seqs, vec![1, 2]);

        let after = store.messages_after("s1", 3, 5).unwrap();
        let seqs: Vec<u32> = after.iter().map(|m| m.sequence_num).collect();
        assert_eq!(seqs, vec![4]);

        assert!(store.messages_before("s1", 0, 3).unwrap().is_empty());
    }

    #[test]
    fn test_interactions() {
        let (store, _dir) = create_test_store();
        let mut raw = sample_records();
        raw.push(json!({"uuid": "u2", "type": "user", "message": {"role": "user", "content": "Thanks"}}));
        store_session(&store, "s1", &raw);

        let interactions = store.list_interactions("s1", None).unwrap();
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].message_ids, vec!["u1", "a1", "r1", "a2", "r2"]);
        assert_eq!(interactions[0].tool_calls, vec!["Read", "Bash"]);
        assert_eq!(interactions[0].commits.len(), 1);
        assert_eq!(interactions[1].user_prompt, "Thanks");

        assert_eq!(store.list_interactions("s1", Some(1)).unwrap().len(), 1);

        let found = store
            .get_interaction("s1", "s1-interaction-1")
            .unwrap()
            .unwrap();
        assert_eq!(found.message_ids, vec!["u2"]);
        assert!(store
            .get_interaction("other", "s1-interaction-1")
            .unwrap()
            .is_none());

        let owner = store.interaction_for_message("r1").unwrap().unwrap();
        assert_eq!(owner.interaction_id, "s1-interaction-0");

        let members = store.interaction_messages("s1-interaction-0").unwrap();
        assert_eq!(members.len(), 5);
        let usages = store.interaction_tool_usages("s1-interaction-0").unwrap();
        assert_eq!(usages.len(), 2);
    }

    #[test]
    fn test_search_commits() {
        let (store, _dir) = create_test_store();
        store_session(&store, "s1", &sample_records());

        assert_eq!(store.search_commits("TOKENIZER", None, 10).unwrap().len(), 1);
        assert_eq!(store.search_commits("abc12", Some("s1"), 10).unwrap().len(), 1);
        assert!(store.search_commits("abc12", Some("s2"), 10).unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_listing() {
        let (store, _dir) = create_test_store();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.stats().unwrap(), IndexStats::default());

        store_session(&store, "s1", &sample_records());
        store_session(
            &store,
            "s2",
            &[json!({"uuid": "late", "type": "user", "timestamp": "2025-01-01T00:00:00Z", "costUSD": 0.00004,
                     "message": {"role": "user", "content": "later"}})],
        );

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.message_count, 6);
        assert_eq!(stats.tool_count, 2);
        assert_eq!(stats.commit_count, 1);
        assert_eq!(stats.total_cost_usd, 0.0200);
        assert_eq!(stats.earliest_message, parse_timestamp("2024-12-25T10:00:00Z"));
        assert_eq!(stats.latest_message, parse_timestamp("2025-01-01T00:00:00Z"));

        let sessions = store.list_sessions().unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);

        assert!(store.delete_session("s2").unwrap());
        assert!(!store.delete_session("s2").unwrap());
        assert_eq!(store.list_sessions().unwrap().len(), 1);
    }
}
