//! Scrollback - index and search Claude Code session transcripts.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use scrollback_core::{IndexSummary, SearchIndex, SessionLoader};
use scrollback_server::{build_router, config, logging, output, state};
use scrollback_types::{
    parse_timestamp, ContentTypeFilter, SearchFilters, SearchRequest, SearchScope,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use logging::{LogConfig, LogFormat};
use output::OutputFormat;
use state::AppState;

/// Scrollback - search your Claude Code history.
#[derive(Parser, Debug)]
#[command(name = "scrollback")]
#[command(about = "Index and search Claude Code session transcripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override bind host from config
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override port from config
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Override index database path from config
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging (INFO level for every target)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "search=debug").
    /// Can be specified multiple times. Targets are prefixed with "scrollback::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

impl Cli {
    /// Apply `--host`, `--port` and `--db` on top of the loaded config.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Re-index every discovered session before serving
        #[arg(long)]
        reindex: bool,
    },
    /// Index sessions from the projects directory
    Index {
        /// Index only this session (repeatable)
        #[arg(long = "session", value_name = "ID")]
        sessions: Vec<String>,
        /// Index every discovered session
        #[arg(long)]
        all: bool,
    },
    /// Search indexed sessions
    Search {
        query: String,
        #[arg(long)]
        role: Option<String>,
        /// Only hits involving this tool
        #[arg(long)]
        tool: Option<String>,
        #[arg(long, value_name = "ID")]
        session: Option<String>,
        /// Earliest timestamp (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Latest timestamp (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        /// text, thinking, tool_use, tool_result, system or tool
        #[arg(long = "content-type")]
        content_type: Option<ContentTypeFilter>,
        /// all, messages or tools
        #[arg(long, default_value = "all")]
        scope: SearchScope,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// List indexed sessions
    List {
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats {
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides.clone(),
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply_overrides(&mut config);

    tracing::info!(
        target: "scrollback::startup",
        "Loaded configuration (db: {:?}, projects: {:?})",
        config.db_path,
        config.projects_dir
    );

    let state = Arc::new(AppState::new(config)?);

    match cli.command.unwrap_or(Command::Serve { reindex: false }) {
        Command::Serve { reindex } => serve(state, reindex).await,
        Command::Index { sessions, all } => {
            let summaries = if all || sessions.is_empty() {
                state.index.index_all(state.loader.as_ref())?
            } else {
                index_sessions(&state.index, state.loader.as_ref(), &sessions)?
            };
            for summary in &summaries {
                println!(
                    "{}: {} messages, {} tool usages, {} interactions, {} commits",
                    summary.session_id,
                    summary.message_count,
                    summary.tool_count,
                    summary.interaction_count,
                    summary.commit_count
                );
            }
            println!("Indexed {} session(s)", summaries.len());
            Ok(())
        }
        Command::Search {
            query,
            role,
            tool,
            session,
            since,
            until,
            content_type,
            scope,
            limit,
            format,
        } => {
            let filters = SearchFilters {
                role,
                tool,
                session_id: session,
                since: since.as_deref().map(parse_bound).transpose()?,
                until: until.as_deref().map(parse_bound).transpose()?,
                content_type,
            };
            let request = SearchRequest::new(query)
                .with_limit(state.config.clamp_limit(limit))
                .with_filters(filters)
                .with_scope(scope);
            let results = state.index.search(&request)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Text => {
                    if results.hits.is_empty() {
                        println!("No matches for {:?}", results.query);
                    }
                    for hit in &results.hits {
                        println!("{}", output::format_hit(hit, results.ranked));
                    }
                }
            }
            Ok(())
        }
        Command::List { format } => {
            let sessions = state.index.list_sessions()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sessions)?),
                OutputFormat::Text => {
                    for session in &sessions {
                        println!("{}", output::format_session(session));
                    }
                }
            }
            Ok(())
        }
        Command::Stats { format } => {
            let stats = state.index.get_stats()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => println!("{}", output::format_stats(&stats)),
            }
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>, reindex: bool) -> Result<()> {
    if reindex || state.index.is_empty()? {
        let summaries = state.index.index_all(state.loader.as_ref())?;
        tracing::info!(target: "scrollback::startup", "Indexed {} sessions", summaries.len());
    }

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port).parse()?;
    let app = build_router(state);

    tracing::info!(target: "scrollback::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Index the named sessions, failing on the first id the loader does not know.
fn index_sessions(
    index: &SearchIndex,
    loader: &dyn SessionLoader,
    ids: &[String],
) -> Result<Vec<IndexSummary>> {
    let discovered = loader.discover_sessions()?;
    let mut summaries = Vec::with_capacity(ids.len());

    for id in ids {
        let Some(info) = discovered.iter().find(|info| &info.id == id) else {
            bail!("Session not found: {}", id);
        };
        summaries.push(index.index_from_loader(loader, info)?);
    }

    Ok(summaries)
}

fn parse_bound(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    match parse_timestamp(value) {
        Some(ts) => Ok(ts),
        None => bail!("Invalid timestamp: '{}'", value),
    }
}
