//! Transcript normalization, segmentation, indexing and search for Scrollback.

pub mod commit;
mod context;
mod error;
mod index;
pub mod loader;
pub mod normalizer;
mod search;
pub mod segmenter;
mod store;

pub use commit::{commit_intent, commits_in_output, ExtractedCommit};
pub use context::message_with_context;
pub use error::ScrollbackError;
pub use index::{IndexSummary, SearchIndex};
pub use loader::{LocalSessionLoader, SessionLoader};
pub use normalizer::{normalize_record, normalize_session, NormalizedRecord, ToolResultEvent};
pub use search::validate_query;
pub use segmenter::segment;
pub use store::{escape_fts5_query, SearchMode, Store};

/// Result type for Scrollback operations.
pub type Result<T> = std::result::Result<T, ScrollbackError>;
