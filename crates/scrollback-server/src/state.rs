//! Shared application state.

use crate::config::Config;
use scrollback_core::{LocalSessionLoader, SearchIndex, SessionLoader};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub index: Arc<SearchIndex>,
    pub loader: Arc<dyn SessionLoader>,
    pub config: Config,
}

impl AppState {
    /// Open the on-disk index and a loader over the configured projects
    /// directory.
    pub fn new(config: Config) -> scrollback_core::Result<Self> {
        let index = Arc::new(SearchIndex::open(&config.db_path, config.full_text)?);
        let loader = Arc::new(LocalSessionLoader::with_dir(config.projects_dir.clone()));

        Ok(Self::from_parts(index, loader, config))
    }

    pub fn from_parts(
        index: Arc<SearchIndex>,
        loader: Arc<dyn SessionLoader>,
        config: Config,
    ) -> Self {
        Self {
            index,
            loader,
            config,
        }
    }
}
