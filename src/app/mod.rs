pub mod error;

pub use error::{HysError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::fetcher::http::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::history::HistoryStore;
use crate::seen::SeenStore;
use crate::storage::GroupStore;

/// Wires together the stores and the fetcher around a single state root.
///
/// The layout under the root is fixed: `config.json`, `feeds/<group>.json`,
/// `history/<group>_<date>.json`, and `seen_ids.bin`.
pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub groups: GroupStore,
    pub history: HistoryStore,
    pub seen: SeenStore,
    pub fetcher: Arc<dyn Fetcher>,
}

impl AppContext {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(p) => p,
            None => Self::default_root()?,
        };
        let config = Config::load(&root.join("config.json"));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.max_body_bytes()));
        Self::with_fetcher(root, config, fetcher)
    }

    /// Builds a context with a caller-supplied fetcher. Tests use this to
    /// substitute a scripted implementation for the HTTP client.
    pub fn with_fetcher(root: PathBuf, config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        // Inability to create the state directories is fatal.
        std::fs::create_dir_all(root.join("feeds"))?;
        std::fs::create_dir_all(root.join("history"))?;

        let groups = GroupStore::new(root.join("feeds"));
        let history = HistoryStore::new(root.join("history"));
        let seen = SeenStore::new(root.join("seen_ids.bin"));

        Ok(Self {
            root,
            config,
            groups,
            history,
            seen,
            fetcher,
        })
    }

    fn default_root() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| HysError::Config("could not find home directory".into()))?;
        Ok(home.join(".hys"))
    }
}
