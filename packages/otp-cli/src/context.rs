use std::sync::Arc;

use anyhow::{Context as _, Result};
use maherkar_client::MaherkarAuthClient;
use otp_flow::FileStore;

use crate::config::Config;

pub type Store = Arc<FileStore>;
pub type Api = Arc<MaherkarAuthClient>;

/// Shared handles for every subcommand.
pub struct Context {
    pub config: Config,
    pub store: Store,
    pub api: Api,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let api = MaherkarAuthClient::new(config.client_options())
            .context("Failed to build HTTP client")?;
        let store = FileStore::new(&config.store_path);
        tracing::debug!(path = %config.store_path.display(), "using otp store");
        Ok(Self {
            store: Arc::new(store),
            api: Arc::new(api),
            config,
        })
    }
}
