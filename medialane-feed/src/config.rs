use std::{
    fs,
    io::{Error, ErrorKind, Result},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    decode::Decoder,
    felt,
    session::SessionOptions,
    source::{rpc::RpcSourceOptions, Scope},
};

pub const RPC_ENDPOINT_ENV: &str = "MEDIALANE_RPC_ENDPOINT";

pub const DEFAULT_GLOBAL_PAGE_SIZE: usize = 20;
pub const DEFAULT_WALLET_PAGE_SIZE: usize = 12;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    pub address: String,
    pub label: String,
}

/// Feed configuration, usually read from a YAML file. Every field has a
/// default so a file only lists what it changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub rpc_endpoint: String,
    pub explorer_url: String,
    pub start_block: u64,
    pub block_window: u64,
    pub events_chunk_size: u64,
    pub max_windows_per_fetch: usize,
    pub timestamp_cache_size: usize,
    pub global_page_size: usize,
    pub wallet_page_size: usize,
    pub search_debounce_ms: u64,
    pub collections: Vec<Collection>,
    pub marketplace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let source = RpcSourceOptions::default();
        Self {
            rpc_endpoint: "http://127.0.0.1:5050/rpc".to_owned(),
            explorer_url: "https://voyager.online".to_owned(),
            start_block: source.start_block,
            block_window: source.block_window,
            events_chunk_size: source.events_chunk_size,
            max_windows_per_fetch: source.max_windows_per_fetch,
            timestamp_cache_size: source.timestamp_cache_size,
            global_page_size: DEFAULT_GLOBAL_PAGE_SIZE,
            wallet_page_size: DEFAULT_WALLET_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            collections: Vec::new(),
            marketplace: None,
        }
    }
}

impl Config {
    /// Reads and validates a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("loading config from {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::new(
                e.kind(),
                format!("failed to read config {}: {}", path.display(), e),
            )
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("failed to parse config: {}", e),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides the endpoint from `MEDIALANE_RPC_ENDPOINT` when set.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(RPC_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                log::debug!("rpc endpoint overridden by {}", RPC_ENDPOINT_ENV);
                self.rpc_endpoint = endpoint;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::new(ErrorKind::InvalidInput, msg.to_owned()));
        if self.global_page_size == 0 || self.wallet_page_size == 0 {
            return invalid("page sizes must be > 0");
        }
        if self.block_window == 0 || self.events_chunk_size == 0 {
            return invalid("block_window and events_chunk_size must be > 0");
        }
        if self.max_windows_per_fetch == 0 || self.timestamp_cache_size == 0 {
            return invalid("max_windows_per_fetch and timestamp_cache_size must be > 0");
        }
        for collection in &self.collections {
            felt::normalize(&collection.address)?;
        }
        if let Some(marketplace) = &self.marketplace {
            felt::normalize(marketplace)?;
        }
        Ok(())
    }

    pub fn page_size(&self, scope: &Scope) -> usize {
        match scope {
            Scope::Global => self.global_page_size,
            Scope::Wallet(_) => self.wallet_page_size,
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn session_options(&self, scope: Scope) -> SessionOptions {
        SessionOptions {
            page_size: self.page_size(&scope),
            search_debounce: self.search_debounce(),
            scope,
        }
    }

    /// Contracts whose events make up the feed.
    pub fn contracts(&self) -> Vec<String> {
        self.collections
            .iter()
            .map(|c| c.address.clone())
            .chain(self.marketplace.iter().cloned())
            .collect()
    }

    pub fn decoder(&self) -> Result<Decoder> {
        Decoder::new(
            self.collections
                .iter()
                .map(|c| (c.address.clone(), c.label.clone())),
        )
    }

    pub fn rpc_source_options(&self) -> RpcSourceOptions {
        RpcSourceOptions {
            start_block: self.start_block,
            block_window: self.block_window,
            events_chunk_size: self.events_chunk_size,
            max_windows_per_fetch: self.max_windows_per_fetch,
            timestamp_cache_size: self.timestamp_cache_size,
        }
    }
}
