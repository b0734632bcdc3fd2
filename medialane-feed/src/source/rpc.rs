use std::{
    collections::HashMap,
    io::{Error, ErrorKind, Result},
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use hyper::client::HttpConnector;
use lru::LruCache;

use crate::{
    activity::{sort_feed, Activity},
    api::{client::Client, BlockId, EmittedEvent, EventFilter},
    config::Config,
    decode::Decoder,
};

use super::{Cursor, EventSource, Page, Scope};

/// Tuning knobs of [`RpcSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcSourceOptions {
    /// Oldest block the feed reaches back to, e.g. the deployment block.
    pub start_block: u64,
    /// Number of blocks read per window.
    pub block_window: u64,
    /// `chunk_size` of each `starknet_getEvents` call.
    pub events_chunk_size: u64,
    /// Windows scanned per fetch before returning a short page.
    pub max_windows_per_fetch: usize,
    pub timestamp_cache_size: usize,
}

impl Default for RpcSourceOptions {
    fn default() -> Self {
        Self {
            start_block: 0,
            block_window: 1_000,
            events_chunk_size: 100,
            max_windows_per_fetch: 50,
            timestamp_cache_size: 1_024,
        }
    }
}

/// Reads Medialane activity straight from a Starknet node.
///
/// Blocks are scanned newest first in windows of `block_window` blocks. Each
/// window is decoded and sorted in feed order; the cursor records the window's
/// upper block and how many of its activities were already handed out, so
/// re-reading a window never duplicates or skips entries.
pub struct RpcSource {
    client: Client<HttpConnector>,
    decoder: Decoder,
    /// Emitting contracts: collections and the marketplace.
    contracts: Vec<String>,
    options: RpcSourceOptions,
    timestamps: Mutex<LruCache<u64, u64>>,
}

impl RpcSource {
    pub fn new(
        client: Client<HttpConnector>,
        decoder: Decoder,
        contracts: Vec<String>,
        options: RpcSourceOptions,
    ) -> Result<Self> {
        if contracts.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "rpc source needs at least one contract",
            ));
        }
        if options.block_window == 0 || options.events_chunk_size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "block window and events chunk size must be > 0",
            ));
        }
        let cache_size = NonZeroUsize::new(options.timestamp_cache_size).ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, "timestamp cache size must be > 0")
        })?;
        Ok(Self {
            client,
            decoder,
            contracts,
            options,
            timestamps: Mutex::new(LruCache::new(cache_size)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::from_endpoint(&config.rpc_endpoint)?;
        Self::new(
            client,
            config.decoder()?,
            config.contracts(),
            config.rpc_source_options(),
        )
    }

    pub fn client(&self) -> &Client<HttpConnector> {
        &self.client
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Returns the timestamp of a block, cached by block number.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let cached = self.lock_timestamps().get(&block_number).copied();
        if let Some(timestamp) = cached {
            return Ok(timestamp);
        }
        let header = self.client.get_block_header(block_number).await?;
        self.lock_timestamps().put(block_number, header.timestamp);
        Ok(header.timestamp)
    }

    fn lock_timestamps(&self) -> std::sync::MutexGuard<'_, LruCache<u64, u64>> {
        self.timestamps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches every event of the configured contracts in `[lower, upper]`.
    async fn window_events(&self, lower: u64, upper: u64) -> Result<Vec<EmittedEvent>> {
        let mut events = Vec::new();
        for contract in &self.contracts {
            let mut continuation_token = None;
            loop {
                let filter = EventFilter {
                    from_block: BlockId::number(lower),
                    to_block: BlockId::number(upper),
                    address: Some(contract.clone()),
                    keys: None,
                    chunk_size: self.options.events_chunk_size,
                    continuation_token: continuation_token.take(),
                };
                let chunk = self.client.get_events(&filter).await?;
                log::debug!(
                    "window [{}, {}] contract {}: {} events",
                    lower,
                    upper,
                    contract,
                    chunk.events.len()
                );
                events.extend(chunk.events);
                match chunk.continuation_token {
                    Some(token) => continuation_token = Some(token),
                    None => break,
                }
            }
        }
        Ok(events)
    }

    /// Decodes a window into scoped activities in feed order.
    async fn window_activities(&self, scope: &Scope, lower: u64, upper: u64) -> Result<Vec<Activity>> {
        let events = self.window_events(lower, upper).await?;

        let mut per_tx: HashMap<String, usize> = HashMap::new();
        let mut activities = Vec::new();
        for event in &events {
            let counter = per_tx.entry(event.transaction_hash.clone()).or_insert(0);
            let index = *counter;
            *counter += 1;

            let block_number = match event.block_number {
                Some(n) => n,
                None => continue,
            };
            let timestamp = self.block_timestamp(block_number).await?;
            match self.decoder.decode(event, index, timestamp) {
                Ok(Some(activity)) if scope.matches(&activity) => activities.push(activity),
                Ok(_) => {}
                Err(e) => log::debug!(
                    "skipping event {} of tx {}: {}",
                    index,
                    event.transaction_hash,
                    e
                ),
            }
        }
        sort_feed(&mut activities);
        Ok(activities)
    }
}

#[async_trait]
impl EventSource for RpcSource {
    async fn fetch(
        &self,
        scope: &Scope,
        page_size: usize,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        if page_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "page size must be > 0"));
        }
        let start_block = self.options.start_block;
        let (mut upper, mut offset) = match cursor {
            Some(cursor) => parse_cursor(cursor)?,
            None => (self.client.block_number().await?, 0),
        };

        let mut activities = Vec::with_capacity(page_size);
        let mut windows = 0;
        while upper >= start_block {
            let lower = window_lower(upper, self.options.block_window, start_block);
            let mut window = self.window_activities(scope, lower, upper).await?;
            windows += 1;

            let available = window.len();
            if offset < available {
                let take = (page_size - activities.len()).min(available - offset);
                activities.extend(window.drain(offset..offset + take));
                offset += take;
            }

            let older = (lower > start_block).then(|| lower - 1);
            if activities.len() == page_size {
                let next_cursor = if offset < available {
                    Some(format_cursor(upper, offset))
                } else {
                    older.map(|block| format_cursor(block, 0))
                };
                return Ok(Page {
                    activities,
                    next_cursor,
                });
            }

            match older {
                Some(block) if windows >= self.options.max_windows_per_fetch => {
                    log::debug!(
                        "window budget spent with {} of {} activities",
                        activities.len(),
                        page_size
                    );
                    return Ok(Page {
                        activities,
                        next_cursor: Some(format_cursor(block, 0)),
                    });
                }
                Some(block) => {
                    upper = block;
                    offset = 0;
                }
                None => break,
            }
        }

        Ok(Page {
            activities,
            next_cursor: None,
        })
    }
}

fn window_lower(upper: u64, block_window: u64, start_block: u64) -> u64 {
    upper
        .saturating_sub(block_window.saturating_sub(1))
        .max(start_block)
}

fn format_cursor(upper: u64, offset: usize) -> Cursor {
    Cursor::new(format!("{}:{}", upper, offset))
}

fn parse_cursor(cursor: &Cursor) -> Result<(u64, usize)> {
    let invalid = || {
        Error::new(
            ErrorKind::InvalidInput,
            format!("invalid cursor: {:?}", cursor.as_str()),
        )
    };
    let (upper, offset) = cursor.as_str().split_once(':').ok_or_else(invalid)?;
    Ok((
        upper.parse().map_err(|_| invalid())?,
        offset.parse().map_err(|_| invalid())?,
    ))
}
