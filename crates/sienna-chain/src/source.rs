//! Polling contract event source.
//!
//! One loop per daemon: poll the provider for new logs past the persisted
//! cursor, decode them, publish on the bus, advance the cursor. Provider
//! failures back off exponentially and keep looping; the request path never
//! depends on this loop being healthy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use sienna_types::WalletAddress;

use crate::bus::EventBus;
use crate::client::{ChainClient, LogFilter};
use crate::{decode, ChainError, Result};

/// Persistence seam for the source's block cursor. The daemon backs this
/// with the settings table; tests back it with memory.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> Result<u64>;
    async fn store(&self, block: u64) -> Result<()>;
}

/// Source tuning, filled in from daemon config.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Contracts whose logs we consume.
    pub contracts: Vec<WalletAddress>,
    pub poll_interval: Duration,
    /// Backoff ceiling after repeated provider failures.
    pub max_backoff: Duration,
    /// First block worth scanning when the cursor has never advanced.
    pub start_block: u64,
}

pub struct ContractEventSource {
    client: Arc<ChainClient>,
    bus: EventBus,
    cursor: Arc<dyn CursorStore>,
    config: SourceConfig,
}

impl ContractEventSource {
    pub fn new(
        client: Arc<ChainClient>,
        bus: EventBus,
        cursor: Arc<dyn CursorStore>,
        config: SourceConfig,
    ) -> Result<Self> {
        if config.contracts.is_empty() {
            return Err(ChainError::InvalidConfig(
                "event source needs at least one contract address".into(),
            ));
        }
        Ok(Self {
            client,
            bus,
            cursor,
            config,
        })
    }

    /// One poll: fetch logs from the block after the cursor through the
    /// current head, publish what decodes, persist the new cursor.
    ///
    /// Returns the number of events published. Malformed logs are skipped
    /// with a warning; a skipped log still advances the cursor, the
    /// projector's idempotency covers any replay of its neighbors.
    pub async fn poll_once(&self) -> Result<usize> {
        let cursor = self.cursor.load().await?;
        let head = self.client.block_number().await?;
        let from = cursor.max(self.config.start_block.saturating_sub(1)) + 1;
        if head < from {
            return Ok(0);
        }

        let filter = LogFilter {
            addresses: self.config.contracts.clone(),
            topic0: decode::event_topic0s(),
            from_block: from,
            to_block: head,
        };
        let logs = self.client.logs(&filter).await?;

        let mut published = 0;
        for log in &logs {
            match decode::decode(log) {
                Ok(Some(event)) => {
                    debug!(event = event.name(), tx_hash = %event.meta.tx_hash,
                           block = event.meta.block_number, "contract event");
                    self.bus.publish(event);
                    published += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tx_hash = %log.tx_hash, block = log.block_number,
                          error = %e, "skipping undecodable log");
                }
            }
        }

        self.cursor.store(head).await?;
        Ok(published)
    }

    /// Replay history from `from_block` through the cursor's current
    /// position. Runs at startup before the live loop; redelivery is safe
    /// downstream.
    pub async fn backfill(&self, from_block: u64) -> Result<usize> {
        let cursor = self.cursor.load().await?;
        if cursor < from_block {
            return Ok(0);
        }
        let filter = LogFilter {
            addresses: self.config.contracts.clone(),
            topic0: decode::event_topic0s(),
            from_block,
            to_block: cursor,
        };
        let logs = self.client.logs(&filter).await?;
        let mut published = 0;
        for log in &logs {
            match decode::decode(log) {
                Ok(Some(event)) => {
                    self.bus.publish(event);
                    published += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tx_hash = %log.tx_hash, error = %e, "skipping undecodable log in backfill");
                }
            }
        }
        info!(from_block, to_block = cursor, published, "backfill complete");
        Ok(published)
    }

    /// Poll until shutdown. Provider errors double the delay up to the
    /// configured ceiling; a successful poll resets it.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut delay = self.config.poll_interval;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("event source stopping");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            match self.poll_once().await {
                Ok(published) => {
                    if published > 0 {
                        debug!(published, "poll published events");
                    }
                    delay = self.config.poll_interval;
                }
                Err(e) => {
                    delay = (delay * 2).min(self.config.max_backoff);
                    warn!(error = %e, retry_in = ?delay, "event poll failed");
                }
            }
        }
    }
}
