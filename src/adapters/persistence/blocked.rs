//! Block Log - JSONL Block Records
//!
//! `blocked.jsonl` records block and clear events in order. On open the
//! log is replayed into an in-memory index; `upsert` holds the index lock
//! across the append so a bucket is written at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::domain::exposure::{BlockedNumber, BucketKey};
use crate::ports::blocked_store::BlockedNumberStore;

/// One line of the block log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BlockEvent {
    Blocked(BlockedNumber),
    Cleared {
        key: BucketKey,
        cleared_at: DateTime<Utc>,
    },
}

/// JSONL-backed block record store.
pub struct BlockedLog {
    path: PathBuf,
    index: Mutex<HashMap<BucketKey, BlockedNumber>>,
}

impl BlockedLog {
    /// Open `blocked.jsonl` under `data_dir` and replay it.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        let path = dir.join("blocked.jsonl");

        let mut index = HashMap::new();
        if fs::try_exists(&path).await.unwrap_or(false) {
            let content = fs::read_to_string(&path)
                .await
                .context("Failed to read block log")?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<BlockEvent>(line) {
                    Ok(BlockEvent::Blocked(block)) => {
                        index.entry(block.key.clone()).or_insert(block);
                    }
                    Ok(BlockEvent::Cleared { key, .. }) => {
                        index.remove(&key);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed block record"),
                }
            }
        }

        info!(path = %path.display(), blocked = index.len(), "Block log replayed");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    /// Administrative unblock; records a clear event.
    #[instrument(skip(self), fields(bucket = %key))]
    pub async fn clear(&self, key: &BucketKey) -> Result<Option<BlockedNumber>> {
        let mut index = self.index.lock().await;
        if !index.contains_key(key) {
            return Ok(None);
        }
        self.append(&BlockEvent::Cleared {
            key: key.clone(),
            cleared_at: Utc::now(),
        })
        .await?;
        info!("Bucket unblocked");
        Ok(index.remove(key))
    }

    pub async fn blocked(&self) -> Vec<BlockedNumber> {
        self.index.lock().await.values().cloned().collect()
    }

    async fn append(&self, event: &BlockEvent) -> Result<()> {
        let mut json = serde_json::to_string(event).context("Failed to serialize block event")?;
        json.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open block log")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write block log")?;
        file.flush().await.context("Failed to flush block log")?;
        Ok(())
    }
}

#[async_trait]
impl BlockedNumberStore for BlockedLog {
    async fn find(&self, key: &BucketKey) -> Result<Option<BlockedNumber>> {
        Ok(self.index.lock().await.get(key).cloned())
    }

    async fn upsert(
        &self,
        key: &BucketKey,
        value_at_block: Decimal,
        limit_at_block: Decimal,
    ) -> Result<BlockedNumber> {
        let mut index = self.index.lock().await;
        if let Some(existing) = index.get(key) {
            return Ok(existing.clone());
        }
        let block = BlockedNumber::new(key.clone(), value_at_block, limit_at_block);
        self.append(&BlockEvent::Blocked(block.clone())).await?;
        index.insert(key.clone(), block.clone());
        Ok(block)
    }
}
