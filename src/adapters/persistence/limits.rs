//! Limit File Store - Atomic JSON Limit Snapshot
//!
//! Keeps the limit table in memory and persists it to `limits.json`
//! with atomic writes (write to tmp file, then rename), so the file is
//! always either the old or the new table.
//!
//! The gate treats `[[limits]]` in config.toml as the source of truth:
//! [`LimitFileStore::sync_configured`] upserts them and deactivates any
//! stored scope the config no longer names.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::exposure::{LimitConfig, resolve_effective_limit};
use crate::domain::modality::Modality;
use crate::ports::limit_store::LimitStore;

/// File-backed limit table.
pub struct LimitFileStore {
    path: PathBuf,
    tmp_path: PathBuf,
    configs: RwLock<Vec<LimitConfig>>,
}

impl LimitFileStore {
    /// Open `limits.json` under `data_dir`, starting empty if absent.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        let path = dir.join("limits.json");

        let configs = if fs::try_exists(&path).await.unwrap_or(false) {
            let json = fs::read_to_string(&path)
                .await
                .context("Failed to read limits file")?;
            serde_json::from_str(&json).context("Failed to parse limits JSON")?
        } else {
            Vec::new()
        };

        info!(path = %path.display(), limits = configs.len(), "Limit table loaded");

        Ok(Self {
            tmp_path: dir.join("limits.json.tmp"),
            path,
            configs: RwLock::new(configs),
        })
    }

    pub async fn all(&self) -> Vec<LimitConfig> {
        self.configs.read().await.clone()
    }

    /// Make the table match `configured`. Scopes missing from it stay on
    /// file but inactive. Returns how many were deactivated.
    #[instrument(skip_all, fields(configured = configured.len()))]
    pub async fn sync_configured(&self, configured: &[LimitConfig]) -> Result<usize> {
        let mut configs = self.configs.write().await;
        let mut next = configs.clone();

        let mut deactivated = 0;
        for stale in next
            .iter_mut()
            .filter(|c| c.active && !configured.iter().any(|k| k.scope() == c.scope()))
        {
            warn!(
                modality = %stale.modality,
                tier = stale.prize_tier,
                lottery = %stale.lottery,
                draw_time = %stale.draw_time,
                "Limit removed from config, deactivating"
            );
            stale.active = false;
            deactivated += 1;
        }
        for config in configured {
            match next.iter_mut().find(|c| c.scope() == config.scope()) {
                Some(existing) => *existing = config.clone(),
                None => next.push(config.clone()),
            }
        }

        self.persist(&next).await?;
        *configs = next;
        info!(deactivated, "Limit table synced with config");
        Ok(deactivated)
    }

    async fn persist(&self, configs: &[LimitConfig]) -> Result<()> {
        let json = serde_json::to_string_pretty(configs).context("Failed to serialize limits")?;
        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp limits file")?;
        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename limits file")?;
        Ok(())
    }
}

#[async_trait]
impl LimitStore for LimitFileStore {
    async fn find_effective_limit(
        &self,
        modality: Modality,
        prize_tier: u8,
        lottery: &str,
        draw_time: &str,
    ) -> Result<Option<LimitConfig>> {
        let configs = self.configs.read().await;
        Ok(resolve_effective_limit(configs.iter(), modality, prize_tier, lottery, draw_time).cloned())
    }

    #[instrument(skip(self, config), fields(modality = %config.modality, tier = config.prize_tier))]
    async fn upsert_limit(&self, config: LimitConfig) -> Result<LimitConfig> {
        let mut configs = self.configs.write().await;
        let mut next = configs.clone();
        match next.iter_mut().find(|c| c.scope() == config.scope()) {
            Some(existing) => *existing = config.clone(),
            None => next.push(config.clone()),
        }
        // Memory only changes once the file does.
        self.persist(&next).await?;
        *configs = next;
        info!(limit = %config.limit, lottery = %config.lottery, draw_time = %config.draw_time, "Limit upserted");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scratch_dir() -> String {
        std::env::temp_dir()
            .join(format!("bicho-limits-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_upsert_survives_reopen() {
        let dir = scratch_dir();
        let store = LimitFileStore::open(&dir).await.unwrap();
        store
            .upsert_limit(LimitConfig {
                modality: Modality::Milhar,
                prize_tier: 1,
                lottery: "LOOK".to_string(),
                draw_time: "11:20".to_string(),
                limit: dec!(1000.00),
                active: true,
            })
            .await
            .unwrap();

        let reopened = LimitFileStore::open(&dir).await.unwrap();
        let found = reopened
            .find_effective_limit(Modality::Milhar, 1, "LOOK", "11:20")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.limit, dec!(1000.00));
        assert!(reopened
            .find_effective_limit(Modality::Milhar, 1, "LOOK", "14:20")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sync_deactivates_scopes_dropped_from_config() {
        let store = LimitFileStore::open(&scratch_dir()).await.unwrap();
        let milhar = LimitConfig {
            modality: Modality::Milhar,
            prize_tier: 1,
            lottery: String::new(),
            draw_time: String::new(),
            limit: dec!(1000),
            active: true,
        };
        let dezena = LimitConfig {
            modality: Modality::Dezena,
            prize_tier: 1,
            limit: dec!(5000),
            ..milhar.clone()
        };
        assert_eq!(store.sync_configured(&[milhar.clone(), dezena]).await.unwrap(), 0);

        let raised = LimitConfig {
            limit: dec!(1500),
            ..milhar
        };
        assert_eq!(store.sync_configured(&[raised]).await.unwrap(), 1);

        let found = store
            .find_effective_limit(Modality::Milhar, 1, "LOOK", "11:20")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.limit, dec!(1500));
        assert!(store
            .find_effective_limit(Modality::Dezena, 1, "LOOK", "11:20")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.all().await.len(), 2);
    }
}
