//! Limit Hot-Reload - Pick Up `[[limits]]` Edits Without Restarting
//!
//! Polls config.toml and publishes the reloaded config on a
//! `tokio::sync::watch` channel, but only when the limit table changed.
//! Every other section is read once at startup; edits to them are
//! logged and otherwise ignored until the next restart.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// What a reload changed relative to the running config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEffect {
    /// Same limits, same everything else.
    Unchanged,
    /// Limits differ; subscribers re-sync the limit store.
    LimitsChanged,
    /// Only sections that need a restart differ.
    RestartRequired,
}

/// Classify `next` against `current`.
pub fn reload_effect(current: &AppConfig, next: &AppConfig) -> ReloadEffect {
    if current.limits != next.limits {
        ReloadEffect::LimitsChanged
    } else if current == next {
        ReloadEffect::Unchanged
    } else {
        ReloadEffect::RestartRequired
    }
}

/// Polls config.toml and forwards limit changes.
pub struct ConfigWatcher {
    config_path: String,
    config_tx: watch::Sender<AppConfig>,
    /// File text last read, valid or not.
    last_seen: Option<String>,
    poll_interval: Duration,
}

impl ConfigWatcher {
    /// Watcher plus the receiver the limit syncer subscribes to.
    pub fn new(config_path: &str, initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (config_tx, config_rx) = watch::channel(initial_config);
        let watcher = Self {
            config_path: config_path.to_string(),
            config_tx,
            last_seen: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        (watcher, config_rx)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[instrument(skip_all, fields(path = %self.config_path))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.last_seen = tokio::fs::read_to_string(&self.config_path).await.ok();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.tick().await;
        info!(interval_ms = self.poll_interval.as_millis(), "Watching limits in config");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => return Ok(()),
                _ = ticker.tick() => self.poll().await,
            }
        }
    }

    async fn poll(&mut self) {
        let text = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Config unreadable, keeping running limits");
                return;
            }
        };
        if self.last_seen.as_deref() == Some(text.as_str()) {
            return;
        }

        let parsed = super::loader::parse_config(&text);
        self.last_seen = Some(text);
        let next = match parsed {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Edited config is invalid, keeping running limits");
                return;
            }
        };

        let effect = reload_effect(&self.config_tx.borrow(), &next);
        match effect {
            ReloadEffect::Unchanged => debug!("Config rewritten without changes"),
            ReloadEffect::RestartRequired => {
                warn!("Config edits outside [[limits]] take effect on restart");
            }
            ReloadEffect::LimitsChanged => {
                info!(limits = next.limits.len(), "Limit table edited, publishing");
                // send_replace keeps the value even with no subscriber left.
                self.config_tx.send_replace(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    const BASE: &str = "[engine]\nname = \"gate\"\n";
    const GRUPO_LIMIT: &str = "\n[[limits]]\nmodality = \"GRUPO\"\nprize_tier = 1\nlimit = \"500\"\n";

    #[test]
    fn test_reload_effect() {
        let base = parse_config(BASE).unwrap();
        let limited = parse_config(&format!("{BASE}{GRUPO_LIMIT}")).unwrap();
        let relogged = parse_config(&BASE.replace("gate", "gate-2")).unwrap();

        assert_eq!(reload_effect(&base, &base), ReloadEffect::Unchanged);
        assert_eq!(reload_effect(&base, &limited), ReloadEffect::LimitsChanged);
        assert_eq!(reload_effect(&base, &relogged), ReloadEffect::RestartRequired);
    }

    #[tokio::test]
    async fn test_only_limit_edits_are_published() {
        let path = std::env::temp_dir().join(format!("bicho-config-{}.toml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, BASE).await.unwrap();
        let path = path.to_string_lossy().into_owned();

        let (watcher, mut rx) = ConfigWatcher::new(&path, parse_config(BASE).unwrap());
        let mut watcher = watcher.with_poll_interval(Duration::from_millis(20));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { watcher.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::fs::write(&path, BASE.replace("gate", "renamed")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!rx.has_changed().unwrap());

        tokio::fs::write(&path, format!("{BASE}{GRUPO_LIMIT}")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow().limits.len(), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
