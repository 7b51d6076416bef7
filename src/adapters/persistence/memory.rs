//! In-memory Stores - Process-local Port Implementations
//!
//! Backs all three exposure ports with `parking_lot` locks. Used by
//! tests and by embedders that keep their own durable copy.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::bet::{Bet, BetStatus, PendingBet};
use crate::domain::exposure::{BlockedNumber, BucketKey, LimitConfig, resolve_effective_limit};
use crate::domain::modality::Modality;
use crate::ports::bet_store::BetReadStore;
use crate::ports::blocked_store::BlockedNumberStore;
use crate::ports::limit_store::LimitStore;

/// Limit configs held in a vector, one per scope.
#[derive(Debug, Default)]
pub struct InMemoryLimitStore {
    configs: RwLock<Vec<LimitConfig>>,
}

impl InMemoryLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the config with the same scope.
    pub fn insert(&self, config: LimitConfig) {
        let mut configs = self.configs.write();
        match configs.iter_mut().find(|c| c.scope() == config.scope()) {
            Some(existing) => *existing = config,
            None => configs.push(config),
        }
    }

    pub fn all(&self) -> Vec<LimitConfig> {
        self.configs.read().clone()
    }
}

#[async_trait]
impl LimitStore for InMemoryLimitStore {
    async fn find_effective_limit(
        &self,
        modality: Modality,
        prize_tier: u8,
        lottery: &str,
        draw_time: &str,
    ) -> Result<Option<LimitConfig>> {
        let configs = self.configs.read();
        Ok(resolve_effective_limit(configs.iter(), modality, prize_tier, lottery, draw_time).cloned())
    }

    async fn upsert_limit(&self, config: LimitConfig) -> Result<LimitConfig> {
        self.insert(config.clone());
        Ok(config)
    }
}

/// Bet rows kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryBetStore {
    bets: RwLock<Vec<Bet>>,
    /// Artificial delay per read, to widen race windows in tests.
    latency: Option<Duration>,
}

impl InMemoryBetStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, bet: Bet) {
        self.bets.write().push(bet);
    }

    /// Move a bet out of (or back into) the pending set.
    pub fn set_status(&self, id: Uuid, status: BetStatus) -> bool {
        self.bets
            .write()
            .iter_mut()
            .find(|b| b.id == id)
            .map(|b| b.status = status)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.bets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.read().is_empty()
    }
}

#[async_trait]
impl BetReadStore for InMemoryBetStore {
    async fn find_pending_bets(
        &self,
        modality: Modality,
        lottery: Option<&str>,
        draw_time: Option<&str>,
    ) -> Result<Vec<PendingBet>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self
            .bets
            .read()
            .iter()
            .filter(|b| b.is_pending() && b.modality == modality && b.in_scope(lottery, draw_time))
            .map(Bet::to_pending)
            .collect())
    }
}

/// Block records keyed by bucket.
#[derive(Debug, Default)]
pub struct InMemoryBlockedStore {
    blocked: RwLock<HashMap<BucketKey, BlockedNumber>>,
}

impl InMemoryBlockedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrative unblock.
    pub fn clear(&self, key: &BucketKey) -> Option<BlockedNumber> {
        self.blocked.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.blocked.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.read().is_empty()
    }
}

#[async_trait]
impl BlockedNumberStore for InMemoryBlockedStore {
    async fn find(&self, key: &BucketKey) -> Result<Option<BlockedNumber>> {
        Ok(self.blocked.read().get(key).cloned())
    }

    async fn upsert(
        &self,
        key: &BucketKey,
        value_at_block: Decimal,
        limit_at_block: Decimal,
    ) -> Result<BlockedNumber> {
        Ok(self
            .blocked
            .write()
            .entry(key.clone())
            .or_insert_with(|| BlockedNumber::new(key.clone(), value_at_block, limit_at_block))
            .clone())
    }
}
