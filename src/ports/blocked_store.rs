//! Blocked Number Port - Materialized Block Decisions
//!
//! Write-once-then-read-many per bucket. `upsert` is create-if-absent so
//! racing first blocks converge on a single record.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::exposure::{BlockedNumber, BucketKey};

/// Trait for block record providers.
#[async_trait]
pub trait BlockedNumberStore: Send + Sync + 'static {
  /// Block record for the exact bucket, if any.
  async fn find(&self, key: &BucketKey) -> anyhow::Result<Option<BlockedNumber>>;

  /// Create the record unless one exists; returns whichever is stored.
  async fn upsert(
    &self,
    key: &BucketKey,
    value_at_block: Decimal,
    limit_at_block: Decimal,
  ) -> anyhow::Result<BlockedNumber>;
}
