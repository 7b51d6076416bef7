//! Limit Store Port - Exposure Ceiling Configuration
//!
//! Read-mostly store of `LimitConfig` rows. Administrators write them;
//! the exposure ledger only resolves the effective ceiling per bucket.

use async_trait::async_trait;

use crate::domain::exposure::LimitConfig;
use crate::domain::modality::Modality;

/// Trait for limit configuration providers.
#[async_trait]
pub trait LimitStore: Send + Sync + 'static {
  /// Resolve the effective limit for a concrete draw.
  ///
  /// Among active configs for `modality`/`prize_tier`, the most specific
  /// scope wins: exact lottery and draw time, then lottery only, then
  /// the wildcard. `None` when nothing applies.
  async fn find_effective_limit(
    &self,
    modality: Modality,
    prize_tier: u8,
    lottery: &str,
    draw_time: &str,
  ) -> anyhow::Result<Option<LimitConfig>>;

  /// Create or replace the config with the same scope (administrative).
  async fn upsert_limit(&self, config: LimitConfig) -> anyhow::Result<LimitConfig>;
}
