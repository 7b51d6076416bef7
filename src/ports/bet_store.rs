//! Bet Store Port - Pending Bet Reads
//!
//! The bet-placement workflow owns bet rows; the engine only reads the
//! pending ones when it aggregates a bucket's exposure.

use async_trait::async_trait;

use crate::domain::bet::PendingBet;
use crate::domain::modality::Modality;

/// Read access to pending bets.
#[async_trait]
pub trait BetReadStore: Send + Sync + 'static {
  /// All pending bets of `modality`, narrowed to a lottery and/or draw
  /// time when given.
  async fn find_pending_bets(
    &self,
    modality: Modality,
    lottery: Option<&str>,
    draw_time: Option<&str>,
  ) -> anyhow::Result<Vec<PendingBet>>;
}
