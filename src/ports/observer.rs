//! Ledger Observer Port - Exposure Telemetry Hooks
//!
//! Lets adapters (Prometheus) see ledger decisions without the use-case
//! layer depending on a metrics crate.

use std::time::Duration;

use uuid::Uuid;

use crate::domain::exposure::BucketKey;

/// Outcome label of one exposure check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
  /// Accepted under a configured limit.
  Accepted,
  /// Accepted because no limit applies (open policy).
  Unlimited,
  /// Bucket was already blocked (fast path).
  AlreadyBlocked,
  /// This check created the block.
  NewlyBlocked,
  /// No limit applies and the policy is closed.
  RejectedUnconfigured,
  /// Storage failed or timed out.
  Failed,
}

impl CheckOutcome {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Accepted => "accepted",
      Self::Unlimited => "unlimited",
      Self::AlreadyBlocked => "already_blocked",
      Self::NewlyBlocked => "newly_blocked",
      Self::RejectedUnconfigured => "rejected_unconfigured",
      Self::Failed => "failed",
    }
  }
}

/// Receives ledger telemetry. All hooks default to no-ops.
pub trait LedgerObserver: Send + Sync + 'static {
  /// One exposure check finished.
  fn on_check(&self, _key: &BucketKey, _outcome: CheckOutcome, _elapsed: Duration) {}

  /// A reservation was committed or released.
  fn on_settled(&self, _reservation: Uuid) {}

  /// A pending bet's position token covered no tier and was skipped.
  fn on_malformed_positions(&self, _bet_id: Uuid, _token: &str) {}

  /// A store call failed.
  fn on_infrastructure_error(&self, _operation: &'static str) {}
}

/// Observer that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LedgerObserver for NoopObserver {}
