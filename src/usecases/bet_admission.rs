//! Bet Admission - Ticket-level Exposure Gate
//!
//! Turns a ticket (one modality, one or more picks, a tier range, a
//! stake and a division) into ledger checks:
//! 1. Split the stake across picks
//! 2. Validate every pick into stake units before touching the ledger
//! 3. Check each (tier, pick) bucket with the pick's stake
//! 4. Any block → release what the ticket already reserved, reject
//!
//! A ticket is admitted whole or not at all.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::bet::{Bet, DivisionType, DrawIdentity};
use crate::domain::error::EngineResult;
use crate::domain::modality::Modality;
use crate::domain::units::{StakeSplit, UnitCalculator, UnitResult};
use crate::ports::bet_store::BetReadStore;
use crate::ports::blocked_store::BlockedNumberStore;
use crate::ports::limit_store::LimitStore;
use crate::usecases::exposure_ledger::{ExposureDecision, ExposureLedger, ExposureQuery, Reservation};

/// A bettor's ticket as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
  pub modality: Modality,
  pub picks: Vec<String>,
  pub position_from: u8,
  pub position_to: u8,
  #[serde(default)]
  pub division: DivisionType,
  /// Total stake (`all`) or stake per pick (`each`).
  pub stake: Decimal,
  #[serde(default)]
  pub draw: DrawIdentity,
}

/// An admitted ticket, holding reservations until persisted.
///
/// Reservations lapse after the ledger's `reservation_ttl`, so the bets
/// must be persisted and committed within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedTicket {
  pub units: Vec<UnitResult>,
  /// Id each pick's bet is stored under, parallel to `units`.
  pub bet_ids: Vec<Uuid>,
  pub split: StakeSplit,
  pub reservations: Vec<Reservation>,
}

impl AdmittedTicket {
  /// One pending bet row per pick, ready for the bet store.
  pub fn bets(&self, ticket: &Ticket) -> Vec<Bet> {
    self
      .units
      .iter()
      .zip(&self.bet_ids)
      .map(|(unit, bet_id)| {
        Bet::pending(
          unit.modality,
          unit.number.clone(),
          unit.range,
          ticket.division,
          self.split.per_pick,
          ticket.draw.clone(),
        )
        .with_id(*bet_id)
      })
      .collect()
  }
}

/// Result of admitting one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AdmissionOutcome {
  Accepted(AdmittedTicket),
  Rejected {
    reason: String,
    /// The check that blocked the ticket.
    decision: Box<ExposureDecision>,
  },
}

impl AdmissionOutcome {
  pub fn is_accepted(&self) -> bool {
    matches!(self, Self::Accepted(_))
  }
}

/// Ticket gate over an exposure ledger.
pub struct BetAdmission<L: LimitStore, B: BetReadStore, N: BlockedNumberStore> {
  ledger: Arc<ExposureLedger<L, B, N>>,
  calculator: UnitCalculator,
}

impl<L: LimitStore, B: BetReadStore, N: BlockedNumberStore> BetAdmission<L, B, N> {
  pub fn new(ledger: Arc<ExposureLedger<L, B, N>>) -> Self {
    Self {
      ledger,
      calculator: UnitCalculator::new(),
    }
  }

  pub fn ledger(&self) -> &Arc<ExposureLedger<L, B, N>> {
    &self.ledger
  }

  /// Admit or reject a whole ticket.
  ///
  /// # Errors
  /// Input errors from unit calculation (nothing reserved yet), or an
  /// `Infrastructure` error from the ledger after releasing whatever the
  /// ticket had reserved.
  #[instrument(skip(self, ticket), fields(modality = %ticket.modality, picks = ticket.picks.len()))]
  pub async fn admit(&self, ticket: &Ticket) -> EngineResult<AdmissionOutcome> {
    let split = self
      .calculator
      .split_stake(ticket.stake, ticket.picks.len(), ticket.division)?;

    let units = ticket
      .picks
      .iter()
      .map(|pick| {
        self.calculator.compute_units(
          ticket.modality,
          pick,
          ticket.position_from,
          ticket.position_to,
          split.per_pick,
        )
      })
      .collect::<EngineResult<Vec<_>>>()?;

    let bet_ids: Vec<Uuid> = units.iter().map(|_| Uuid::new_v4()).collect();
    let mut reservations = Vec::new();
    for (unit, bet_id) in units.iter().zip(&bet_ids) {
      for tier in unit.range.tiers() {
        let query = ExposureQuery::new(
          ticket.modality,
          tier,
          unit.number.clone(),
          ticket.draw.clone(),
          split.per_pick,
        )
        .with_bet_id(*bet_id);
        match self.ledger.check_and_maybe_block(&query).await {
          Ok(decision) if decision.blocked => {
            self.release_all(&reservations).await;
            let reason = decision
              .reason
              .clone()
              .unwrap_or_else(|| format!("{} is blocked", decision.key));
            warn!(bucket = %decision.key, "Ticket rejected");
            return Ok(AdmissionOutcome::Rejected {
              reason,
              decision: Box::new(decision),
            });
          }
          Ok(decision) => reservations.extend(decision.reservation),
          Err(e) => {
            self.release_all(&reservations).await;
            return Err(e);
          }
        }
      }
    }

    info!(
      per_pick = %split.per_pick,
      house_remainder = %split.house_remainder,
      reservations = reservations.len(),
      "Ticket admitted"
    );
    Ok(AdmissionOutcome::Accepted(AdmittedTicket {
      units,
      bet_ids,
      split,
      reservations,
    }))
  }

  /// The ticket's bets are persisted; hand exposure over to the bet store.
  pub async fn commit(&self, admitted: &AdmittedTicket) {
    for reservation in &admitted.reservations {
      self.ledger.commit(reservation).await;
    }
  }

  /// The ticket will not be placed after all.
  pub async fn release(&self, admitted: &AdmittedTicket) {
    self.release_all(&admitted.reservations).await;
  }

  async fn release_all(&self, reservations: &[Reservation]) {
    for reservation in reservations {
      self.ledger.release(reservation).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::adapters::persistence::memory::{InMemoryBetStore, InMemoryBlockedStore, InMemoryLimitStore};
  use crate::domain::error::EngineError;
  use crate::domain::exposure::{BucketKey, LimitConfig};
  use crate::domain::positions::PositionRange;
  use crate::usecases::exposure_ledger::LedgerSettings;
  use rust_decimal_macros::dec;

  type TestAdmission = BetAdmission<InMemoryLimitStore, InMemoryBetStore, InMemoryBlockedStore>;

  fn draw() -> DrawIdentity {
    DrawIdentity::new("LOOK", "11:20")
  }

  fn admission(limit: Decimal) -> (TestAdmission, Arc<InMemoryBetStore>) {
    let limits = Arc::new(InMemoryLimitStore::new());
    limits.insert(LimitConfig {
      modality: Modality::Dezena,
      prize_tier: 1,
      lottery: String::new(),
      draw_time: String::new(),
      limit,
      active: true,
    });
    let bets = Arc::new(InMemoryBetStore::new());
    let ledger = ExposureLedger::new(
      limits,
      Arc::clone(&bets),
      Arc::new(InMemoryBlockedStore::new()),
      LedgerSettings::default(),
    );
    (BetAdmission::new(Arc::new(ledger)), bets)
  }

  fn ticket(picks: &[&str], stake: Decimal) -> Ticket {
    Ticket {
      modality: Modality::Dezena,
      picks: picks.iter().map(|p| (*p).to_string()).collect(),
      position_from: 1,
      position_to: 1,
      division: DivisionType::All,
      stake,
      draw: draw(),
    }
  }

  fn key(number: &str) -> BucketKey {
    BucketKey::new(Modality::Dezena, 1, number, &draw())
  }

  #[tokio::test]
  async fn test_accepted_ticket_splits_stake_and_reserves_each_pick() {
    let (admission, _) = admission(dec!(100));
    let outcome = admission.admit(&ticket(&["21", "42", "07"], dec!(10.00))).await.unwrap();
    let AdmissionOutcome::Accepted(admitted) = outcome else {
      panic!("expected acceptance");
    };
    assert_eq!(admitted.split.per_pick, dec!(3.33));
    assert_eq!(admitted.split.house_remainder, dec!(0.01));
    assert_eq!(admitted.reservations.len(), 3);
    assert_eq!(admission.ledger().in_flight_exposure(&key("42")).await, dec!(3.33));
  }

  #[tokio::test]
  async fn test_block_on_later_pick_releases_earlier_reservations() {
    let (admission, bets) = admission(dec!(6));
    bets.insert(Bet::pending(
      Modality::Dezena,
      "42",
      PositionRange::new(Modality::Dezena, 1, 1).unwrap(),
      DivisionType::Each,
      dec!(3),
      draw(),
    ));

    let outcome = admission.admit(&ticket(&["21", "42"], dec!(10))).await.unwrap();
    match outcome {
      AdmissionOutcome::Rejected { reason, decision } => {
        assert_eq!(decision.key, key("42"));
        assert!(reason.contains("dezena 42"));
      }
      AdmissionOutcome::Accepted(_) => panic!("expected rejection"),
    }
    assert_eq!(admission.ledger().in_flight_exposure(&key("21")).await, Decimal::ZERO);
    assert_eq!(admission.ledger().tracked_buckets(), 0);
  }

  #[tokio::test]
  async fn test_invalid_pick_rejects_before_any_check() {
    let (admission, _) = admission(dec!(100));
    let err = admission.admit(&ticket(&["21", "4x"], dec!(10))).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidNumber { .. }));
    assert_eq!(admission.ledger().tracked_buckets(), 0);
  }

  #[tokio::test]
  async fn test_commit_after_persisting_keeps_exposure_counted() {
    let (admission, bets) = admission(dec!(10));
    let request = ticket(&["21"], dec!(6));
    let AdmissionOutcome::Accepted(admitted) = admission.admit(&request).await.unwrap() else {
      panic!("expected acceptance");
    };
    for bet in admitted.bets(&request) {
      bets.insert(bet);
    }
    admission.commit(&admitted).await;
    assert_eq!(admission.ledger().tracked_buckets(), 0);

    let second = admission.admit(&ticket(&["21"], dec!(6))).await.unwrap();
    assert!(!second.is_accepted());
  }

  #[tokio::test]
  async fn test_bets_written_before_commit_are_not_double_counted() {
    let (admission, bets) = admission(dec!(10));
    let request = ticket(&["21"], dec!(6));
    let AdmissionOutcome::Accepted(admitted) = admission.admit(&request).await.unwrap() else {
      panic!("expected acceptance");
    };
    let rows = admitted.bets(&request);
    assert_eq!(rows[0].id, admitted.reservations[0].bet_id);
    for bet in rows {
      bets.insert(bet);
    }

    // 6 written and still reserved, plus 4, is exactly the limit.
    let concurrent = admission.admit(&ticket(&["21"], dec!(4))).await.unwrap();
    assert!(concurrent.is_accepted());
  }
}
