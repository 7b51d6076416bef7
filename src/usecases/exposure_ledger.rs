//! Exposure Ledger - Per-bucket Limit Enforcement
//!
//! Decides whether a stake may land on a `(modality, tier, number, draw)`
//! bucket:
//! 1. Already blocked → reject from the stored record, no scan
//! 2. Resolve the effective limit (none → default policy)
//! 3. Sum pending stakes covering the bucket, plus in-flight reservations
//! 4. Over the limit → upsert a block record and reject; else reserve
//!
//! Every decision for a bucket runs under that bucket's async mutex, and
//! accepted stakes stay counted as reservations until the caller commits
//! (bet persisted) or releases (bet abandoned). Concurrent checks on one
//! bucket therefore never accept more than the limit in total.
//!
//! A reservation names the bet id it stands for. While it is held, a
//! pending bet with that id is skipped by the scan, so a bet persisted
//! before its commit is counted once. Reservations nobody settles lapse
//! after `reservation_ttl`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::bet::{DrawIdentity, PendingBet};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::exposure::{BlockedNumber, BucketKey, DefaultPolicy, LimitConfig};
use crate::domain::modality::Modality;
use crate::domain::positions::parse_position_token;
use crate::domain::selection::{Selection, comparable_number};
use crate::ports::bet_store::BetReadStore;
use crate::ports::blocked_store::BlockedNumberStore;
use crate::ports::limit_store::LimitStore;
use crate::ports::observer::{CheckOutcome, LedgerObserver, NoopObserver};

/// Ledger tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
  /// Outcome for buckets without a configured limit.
  pub default_policy: DefaultPolicy,
  /// Upper bound on each store call.
  pub store_timeout: Duration,
  /// How long an unsettled reservation keeps counting.
  pub reservation_ttl: Duration,
}

impl Default for LedgerSettings {
  fn default() -> Self {
    Self {
      default_policy: DefaultPolicy::Open,
      store_timeout: Duration::from_secs(2),
      reservation_ttl: Duration::from_secs(30),
    }
  }
}

/// A candidate stake on one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureQuery {
  pub modality: Modality,
  pub prize_tier: u8,
  pub number: String,
  #[serde(default)]
  pub draw: DrawIdentity,
  pub incoming_stake: Decimal,
  /// Id the bet will be stored under if accepted.
  #[serde(default = "Uuid::new_v4")]
  pub bet_id: Uuid,
}

impl ExposureQuery {
  pub fn new(
    modality: Modality,
    prize_tier: u8,
    number: impl Into<String>,
    draw: DrawIdentity,
    incoming_stake: Decimal,
  ) -> Self {
    Self {
      modality,
      prize_tier,
      number: number.into(),
      draw,
      incoming_stake,
      bet_id: Uuid::new_v4(),
    }
  }

  #[must_use]
  pub fn with_bet_id(mut self, bet_id: Uuid) -> Self {
    self.bet_id = bet_id;
    self
  }

  /// Bucket of this query, after validating the number for the modality.
  ///
  /// # Errors
  /// `InvalidNumber` / `InvalidGroupCount` from [`Selection::parse`].
  pub fn key(&self) -> EngineResult<BucketKey> {
    let selection = Selection::parse(self.modality, &self.number)?;
    Ok(BucketKey::new(self.modality, self.prize_tier, &selection.canonical(), &self.draw))
  }
}

/// Stake accepted on a bucket and still counted as in-flight exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
  pub id: Uuid,
  pub key: BucketKey,
  pub bet_id: Uuid,
  pub stake: Decimal,
}

/// Answer to one exposure check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureDecision {
  pub key: BucketKey,
  pub blocked: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exposure_after: Option<Decimal>,
  /// Present when accepted; commit or release it.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reservation: Option<Reservation>,
  /// Block record backing a blocked answer.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub block: Option<BlockedNumber>,
}

impl ExposureDecision {
  fn from_block(block: BlockedNumber) -> Self {
    Self {
      key: block.key.clone(),
      blocked: true,
      reason: Some(block.reason()),
      limit: Some(block.limit_at_block),
      exposure_after: Some(block.value_at_block),
      reservation: None,
      block: Some(block),
    }
  }

  fn accepted(
    key: BucketKey,
    limit: Option<Decimal>,
    exposure_after: Option<Decimal>,
    reservation: Reservation,
  ) -> Self {
    Self {
      key,
      blocked: false,
      reason: None,
      limit,
      exposure_after,
      reservation: Some(reservation),
      block: None,
    }
  }

  fn unconfigured(key: BucketKey) -> Self {
    let reason = format!(
      "{} {} has no exposure limit configured for prize tier {} ({})",
      key.modality.digit_kind(),
      key.number,
      key.prize_tier,
      key.draw(),
    );
    Self {
      key,
      blocked: true,
      reason: Some(reason),
      limit: None,
      exposure_after: None,
      reservation: None,
      block: None,
    }
  }
}

#[derive(Debug)]
struct InFlight {
  bet_id: Uuid,
  stake: Decimal,
  expires_at: Instant,
}

/// In-flight reservations of one bucket, by reservation id.
#[derive(Debug, Default)]
struct BucketBook {
  in_flight: HashMap<Uuid, InFlight>,
}

impl BucketBook {
  fn total(&self) -> Decimal {
    self.in_flight.values().map(|entry| entry.stake).sum()
  }

  fn is_empty(&self) -> bool {
    self.in_flight.is_empty()
  }

  fn holds_bet(&self, bet_id: Uuid) -> bool {
    self.in_flight.values().any(|entry| entry.bet_id == bet_id)
  }

  fn reserve(&mut self, key: &BucketKey, bet_id: Uuid, stake: Decimal, ttl: Duration) -> Reservation {
    let id = Uuid::new_v4();
    self.in_flight.insert(
      id,
      InFlight {
        bet_id,
        stake,
        expires_at: Instant::now() + ttl,
      },
    );
    Reservation {
      id,
      key: key.clone(),
      bet_id,
      stake,
    }
  }

  /// Drop reservations past their deadline, returning their ids.
  fn expire(&mut self, now: Instant) -> Vec<Uuid> {
    let lapsed: Vec<Uuid> = self
      .in_flight
      .iter()
      .filter(|(_, entry)| entry.expires_at <= now)
      .map(|(id, _)| *id)
      .collect();
    for id in &lapsed {
      self.in_flight.remove(id);
    }
    lapsed
  }
}

/// Exposure ledger over the three stores.
pub struct ExposureLedger<L: LimitStore, B: BetReadStore, N: BlockedNumberStore> {
  limits: Arc<L>,
  bets: Arc<B>,
  blocked: Arc<N>,
  observer: Arc<dyn LedgerObserver>,
  settings: LedgerSettings,
  /// Per-bucket serialization point; idle entries are pruned.
  books: Mutex<HashMap<BucketKey, Arc<AsyncMutex<BucketBook>>>>,
}

impl<L: LimitStore, B: BetReadStore, N: BlockedNumberStore> ExposureLedger<L, B, N> {
  /// Create a new ledger.
  pub fn new(limits: Arc<L>, bets: Arc<B>, blocked: Arc<N>, settings: LedgerSettings) -> Self {
    Self {
      limits,
      bets,
      blocked,
      observer: Arc::new(NoopObserver),
      settings,
      books: Mutex::new(HashMap::new()),
    }
  }

  /// Attach a telemetry observer.
  #[must_use]
  pub fn with_observer(mut self, observer: Arc<dyn LedgerObserver>) -> Self {
    self.observer = observer;
    self
  }

  pub fn settings(&self) -> &LedgerSettings {
    &self.settings
  }

  /// Decide whether `query.incoming_stake` may land on its bucket.
  ///
  /// # Errors
  /// `InvalidStake`, `InvalidPositionRange`, `InvalidNumber` or
  /// `InvalidGroupCount` for malformed queries, before any store call;
  /// `Infrastructure` when a store fails or times out. A failed check
  /// never reports "not blocked".
  #[instrument(skip(self, query), fields(bucket = tracing::field::Empty))]
  pub async fn check_and_maybe_block(&self, query: &ExposureQuery) -> EngineResult<ExposureDecision> {
    if query.incoming_stake <= Decimal::ZERO {
      return Err(EngineError::InvalidStake(query.incoming_stake));
    }
    if !query.modality.tier_range().contains(&query.prize_tier) {
      return Err(EngineError::InvalidPositionRange {
        modality: query.modality,
        from: query.prize_tier,
        to: query.prize_tier,
        max: query.modality.max_tier(),
      });
    }

    let key = query.key()?;
    tracing::Span::current().record("bucket", tracing::field::display(&key));
    let started = Instant::now();

    let book = self.book(&key);
    let result = {
      let mut guard = book.lock().await;
      self.decide(&key, query, &mut guard).await
    };
    drop(book);
    self.prune(&key);

    let outcome = match &result {
      Ok((_, outcome)) => *outcome,
      Err(_) => CheckOutcome::Failed,
    };
    self.observer.on_check(&key, outcome, started.elapsed());
    result.map(|(decision, _)| decision)
  }

  /// The bet behind `reservation` is now visible as pending in the bet
  /// store; stop counting it as in-flight. Returns false if unknown.
  pub async fn commit(&self, reservation: &Reservation) -> bool {
    let removed = self.settle(reservation).await;
    debug!(bucket = %reservation.key, reservation = %reservation.id, removed, "Reservation committed");
    removed
  }

  /// The bet behind `reservation` will not be placed; free its stake.
  pub async fn release(&self, reservation: &Reservation) -> bool {
    let removed = self.settle(reservation).await;
    debug!(bucket = %reservation.key, reservation = %reservation.id, removed, "Reservation released");
    removed
  }

  /// Stake currently reserved on `key` but not yet committed.
  pub async fn in_flight_exposure(&self, key: &BucketKey) -> Decimal {
    let book = self.books.lock().get(key).cloned();
    match book {
      Some(book) => book.lock().await.total(),
      None => Decimal::ZERO,
    }
  }

  /// Buckets with a live lock entry.
  pub fn tracked_buckets(&self) -> usize {
    self.books.lock().len()
  }

  /// Expire lapsed reservations on every bucket and drop idle entries.
  /// Returns how many reservations lapsed.
  pub async fn sweep_lapsed(&self) -> usize {
    let books: Vec<(BucketKey, Arc<AsyncMutex<BucketBook>>)> = self
      .books
      .lock()
      .iter()
      .map(|(key, book)| (key.clone(), Arc::clone(book)))
      .collect();

    let mut lapsed = 0;
    for (key, book) in books {
      lapsed += self.expire_lapsed(&key, &mut *book.lock().await);
      drop(book);
      self.prune(&key);
    }
    lapsed
  }

  fn expire_lapsed(&self, key: &BucketKey, book: &mut BucketBook) -> usize {
    let lapsed = book.expire(Instant::now());
    for id in &lapsed {
      warn!(bucket = %key, reservation = %id, "Reservation lapsed without commit or release");
      self.observer.on_settled(*id);
    }
    lapsed.len()
  }

  async fn decide(
    &self,
    key: &BucketKey,
    query: &ExposureQuery,
    book: &mut BucketBook,
  ) -> EngineResult<(ExposureDecision, CheckOutcome)> {
    let incoming = query.incoming_stake;
    let ttl = self.settings.reservation_ttl;
    self.expire_lapsed(key, book);

    if let Some(block) = self.store_call("find_blocked", self.blocked.find(key)).await? {
      debug!(value_at_block = %block.value_at_block, "Bucket already blocked");
      return Ok((ExposureDecision::from_block(block), CheckOutcome::AlreadyBlocked));
    }

    let limit = self
      .store_call(
        "find_effective_limit",
        self
          .limits
          .find_effective_limit(key.modality, key.prize_tier, &key.lottery, &key.draw_time),
      )
      .await?;

    let Some(LimitConfig { limit, .. }) = limit else {
      return Ok(match self.settings.default_policy {
        DefaultPolicy::Open => {
          let reservation = book.reserve(key, query.bet_id, incoming, ttl);
          (
            ExposureDecision::accepted(key.clone(), None, None, reservation),
            CheckOutcome::Unlimited,
          )
        }
        DefaultPolicy::Closed => {
          warn!("No limit configured and default policy is closed");
          (ExposureDecision::unconfigured(key.clone()), CheckOutcome::RejectedUnconfigured)
        }
      });
    };

    let lottery = Some(key.lottery.as_str()).filter(|l| !l.is_empty());
    let draw_time = Some(key.draw_time.as_str()).filter(|t| !t.is_empty());
    let pending = self
      .store_call(
        "find_pending_bets",
        self.bets.find_pending_bets(key.modality, lottery, draw_time),
      )
      .await?;

    let settled = self.aggregate(key, &pending, book);
    let in_flight = book.total();
    let exposure_after = settled + in_flight + incoming;

    if exposure_after > limit {
      let block = self
        .store_call("upsert_blocked", self.blocked.upsert(key, exposure_after, limit))
        .await?;
      info!(
        settled = %settled,
        in_flight = %in_flight,
        incoming = %incoming,
        limit = %limit,
        "Exposure limit exceeded, bucket blocked"
      );
      return Ok((ExposureDecision::from_block(block), CheckOutcome::NewlyBlocked));
    }

    let reservation = book.reserve(key, query.bet_id, incoming, ttl);
    debug!(exposure_after = %exposure_after, limit = %limit, "Stake accepted");
    Ok((
      ExposureDecision::accepted(key.clone(), Some(limit), Some(exposure_after), reservation),
      CheckOutcome::Accepted,
    ))
  }

  /// Sum stakes of pending bets whose number and tiers cover `key`.
  /// Bets still held as reservations are already in `book.total()`.
  fn aggregate(&self, key: &BucketKey, pending: &[PendingBet], book: &BucketBook) -> Decimal {
    pending
      .iter()
      .filter(|bet| !book.holds_bet(bet.id))
      .filter(|bet| comparable_number(key.modality, &bet.number) == key.number)
      .filter(|bet| {
        let tiers = parse_position_token(&bet.positions);
        if tiers.is_empty() {
          self.observer.on_malformed_positions(bet.id, &bet.positions);
        }
        tiers.contains(&key.prize_tier)
      })
      .map(|bet| bet.stake)
      .sum()
  }

  async fn store_call<T>(
    &self,
    operation: &'static str,
    call: impl Future<Output = anyhow::Result<T>>,
  ) -> EngineResult<T> {
    let result = match tokio::time::timeout(self.settings.store_timeout, call).await {
      Ok(result) => result,
      Err(_) => Err(anyhow::anyhow!(
        "timed out after {} ms",
        self.settings.store_timeout.as_millis()
      )),
    };
    result.map_err(|e| {
      error!(operation, error = %e, "Exposure store call failed");
      self.observer.on_infrastructure_error(operation);
      EngineError::infrastructure(operation, e)
    })
  }

  fn book(&self, key: &BucketKey) -> Arc<AsyncMutex<BucketBook>> {
    Arc::clone(self.books.lock().entry(key.clone()).or_default())
  }

  async fn settle(&self, reservation: &Reservation) -> bool {
    let book = self.books.lock().get(&reservation.key).cloned();
    let Some(book) = book else {
      return false;
    };
    let removed = book.lock().await.in_flight.remove(&reservation.id).is_some();
    drop(book);
    self.prune(&reservation.key);
    if removed {
      self.observer.on_settled(reservation.id);
    }
    removed
  }

  /// Drop the bucket's entry when nobody holds it and nothing is reserved.
  fn prune(&self, key: &BucketKey) {
    let mut books = self.books.lock();
    let idle = books.get(key).is_some_and(|book| {
      Arc::strong_count(book) == 1 && book.try_lock().is_ok_and(|guard| guard.is_empty())
    });
    if idle {
      books.remove(key);
    }
  }
}
