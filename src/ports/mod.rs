//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the exposure ledger requires from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `LimitStore`: Configured exposure limits
//! - `BetReadStore`: Pending bets owned by the bet-placement workflow
//! - `BlockedNumberStore`: Create-if-absent block records
//! - `LedgerObserver`: Telemetry hooks

pub mod bet_store;
pub mod blocked_store;
pub mod limit_store;
pub mod observer;

pub use bet_store::BetReadStore;
pub use blocked_store::BlockedNumberStore;
pub use limit_store::LimitStore;
pub use observer::{CheckOutcome, LedgerObserver, NoopObserver};
