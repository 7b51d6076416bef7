//! Persistence Adapters - File and In-memory Stores
//!
//! Implements the exposure ports. The file stores use append-only JSONL
//! for bets and block events and an atomic JSON snapshot for limits;
//! the in-memory stores back tests and embedders.

pub mod bets;
pub mod blocked;
pub mod limits;
pub mod memory;

pub use bets::BetJournal;
pub use blocked::BlockedLog;
pub use limits::LimitFileStore;
pub use memory::{InMemoryBetStore, InMemoryBlockedStore, InMemoryLimitStore};
