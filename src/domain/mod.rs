//! Domain layer - Wager combinatorics and exposure model.
//!
//! Pure logic with no I/O (hexagonal architecture inner ring):
//! modalities, position ranges, digit combinatorics, unit calculation
//! and the bucket/limit/block records the exposure ledger works on.

pub mod bet;
pub mod combinatorics;
pub mod error;
pub mod exposure;
pub mod modality;
pub mod positions;
pub mod selection;
pub mod units;

// Re-export core types for convenience
pub use bet::{Bet, BetStatus, DivisionType, DrawIdentity, PendingBet};
pub use error::{EngineError, EngineResult};
pub use exposure::{BlockedNumber, BucketKey, DefaultPolicy, LimitConfig};
pub use modality::{DigitKind, Modality};
pub use positions::{PositionRange, parse_position_token};
pub use units::{StakeSplit, UnitCalculator, UnitResult};
