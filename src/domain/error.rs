//! Engine error taxonomy.
//!
//! Input errors are rejected synchronously and never retried.
//! `Infrastructure` wraps storage failures and timeouts; callers may
//! retry those with backoff but must never read them as "accepted".

use rust_decimal::Decimal;
use thiserror::Error;

use super::modality::Modality;

/// Result alias used across the domain and use-case layers.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the unit calculator and the exposure ledger.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reversed range or a bound outside the modality's legal tiers.
    #[error("invalid position range {from}-{to} for {modality} (legal tiers 1-{max})")]
    InvalidPositionRange {
        modality: Modality,
        from: u8,
        to: u8,
        max: u8,
    },

    /// Strict parsing could not read a position token at all.
    #[error("unparseable position token {token:?}")]
    InvalidPositionToken { token: String },

    /// Group modality received the wrong number of animal groups.
    #[error("{modality} takes exactly {expected} group(s), got {actual}")]
    InvalidGroupCount {
        modality: Modality,
        expected: usize,
        actual: usize,
    },

    /// Wrong digit count, non-digit characters or an unknown group id.
    #[error("invalid number {number:?} for {modality}: {reason}")]
    InvalidNumber {
        modality: Modality,
        number: String,
        reason: String,
    },

    #[error("unknown modality {0:?}")]
    UnknownModality(String),

    #[error("stake must be positive, got {0}")]
    InvalidStake(Decimal),

    #[error("a ticket needs at least one pick")]
    InvalidPickCount,

    /// Fail-closed guard in front of the unit-value division.
    #[error("bet resolves to zero stake units")]
    ZeroUnits,

    /// Storage failure or timeout. Outcome unknown; retryable.
    #[error("infrastructure failure during {operation}: {source:#}")]
    Infrastructure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Wrap an adapter failure raised while performing `operation`.
    pub fn infrastructure(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Infrastructure { operation, source }
    }

    /// Only infrastructure failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }

    /// Caller input errors, surfaced to the bettor as a rejected bet.
    pub fn is_input_error(&self) -> bool {
        !self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_is_retryable() {
        let infra = EngineError::infrastructure("find_blocked", anyhow::anyhow!("connection reset"));
        assert!(infra.is_retryable());
        assert!(!infra.is_input_error());

        let input = EngineError::InvalidGroupCount {
            modality: Modality::DuqueGrupo,
            expected: 2,
            actual: 3,
        };
        assert!(!input.is_retryable());
        assert!(input.is_input_error());
    }

    #[test]
    fn test_messages_name_the_offending_input() {
        let err = EngineError::InvalidPositionRange {
            modality: Modality::Milhar,
            from: 1,
            to: 7,
            max: 5,
        };
        assert_eq!(
            err.to_string(),
            "invalid position range 1-7 for MILHAR (legal tiers 1-5)"
        );

        let infra = EngineError::infrastructure("find_pending_bets", anyhow::anyhow!("disk full"));
        assert!(infra.to_string().contains("find_pending_bets"));
        assert!(infra.to_string().contains("disk full"));
    }
}
