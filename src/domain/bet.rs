//! Bet records as the bet-placement workflow stores them.
//!
//! The engine never mutates a bet; it only reads pending ones to
//! aggregate exposure. Positions are kept in token form (`"1-5"`) so
//! historical rows written by older clients are still readable.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::modality::Modality;
use super::positions::PositionRange;

/// Whether a ticket's stake is split across picks or applies to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivisionType {
    /// Total stake divided evenly across picks.
    #[default]
    All,
    /// Stated stake applies to every pick.
    Each,
}

/// Lifecycle of a stored bet. Only `Pending` counts toward exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Cancelled,
}

/// The scheduled result event a bet or limit is scoped to.
///
/// Empty strings mean "not specified" / "any".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DrawIdentity {
    #[serde(default)]
    pub lottery: String,
    #[serde(default)]
    pub draw_time: String,
}

impl DrawIdentity {
    pub fn new(lottery: impl Into<String>, draw_time: impl Into<String>) -> Self {
        Self {
            lottery: lottery.into(),
            draw_time: draw_time.into(),
        }
    }

    pub fn lottery(&self) -> Option<&str> {
        Some(self.lottery.as_str()).filter(|l| !l.is_empty())
    }

    pub fn draw_time(&self) -> Option<&str> {
        Some(self.draw_time.as_str()).filter(|t| !t.is_empty())
    }
}

impl fmt::Display for DrawIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lottery(), self.draw_time()) {
            (Some(l), Some(t)) => write!(f, "{l} {t}"),
            (Some(l), None) => write!(f, "{l}"),
            (None, Some(t)) => write!(f, "any lottery at {t}"),
            (None, None) => write!(f, "all draws"),
        }
    }
}

/// A stored bet, one pick per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub modality: Modality,
    pub number: String,
    /// Position token, e.g. `"1-5"`.
    pub positions: String,
    #[serde(default)]
    pub division: DivisionType,
    pub stake: Decimal,
    #[serde(default)]
    pub draw: DrawIdentity,
    #[serde(default)]
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
}

impl Bet {
    /// New pending bet for an already-validated pick.
    pub fn pending(
        modality: Modality,
        number: impl Into<String>,
        range: PositionRange,
        division: DivisionType,
        stake: Decimal,
        draw: DrawIdentity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            modality,
            number: number.into(),
            positions: range.to_token(),
            division,
            stake,
            draw,
            status: BetStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Store under an id chosen ahead of time (the reservation's bet id).
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }

    /// Does this bet belong to the requested draw scope?
    pub fn in_scope(&self, lottery: Option<&str>, draw_time: Option<&str>) -> bool {
        lottery.is_none_or(|l| self.draw.lottery == l)
            && draw_time.is_none_or(|t| self.draw.draw_time == t)
    }

    pub fn to_pending(&self) -> PendingBet {
        PendingBet {
            id: self.id,
            stake: self.stake,
            number: self.number.clone(),
            positions: self.positions.clone(),
        }
    }
}

/// The slice of a pending bet the exposure scan needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBet {
    pub id: Uuid,
    pub stake: Decimal,
    pub number: String,
    pub positions: String,
}
