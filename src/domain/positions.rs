//! Prize-position ranges and position-token parsing.
//!
//! Stored bets carry their prize range as a short token (`"1"`, `"1st"`,
//! `"1-5"`). Two readers exist:
//! - [`parse_position_token`] is permissive: anything it cannot read
//!   yields an empty tier list, so a malformed historical row never
//!   aborts an exposure scan.
//! - [`PositionRange::parse`] is strict and validates against a modality,
//!   for input that is about to become a new bet.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{EngineError, EngineResult};
use super::modality::{MAX_PRIZE_TIER, Modality};

/// Ordinal suffixes tolerated after a tier number.
const ORDINAL_SUFFIXES: [&str; 8] = ["st", "nd", "rd", "th", "º", "°", "ª", "o"];

/// Validated, contiguous, 1-based range of prize tiers.
///
/// Deserializing checks `1 <= from <= to <= 7`; the modality bound is
/// only known to [`PositionRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct PositionRange {
    from: u8,
    to: u8,
}

#[derive(Deserialize)]
struct RawRange {
    from: u8,
    to: u8,
}

impl TryFrom<RawRange> for PositionRange {
    type Error = EngineError;

    fn try_from(raw: RawRange) -> EngineResult<Self> {
        if raw.from == 0 || raw.from > raw.to || raw.to > MAX_PRIZE_TIER {
            return Err(EngineError::InvalidPositionToken {
                token: format!("{}-{}", raw.from, raw.to),
            });
        }
        Ok(Self {
            from: raw.from,
            to: raw.to,
        })
    }
}

impl PositionRange {
    /// Build a range legal for `modality`.
    ///
    /// # Errors
    /// `InvalidPositionRange` if `from > to` or a bound leaves the
    /// modality's legal tiers.
    pub fn new(modality: Modality, from: u8, to: u8) -> EngineResult<Self> {
        let legal = modality.tier_range();
        if from > to || !legal.contains(&from) || !legal.contains(&to) {
            return Err(EngineError::InvalidPositionRange {
                modality,
                from,
                to,
                max: modality.max_tier(),
            });
        }
        Ok(Self { from, to })
    }

    /// Strict token parsing followed by modality validation.
    pub fn parse(modality: Modality, token: &str) -> EngineResult<Self> {
        let (from, to) = parse_bounds(token).ok_or_else(|| EngineError::InvalidPositionToken {
            token: token.to_string(),
        })?;
        Self::new(modality, from, to)
    }

    pub const fn from(&self) -> u8 {
        self.from
    }

    pub const fn to(&self) -> u8 {
        self.to
    }

    /// Number of tiers covered (`to - from + 1`).
    pub const fn len(&self) -> u32 {
        (self.to - self.from) as u32 + 1
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn contains(&self, tier: u8) -> bool {
        tier >= self.from && tier <= self.to
    }

    pub const fn tiers(&self) -> RangeInclusive<u8> {
        self.from..=self.to
    }

    /// Token form as stored on bets: `"3"` or `"1-5"`.
    pub fn to_token(&self) -> String {
        if self.from == self.to {
            self.from.to_string()
        } else {
            format!("{}-{}", self.from, self.to)
        }
    }
}

/// Permissively expand a position token into the tiers it covers.
///
/// `"1"` → `[1]`, `"1st"` → `[1]`, `"1-5"` → `[1, 2, 3, 4, 5]`.
/// Unreadable tokens, tier zero, tiers above the seventh and reversed
/// ranges all yield `[]`; callers treat that as "covers no prize tier".
pub fn parse_position_token(token: &str) -> Vec<u8> {
    match parse_bounds(token) {
        Some((from, to)) if from <= to && to <= MAX_PRIZE_TIER => (from..=to).collect(),
        _ => {
            warn!(token = %token, "Position token covers no prize tier");
            Vec::new()
        }
    }
}

/// Read `"N"` or `"N-M"` into raw bounds (each at least 1).
fn parse_bounds(token: &str) -> Option<(u8, u8)> {
    let token = token.trim();
    match token.split_once('-') {
        Some((from, to)) => Some((parse_ordinal(from)?, parse_ordinal(to)?)),
        None => {
            let tier = parse_ordinal(token)?;
            Some((tier, tier))
        }
    }
}

fn parse_ordinal(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    let digits = ORDINAL_SUFFIXES
        .iter()
        .find_map(|suffix| raw.strip_suffix(suffix))
        .unwrap_or(raw)
        .trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|tier| *tier >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_ordinal_forms() {
        assert_eq!(parse_position_token("1"), vec![1]);
        assert_eq!(parse_position_token("1st"), vec![1]);
        assert_eq!(parse_position_token("2nd"), vec![2]);
        assert_eq!(parse_position_token("3º"), vec![3]);
        assert_eq!(parse_position_token(" 5o "), vec![5]);
    }

    #[test]
    fn test_hyphenated_ranges() {
        assert_eq!(parse_position_token("1-5"), vec![1, 2, 3, 4, 5]);
        assert_eq!(parse_position_token("1 - 3"), vec![1, 2, 3]);
        assert_eq!(parse_position_token("1º-7º"), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(parse_position_token("4-4"), vec![4]);
    }

    #[test]
    fn test_malformed_tokens_cover_nothing() {
        for token in ["", "abc", "0", "5-1", "1-", "-3", "1-9", "8", "1-2-3", "1.5", "x1"] {
            assert!(
                parse_position_token(token).is_empty(),
                "token {token:?} should cover no tier"
            );
        }
    }

    #[test]
    fn test_range_validation_per_modality() {
        let r = PositionRange::new(Modality::Milhar, 1, 5).unwrap();
        assert_eq!(r.len(), 5);
        assert!(r.contains(3));
        assert!(!r.contains(6));

        assert!(matches!(
            PositionRange::new(Modality::Milhar, 1, 7),
            Err(EngineError::InvalidPositionRange { max: 5, .. })
        ));
        assert!(PositionRange::new(Modality::Centena, 1, 7).is_ok());
        assert!(PositionRange::new(Modality::Dezena, 3, 2).is_err());
        assert!(PositionRange::new(Modality::Grupo, 0, 1).is_err());
    }

    #[test]
    fn test_strict_parse_rejects_garbage() {
        assert!(matches!(
            PositionRange::parse(Modality::Dezena, "first"),
            Err(EngineError::InvalidPositionToken { .. })
        ));
        let r = PositionRange::parse(Modality::Dezena, "1st-5th").unwrap();
        assert_eq!((r.from(), r.to()), (1, 5));
    }

    #[test]
    fn test_token_round_trip() {
        let single = PositionRange::new(Modality::Grupo, 3, 3).unwrap();
        assert_eq!(single.to_token(), "3");
        let range = PositionRange::new(Modality::Grupo, 1, 5).unwrap();
        assert_eq!(range.to_token(), "1-5");
        assert_eq!(parse_position_token(&range.to_token()), range.tiers().collect::<Vec<_>>());
    }

    #[test]
    fn test_deserialize_validates_bounds() {
        let r: PositionRange = serde_json::from_str(r#"{"from":1,"to":5}"#).unwrap();
        assert_eq!(r.len(), 5);
        for bad in [r#"{"from":5,"to":1}"#, r#"{"from":0,"to":2}"#, r#"{"from":1,"to":8}"#] {
            assert!(serde_json::from_str::<PositionRange>(bad).is_err(), "{bad}");
        }
    }
}
