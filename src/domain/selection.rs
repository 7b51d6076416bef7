//! Validated reading of a bet's number for its modality.
//!
//! Digit modalities take a digit string of the exact length; group
//! modalities take animal-group ids separated by `-`, `,`, `/` or
//! whitespace. Both resolve to a canonical string used as the bucket's
//! number, so `"5-12"` and `"12, 05"` land in the same duque bucket.

use serde::{Deserialize, Serialize};

use super::combinatorics::{distinct_permutations, normalize};
use super::error::{EngineError, EngineResult};
use super::modality::{ANIMAL_GROUPS, Modality, NumberKind};

/// A number that passed validation for a given modality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    Digits(String),
    /// Sorted ascending, no duplicates.
    Groups(Vec<u8>),
}

impl Selection {
    /// Validate `raw` against `modality`.
    ///
    /// # Errors
    /// `InvalidNumber` for wrong digit counts, stray characters, group ids
    /// outside 1..=25 or repeated groups; `InvalidGroupCount` when the
    /// number of groups differs from the modality's arity.
    pub fn parse(modality: Modality, raw: &str) -> EngineResult<Self> {
        let trimmed = raw.trim();
        match modality.number_kind() {
            NumberKind::Digits(len) => {
                if trimmed.len() != len || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(EngineError::InvalidNumber {
                        modality,
                        number: raw.to_string(),
                        reason: format!("expected exactly {len} digits"),
                    });
                }
                Ok(Self::Digits(trimmed.to_string()))
            }
            NumberKind::Groups(arity) => {
                let invalid = |reason: String| EngineError::InvalidNumber {
                    modality,
                    number: raw.to_string(),
                    reason,
                };
                let mut groups = split_groups(trimmed)
                    .map(|part| {
                        part.parse::<u8>()
                            .ok()
                            .filter(|g| (1..=ANIMAL_GROUPS).contains(g))
                            .ok_or_else(|| invalid(format!("{part:?} is not a group between 1 and {ANIMAL_GROUPS}")))
                    })
                    .collect::<EngineResult<Vec<u8>>>()?;

                if groups.len() != arity {
                    return Err(EngineError::InvalidGroupCount {
                        modality,
                        expected: arity,
                        actual: groups.len(),
                    });
                }

                groups.sort_unstable();
                if groups.windows(2).any(|w| w[0] == w[1]) {
                    return Err(invalid("repeated group".to_string()));
                }
                Ok(Self::Groups(groups))
            }
        }
    }

    /// How many payable combinations this selection expands to.
    pub fn combinations(&self, modality: Modality) -> u64 {
        match self {
            Self::Digits(digits) if modality.is_inverted() => distinct_permutations(digits),
            _ => 1,
        }
    }

    /// Canonical string used as the bucket number.
    pub fn canonical(&self) -> String {
        match self {
            Self::Digits(digits) => digits.clone(),
            Self::Groups(groups) => join_groups(groups),
        }
    }
}

/// Bucket-comparable form of a stored bet's number.
///
/// Never fails: digit modalities go through [`normalize`]; group
/// modalities are canonicalized when every part reads as a number and
/// otherwise compared on the trimmed raw text.
pub fn comparable_number(modality: Modality, raw: &str) -> String {
    match modality.number_kind() {
        NumberKind::Digits(len) => normalize(raw, len),
        NumberKind::Groups(_) => {
            let parsed: Option<Vec<u8>> = split_groups(raw.trim()).map(|p| p.parse().ok()).collect();
            match parsed {
                Some(mut groups) if !groups.is_empty() => {
                    groups.sort_unstable();
                    groups.dedup();
                    join_groups(&groups)
                }
                _ => raw.trim().to_string(),
            }
        }
    }
}

fn split_groups(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == '-' || c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
}

fn join_groups(groups: &[u8]) -> String {
    groups
        .iter()
        .map(|g| format!("{g:02}"))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_length_is_enforced() {
        assert!(Selection::parse(Modality::Milhar, "1234").is_ok());
        assert!(Selection::parse(Modality::Milhar, "123").is_err());
        assert!(Selection::parse(Modality::Centena, "12a").is_err());
        assert!(Selection::parse(Modality::Dezena, " 07 ").is_ok());
    }

    #[test]
    fn test_group_arity_is_enforced() {
        let err = Selection::parse(Modality::DuqueGrupo, "5-12-20").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidGroupCount { expected: 2, actual: 3, .. }
        ));
        assert!(Selection::parse(Modality::Grupo, "").is_err());
        assert!(Selection::parse(Modality::TernoGrupo, "1,2,3").is_ok());
    }

    #[test]
    fn test_group_ids_must_be_known_and_distinct() {
        assert!(matches!(
            Selection::parse(Modality::Grupo, "26"),
            Err(EngineError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Selection::parse(Modality::DuqueGrupo, "7-7"),
            Err(EngineError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_group_canonical_form_is_order_insensitive() {
        let a = Selection::parse(Modality::DuqueGrupo, "12-5").unwrap();
        let b = Selection::parse(Modality::DuqueGrupo, "05, 12").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "05-12");
    }

    #[test]
    fn test_combinations_only_expand_inverted_bets() {
        let digits = Selection::parse(Modality::MilharInvertida, "1123").unwrap();
        assert_eq!(digits.combinations(Modality::MilharInvertida), 12);
        assert_eq!(digits.combinations(Modality::Milhar), 1);
        let groups = Selection::parse(Modality::QuadraGrupo, "1 2 3 4").unwrap();
        assert_eq!(groups.combinations(Modality::QuadraGrupo), 1);
    }

    #[test]
    fn test_comparable_number() {
        assert_eq!(comparable_number(Modality::Centena, "4321"), "321");
        assert_eq!(comparable_number(Modality::Dezena, "5"), "05");
        assert_eq!(comparable_number(Modality::DuqueGrupo, "12/5"), "05-12");
        assert_eq!(comparable_number(Modality::Grupo, " leão "), "leão");
    }
}
