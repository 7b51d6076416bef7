//! Bet modalities of the animal lottery.
//!
//! A modality fixes how the bet's number is read (a digit string or a
//! list of animal groups), which prize tiers it may target and whether
//! every permutation of its digits pays.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// Highest prize tier any draw publishes.
pub const MAX_PRIZE_TIER: u8 = 7;

/// Animal groups are numbered 1..=25.
pub const ANIMAL_GROUPS: u8 = 25;

/// How a modality reads its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    /// Fixed-length digit string.
    Digits(usize),
    /// Exactly this many distinct animal groups.
    Groups(usize),
}

/// Human-facing name of what a bucket tracks, used in block messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigitKind {
    Milhar,
    Centena,
    Dezena,
    Grupo,
}

impl fmt::Display for DigitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Milhar => write!(f, "milhar"),
            Self::Centena => write!(f, "centena"),
            Self::Dezena => write!(f, "dezena"),
            Self::Grupo => write!(f, "grupo"),
        }
    }
}

/// Kind of bet placed on a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    /// Four digits, exact order.
    Milhar,
    /// Four digits, any order.
    MilharInvertida,
    /// Three digits, exact order.
    Centena,
    /// Three digits, any order.
    CentenaInvertida,
    /// Two digits, exact order.
    Dezena,
    /// Two digits, any order.
    DezenaInvertida,
    /// One animal group.
    Grupo,
    /// Two animal groups.
    DuqueGrupo,
    /// Three animal groups.
    TernoGrupo,
    /// Four animal groups.
    QuadraGrupo,
}

impl Modality {
    /// Every modality, in display order.
    pub const ALL: [Self; 10] = [
        Self::Milhar,
        Self::MilharInvertida,
        Self::Centena,
        Self::CentenaInvertida,
        Self::Dezena,
        Self::DezenaInvertida,
        Self::Grupo,
        Self::DuqueGrupo,
        Self::TernoGrupo,
        Self::QuadraGrupo,
    ];

    pub const fn number_kind(self) -> NumberKind {
        match self {
            Self::Milhar | Self::MilharInvertida => NumberKind::Digits(4),
            Self::Centena | Self::CentenaInvertida => NumberKind::Digits(3),
            Self::Dezena | Self::DezenaInvertida => NumberKind::Digits(2),
            Self::Grupo => NumberKind::Groups(1),
            Self::DuqueGrupo => NumberKind::Groups(2),
            Self::TernoGrupo => NumberKind::Groups(3),
            Self::QuadraGrupo => NumberKind::Groups(4),
        }
    }

    pub const fn digit_kind(self) -> DigitKind {
        match self {
            Self::Milhar | Self::MilharInvertida => DigitKind::Milhar,
            Self::Centena | Self::CentenaInvertida => DigitKind::Centena,
            Self::Dezena | Self::DezenaInvertida => DigitKind::Dezena,
            Self::Grupo | Self::DuqueGrupo | Self::TernoGrupo | Self::QuadraGrupo => {
                DigitKind::Grupo
            }
        }
    }

    /// Inverted modalities pay on every distinct permutation of the digits.
    pub const fn is_inverted(self) -> bool {
        matches!(
            self,
            Self::MilharInvertida | Self::CentenaInvertida | Self::DezenaInvertida
        )
    }

    /// Thousand bets only reach the fifth prize; everything else reaches the seventh.
    pub const fn max_tier(self) -> u8 {
        match self {
            Self::Milhar | Self::MilharInvertida => 5,
            _ => MAX_PRIZE_TIER,
        }
    }

    pub const fn tier_range(self) -> RangeInclusive<u8> {
        1..=self.max_tier()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Milhar => "MILHAR",
            Self::MilharInvertida => "MILHAR_INVERTIDA",
            Self::Centena => "CENTENA",
            Self::CentenaInvertida => "CENTENA_INVERTIDA",
            Self::Dezena => "DEZENA",
            Self::DezenaInvertida => "DEZENA_INVERTIDA",
            Self::Grupo => "GRUPO",
            Self::DuqueGrupo => "DUQUE_GRUPO",
            Self::TernoGrupo => "TERNO_GRUPO",
            Self::QuadraGrupo => "QUADRA_GRUPO",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = EngineError;

    /// Case-insensitive; accepts `-` or spaces in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| EngineError::UnknownModality(s.to_string()))
    }
}
