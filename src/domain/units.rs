//! Stake unit calculation.
//!
//! A bet resolves into `combinations × positions` indivisible units,
//! each worth `stake / units`. All arithmetic stays in `Decimal` at full
//! precision; rounding to cents happens only when a value is persisted.
//!
//! Tickets with several picks and division `all` split their stake
//! across picks first. Each pick's share is rounded **down** to the
//! cent and the sub-cent remainder stays with the house.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::bet::DivisionType;
use super::error::{EngineError, EngineResult};
use super::modality::Modality;
use super::positions::PositionRange;
use super::selection::Selection;

/// Breakdown of one pick into stake units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
    pub modality: Modality,
    /// Canonical number (groups sorted and zero-padded).
    pub number: String,
    pub range: PositionRange,
    /// Distinct digit arrangements that pay (1 unless inverted).
    pub combinations: u64,
    /// Prize tiers covered.
    pub positions: u32,
    pub units: u64,
    /// Full-precision value of one unit.
    pub unit_value: Decimal,
    pub stake: Decimal,
}

impl UnitResult {
    /// Unit value as it should be written to storage (banker's rounding).
    pub fn persisted_unit_value(&self) -> Decimal {
        self.unit_value
            .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointNearestEven)
    }
}

/// How a ticket's total stake lands on each pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSplit {
    pub per_pick: Decimal,
    pub picks: usize,
    /// Sub-cent leftover kept by the house (always zero for `each`).
    pub house_remainder: Decimal,
}

impl StakeSplit {
    /// Money actually put at risk across all picks.
    pub fn total_staked(&self) -> Decimal {
        self.per_pick * Decimal::from(self.picks)
    }
}

/// Currency precision: centavos.
pub const CURRENCY_SCALE: u32 = 2;

/// Converts bets into stake units.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCalculator;

impl UnitCalculator {
    pub const fn new() -> Self {
        Self
    }

    /// Decompose one pick into units.
    ///
    /// # Errors
    /// `InvalidStake`, `InvalidPositionRange`, `InvalidNumber`,
    /// `InvalidGroupCount`, or `ZeroUnits` if the arithmetic would divide
    /// by zero.
    pub fn compute_units(
        &self,
        modality: Modality,
        number: &str,
        position_from: u8,
        position_to: u8,
        stake: Decimal,
    ) -> EngineResult<UnitResult> {
        if stake <= Decimal::ZERO {
            return Err(EngineError::InvalidStake(stake));
        }
        let range = PositionRange::new(modality, position_from, position_to)?;
        let selection = Selection::parse(modality, number)?;

        let combinations = selection.combinations(modality);
        let positions = range.len();
        let units = combinations.saturating_mul(u64::from(positions));
        if units == 0 {
            return Err(EngineError::ZeroUnits);
        }
        let unit_value = stake
            .checked_div(Decimal::from(units))
            .ok_or(EngineError::ZeroUnits)?;

        Ok(UnitResult {
            modality,
            number: selection.canonical(),
            range,
            combinations,
            positions,
            units,
            unit_value,
            stake,
        })
    }

    /// Work out each pick's stake for a ticket.
    ///
    /// # Errors
    /// `InvalidPickCount` for zero picks, `InvalidStake` for a
    /// non-positive total or an `all` split that rounds to nothing.
    pub fn split_stake(
        &self,
        total: Decimal,
        picks: usize,
        division: DivisionType,
    ) -> EngineResult<StakeSplit> {
        if picks == 0 {
            return Err(EngineError::InvalidPickCount);
        }
        if total <= Decimal::ZERO {
            return Err(EngineError::InvalidStake(total));
        }

        match division {
            DivisionType::Each => Ok(StakeSplit {
                per_pick: total,
                picks,
                house_remainder: Decimal::ZERO,
            }),
            DivisionType::All => {
                let per_pick = (total / Decimal::from(picks))
                    .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::ToZero);
                if per_pick <= Decimal::ZERO {
                    return Err(EngineError::InvalidStake(per_pick));
                }
                let house_remainder = total - per_pick * Decimal::from(picks);
                Ok(StakeSplit {
                    per_pick,
                    picks,
                    house_remainder,
                })
            }
        }
    }
}
