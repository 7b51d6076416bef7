//! Exposure buckets, limit configs and block records.
//!
//! A bucket is `(modality, prize tier, number, lottery, draw time)`.
//! Limits key on the same shape minus the number, with empty
//! lottery/draw time acting as wildcards. A block record freezes a
//! bucket once its exposure would pass the limit.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::bet::DrawIdentity;
use super::modality::Modality;
use super::selection::comparable_number;

/// Aggregation key for exposure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub modality: Modality,
    pub prize_tier: u8,
    /// Comparable form (see [`comparable_number`]).
    pub number: String,
    pub lottery: String,
    pub draw_time: String,
}

impl BucketKey {
    /// Build a key, normalizing `number` for the modality.
    pub fn new(modality: Modality, prize_tier: u8, number: &str, draw: &DrawIdentity) -> Self {
        Self {
            modality,
            prize_tier,
            number: comparable_number(modality, number),
            lottery: draw.lottery.clone(),
            draw_time: draw.draw_time.clone(),
        }
    }

    pub fn draw(&self) -> DrawIdentity {
        DrawIdentity::new(self.lottery.clone(), self.draw_time.clone())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}@{}",
            self.modality,
            self.prize_tier,
            self.number,
            self.draw()
        )
    }
}

/// Configured ceiling on a bucket's cumulative exposure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub modality: Modality,
    pub prize_tier: u8,
    /// Empty means every lottery.
    #[serde(default)]
    pub lottery: String,
    /// Empty means every draw time.
    #[serde(default)]
    pub draw_time: String,
    pub limit: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl LimitConfig {
    /// Does this config cover the given concrete draw?
    pub fn applies_to(&self, modality: Modality, prize_tier: u8, lottery: &str, draw_time: &str) -> bool {
        self.active
            && self.modality == modality
            && self.prize_tier == prize_tier
            && (self.lottery.is_empty() || self.lottery == lottery)
            && (self.draw_time.is_empty() || self.draw_time == draw_time)
    }

    /// Higher wins: lottery-scoped beats draw-time-scoped beats wildcard.
    pub fn specificity(&self) -> u8 {
        (u8::from(!self.lottery.is_empty()) << 1) | u8::from(!self.draw_time.is_empty())
    }

    /// Identity under which the config is stored and replaced.
    pub fn scope(&self) -> (Modality, u8, &str, &str) {
        (self.modality, self.prize_tier, &self.lottery, &self.draw_time)
    }
}

/// Pick the effective limit among candidate configs.
///
/// Only active configs covering the draw count; the most specific wins.
pub fn resolve_effective_limit<'a, I>(
    configs: I,
    modality: Modality,
    prize_tier: u8,
    lottery: &str,
    draw_time: &str,
) -> Option<&'a LimitConfig>
where
    I: IntoIterator<Item = &'a LimitConfig>,
{
    configs
        .into_iter()
        .filter(|c| c.applies_to(modality, prize_tier, lottery, draw_time))
        .max_by_key(|c| c.specificity())
}

/// Materialized "this bucket hit its limit" decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedNumber {
    pub key: BucketKey,
    /// Exposure including the bet that triggered the block.
    pub value_at_block: Decimal,
    pub limit_at_block: Decimal,
    pub blocked_at: DateTime<Utc>,
}

impl BlockedNumber {
    pub fn new(key: BucketKey, value_at_block: Decimal, limit_at_block: Decimal) -> Self {
        Self {
            key,
            value_at_block,
            limit_at_block,
            blocked_at: Utc::now(),
        }
    }

    /// Message shown to the bettor when the bucket rejects a bet.
    pub fn reason(&self) -> String {
        block_reason(&self.key, self.limit_at_block, self.value_at_block)
    }
}

/// What to do with a bucket that has no configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    /// Accept: unconfigured buckets are never throttled.
    #[default]
    Open,
    /// Reject: every bucket needs an explicit limit.
    Closed,
}

/// Human-readable block message naming digit kind, number, tier and draw.
pub fn block_reason(key: &BucketKey, limit: Decimal, exposure: Decimal) -> String {
    format!(
        "{} {} is blocked for prize tier {} ({}): limit R$ {} reached (exposure R$ {})",
        key.modality.digit_kind(),
        key.number,
        key.prize_tier,
        key.draw(),
        limit.round_dp(2),
        exposure.round_dp(2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit(lottery: &str, draw_time: &str, value: Decimal) -> LimitConfig {
        LimitConfig {
            modality: Modality::Milhar,
            prize_tier: 1,
            lottery: lottery.to_string(),
            draw_time: draw_time.to_string(),
            limit: value,
            active: true,
        }
    }

    #[test]
    fn test_bucket_key_normalizes_number() {
        let key = BucketKey::new(Modality::Dezena, 1, "4321", &DrawIdentity::new("LOOK", "11:20"));
        assert_eq!(key.number, "21");
        assert_eq!(key.to_string(), "DEZENA:1:21@LOOK 11:20");
    }

    #[test]
    fn test_most_specific_limit_wins() {
        let configs = vec![
            limit("", "", dec!(5000)),
            limit("LOOK", "", dec!(2000)),
            limit("LOOK", "11:20", dec!(1000)),
        ];
        let chosen = resolve_effective_limit(&configs, Modality::Milhar, 1, "LOOK", "11:20").unwrap();
        assert_eq!(chosen.limit, dec!(1000));

        let chosen = resolve_effective_limit(&configs, Modality::Milhar, 1, "LOOK", "14:20").unwrap();
        assert_eq!(chosen.limit, dec!(2000));

        let chosen = resolve_effective_limit(&configs, Modality::Milhar, 1, "PT-RIO", "14:20").unwrap();
        assert_eq!(chosen.limit, dec!(5000));
    }

    #[test]
    fn test_inactive_and_foreign_configs_are_ignored() {
        let mut inactive = limit("LOOK", "11:20", dec!(10));
        inactive.active = false;
        let configs = vec![inactive, limit("", "", dec!(700))];
        let chosen = resolve_effective_limit(&configs, Modality::Milhar, 1, "LOOK", "11:20").unwrap();
        assert_eq!(chosen.limit, dec!(700));

        assert!(resolve_effective_limit(&configs, Modality::Milhar, 2, "LOOK", "11:20").is_none());
        assert!(resolve_effective_limit(&configs, Modality::Centena, 1, "LOOK", "11:20").is_none());
    }

    #[test]
    fn test_block_reason_is_actionable() {
        let key = BucketKey::new(Modality::MilharInvertida, 1, "1234", &DrawIdentity::new("LOOK", "11:20"));
        let blocked = BlockedNumber::new(key, dec!(1010), dec!(1000));
        assert_eq!(
            blocked.reason(),
            "milhar 1234 is blocked for prize tier 1 (LOOK 11:20): limit R$ 1000 reached (exposure R$ 1010)"
        );
    }

    #[test]
    fn test_default_policy_is_open() {
        assert_eq!(DefaultPolicy::default(), DefaultPolicy::Open);
        let closed: DefaultPolicy = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(closed, DefaultPolicy::Closed);
    }
}
