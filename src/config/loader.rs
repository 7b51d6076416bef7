//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    limits = config.limits.len(),
    default_policy = ?config.ledger.default_policy,
    check_timeout_ms = config.ledger.check_timeout_ms,
    reservation_ttl_ms = config.ledger.reservation_ttl_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A named engine and a usable storage directory
/// - A non-zero store timeout
/// - Seed limits that are positive, within the modality's tiers and unique per scope
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.engine.name.is_empty(), "engine.name must not be empty");
  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );

  anyhow::ensure!(
    config.ledger.check_timeout_ms > 0,
    "ledger.check_timeout_ms must be positive"
  );
  // A ticket's checks and its bet write each take up to one store call.
  anyhow::ensure!(
    config.ledger.reservation_ttl_ms > 2 * config.ledger.check_timeout_ms,
    "ledger.reservation_ttl_ms ({}) must exceed twice ledger.check_timeout_ms ({})",
    config.ledger.reservation_ttl_ms,
    config.ledger.check_timeout_ms
  );

  if config.metrics.enabled {
    anyhow::ensure!(
      !config.metrics.bind_address.is_empty(),
      "metrics.bind_address must not be empty when metrics are enabled"
    );
  }

  let mut scopes = HashSet::new();
  for (i, limit) in config.limits.iter().enumerate() {
    anyhow::ensure!(
      limit.limit > Decimal::ZERO,
      "Limit {} ({} tier {}) must be positive, got {}",
      i,
      limit.modality,
      limit.prize_tier,
      limit.limit
    );
    anyhow::ensure!(
      limit.modality.tier_range().contains(&limit.prize_tier),
      "Limit {} has prize tier {} outside 1-{} for {}",
      i,
      limit.prize_tier,
      limit.modality.max_tier(),
      limit.modality
    );
    anyhow::ensure!(
      scopes.insert(limit.scope()),
      "Limit {} duplicates the scope of an earlier limit ({} tier {} {:?} {:?})",
      i,
      limit.modality,
      limit.prize_tier,
      limit.lottery,
      limit.draw_time
    );
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::exposure::DefaultPolicy;
  use crate::domain::modality::Modality;
  use rust_decimal_macros::dec;

  const SAMPLE: &str = r#"
[engine]
name = "bicho-risk-gate"

[ledger]
default_policy = "closed"
check_timeout_ms = 500

[[limits]]
modality = "MILHAR"
prize_tier = 1
lottery = "LOOK"
draw_time = "11:20"
limit = "1000.00"

[[limits]]
modality = "DEZENA"
prize_tier = 3
limit = "250"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_sample_with_defaults() {
    let config = parse_config(SAMPLE).unwrap();
    assert_eq!(config.ledger.default_policy, DefaultPolicy::Closed);
    assert_eq!(config.ledger.check_timeout_ms, 500);
    assert_eq!(config.persistence.data_dir, "data");
    assert!(config.metrics.enabled);
    assert_eq!(config.limits.len(), 2);
    assert_eq!(config.limits[0].modality, Modality::Milhar);
    assert_eq!(config.limits[0].limit, dec!(1000.00));
    assert!(config.limits[1].lottery.is_empty());
    assert!(config.limits[1].active);
  }

  #[test]
  fn test_rejects_tier_outside_modality() {
    let bad = SAMPLE.replace("prize_tier = 1", "prize_tier = 6");
    let err = parse_config(&bad).unwrap_err();
    assert!(err.to_string().contains("outside 1-5"));
  }

  #[test]
  fn test_rejects_duplicate_scope() {
    let dup = format!(
      "{SAMPLE}\n[[limits]]\nmodality = \"DEZENA\"\nprize_tier = 3\nlimit = \"99\"\n"
    );
    assert!(parse_config(&dup).is_err());
  }

  #[test]
  fn test_reservation_ttl_must_outlast_store_calls() {
    let config = parse_config(SAMPLE).unwrap();
    assert_eq!(config.ledger.reservation_ttl_ms, 30_000);

    let short = SAMPLE.replace("check_timeout_ms = 500", "check_timeout_ms = 500\nreservation_ttl_ms = 800");
    let err = parse_config(&short).unwrap_err();
    assert!(err.to_string().contains("reservation_ttl_ms"));
  }

  #[test]
  fn test_rejects_non_positive_limit() {
    let bad = SAMPLE.replace("limit = \"250\"", "limit = \"0\"");
    assert!(parse_config(&bad).is_err());
  }
}
