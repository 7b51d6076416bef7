//! Configuration Module - TOML-based Engine Configuration
//!
//! Loads and validates configuration from `config.toml`. Exposure
//! limits can be seeded here; everything else the ledger needs
//! (policy, timeouts, storage location) is externalized here too.

pub mod hot_reload;
pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::exposure::{DefaultPolicy, LimitConfig};
use crate::usecases::exposure_ledger::LedgerSettings;

/// Top-level engine configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the gate begins accepting tickets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
  /// Engine identity and logging.
  pub engine: EngineConfig,
  /// Exposure ledger behavior.
  #[serde(default)]
  pub ledger: LedgerConfig,
  /// Persistence configuration.
  #[serde(default)]
  pub persistence: PersistenceConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Limits upserted into the limit store on startup and reload.
  #[serde(default)]
  pub limits: Vec<LimitConfig>,
}

/// Engine identity configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Exposure ledger configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
  /// Outcome for buckets without a configured limit.
  #[serde(default)]
  pub default_policy: DefaultPolicy,
  /// Upper bound on each store call (milliseconds).
  #[serde(default = "default_check_timeout")]
  pub check_timeout_ms: u64,
  /// How long an admitted ticket may take to persist and commit (milliseconds).
  #[serde(default = "default_reservation_ttl")]
  pub reservation_ttl_ms: u64,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      default_policy: DefaultPolicy::default(),
      check_timeout_ms: default_check_timeout(),
      reservation_ttl_ms: default_reservation_ttl(),
    }
  }
}

impl From<&LedgerConfig> for LedgerSettings {
  fn from(config: &LedgerConfig) -> Self {
    Self {
      default_policy: config.default_policy,
      store_timeout: Duration::from_millis(config.check_timeout_ms),
      reservation_ttl: Duration::from_millis(config.reservation_ttl_ms),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the bet journal, block log and limit snapshot.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_check_timeout() -> u64 {
  2_000
}

fn default_reservation_ttl() -> u64 {
  30_000
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
