//! Metrics and Monitoring Adapters
//!
//! Prometheus export of ledger telemetry and the /live, /ready endpoints
//! via axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
