//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! infrastructure.
//!
//! Adapter categories:
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSONL bet journal, block log, limit snapshot, in-memory stores

pub mod metrics;
pub mod persistence;
