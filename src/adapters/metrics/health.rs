//! Gate Health - Liveness and Readiness over HTTP
//!
//! `/live` answers while the process runs. `/ready` reports the gate's
//! phase and how many tickets it has answered, and is 200 only while
//! the gate is serving tickets.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Lifecycle of the gate process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    /// Opening stores and syncing limits.
    Starting,
    /// Reading tickets.
    Serving,
    /// Input closed or SIGINT received; background tasks stopping.
    Draining,
}

impl GatePhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Serving,
            2 => Self::Draining,
            _ => Self::Starting,
        }
    }
}

/// Body of `/ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub phase: GatePhase,
    pub tickets_answered: u64,
}

/// Gate state shared with the health endpoint.
#[derive(Debug, Default)]
pub struct HealthState {
    phase: AtomicU8,
    tickets_answered: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores are open and limits synced.
    pub fn mark_ready(&self) {
        self.phase.store(GatePhase::Serving as u8, Ordering::Relaxed);
    }

    pub fn mark_stopping(&self) {
        self.phase.store(GatePhase::Draining as u8, Ordering::Relaxed);
    }

    /// One reply line written.
    pub fn record_ticket(&self) {
        self.tickets_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn phase(&self) -> GatePhase {
        GatePhase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == GatePhase::Serving
    }

    pub fn report(&self) -> ReadinessReport {
        ReadinessReport {
            phase: self.phase(),
            tickets_answered: self.tickets_answered.load(Ordering::Relaxed),
        }
    }
}

/// Axum server for `/live` and `/ready`.
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    fn router(state: Arc<HealthState>) -> Router {
        Router::new()
            .route("/live", get(|| async { StatusCode::OK }))
            .route("/ready", get(readiness))
            .with_state(state)
    }

    /// Serve until shutdown is broadcast.
    #[instrument(skip(self, shutdown_rx), fields(port = self.port))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!("Health endpoint listening");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;
        Ok(())
    }
}

async fn readiness(State(state): State<Arc<HealthState>>) -> (StatusCode, Json<ReadinessReport>) {
    let status = if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(state.report()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_only_while_serving() {
        let state = HealthState::new();
        assert_eq!(state.phase(), GatePhase::Starting);
        assert!(!state.is_ready());

        state.mark_ready();
        state.record_ticket();
        state.record_ticket();
        assert!(state.is_ready());
        assert_eq!(
            state.report(),
            ReadinessReport {
                phase: GatePhase::Serving,
                tickets_answered: 2,
            }
        );

        state.mark_stopping();
        assert!(!state.is_ready());
        assert_eq!(state.report().phase, GatePhase::Draining);
    }

    #[tokio::test]
    async fn test_readiness_body_names_the_phase() {
        let state = Arc::new(HealthState::new());
        let (status, Json(report)) = readiness(State(Arc::clone(&state))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(serde_json::to_value(report).unwrap()["phase"], "starting");

        state.mark_ready();
        let (status, _) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
