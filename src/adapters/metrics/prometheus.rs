//! Prometheus Metrics Registry - Exposure Observability
//!
//! Registers the `bicho_risk_*` metrics and exposes them on the
//! configured bind address. Implements `LedgerObserver` so the ledger
//! reports checks, blocks and store failures without knowing about
//! Prometheus.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::exposure::BucketKey;
use crate::ports::observer::{CheckOutcome, LedgerObserver};

/// Centralized Prometheus metrics for the risk gate.
///
/// Labels stay low-cardinality: modality and outcome, never the number.
pub struct MetricsRegistry {
    registry: Registry,
    /// Exposure checks by modality and outcome.
    pub exposure_checks: IntCounterVec,
    /// Buckets blocked by this process.
    pub blocks: IntCounterVec,
    /// Store failures by operation.
    pub infrastructure_errors: IntCounterVec,
    /// Pending bets skipped for unparseable position tokens.
    pub malformed_positions: IntCounter,
    /// Check latency histogram (microseconds).
    pub check_latency_us: HistogramVec,
    /// Tickets processed by the gate, by outcome.
    pub tickets: IntCounterVec,
    /// Reservations taken but not yet committed or released.
    pub open_reservations: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let exposure_checks = IntCounterVec::new(
            Opts::new("bicho_risk_exposure_checks_total", "Exposure checks performed"),
            &["modality", "outcome"],
        )?;

        let blocks = IntCounterVec::new(
            Opts::new("bicho_risk_blocks_total", "Buckets newly blocked"),
            &["modality"],
        )?;

        let infrastructure_errors = IntCounterVec::new(
            Opts::new(
                "bicho_risk_infrastructure_errors_total",
                "Store calls that failed or timed out",
            ),
            &["operation"],
        )?;

        let malformed_positions = IntCounter::new(
            "bicho_risk_malformed_positions_total",
            "Pending bets skipped because their position token was unreadable",
        )?;

        let check_latency_us = HistogramVec::new(
            HistogramOpts::new(
                "bicho_risk_check_latency_us",
                "Exposure check latency in microseconds",
            )
            .buckets(vec![
                50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0, 250000.0,
            ]),
            &["modality"],
        )?;

        let tickets = IntCounterVec::new(
            Opts::new("bicho_risk_tickets_total", "Tickets processed by the gate"),
            &["outcome"],
        )?;

        let open_reservations = IntGauge::new(
            "bicho_risk_open_reservations",
            "Reservations awaiting commit or release",
        )?;

        registry.register(Box::new(exposure_checks.clone()))?;
        registry.register(Box::new(blocks.clone()))?;
        registry.register(Box::new(infrastructure_errors.clone()))?;
        registry.register(Box::new(malformed_positions.clone()))?;
        registry.register(Box::new(check_latency_us.clone()))?;
        registry.register(Box::new(tickets.clone()))?;
        registry.register(Box::new(open_reservations.clone()))?;

        Ok(Self {
            registry,
            exposure_checks,
            blocks,
            infrastructure_errors,
            malformed_positions,
            check_latency_us,
            tickets,
            open_reservations,
        })
    }

    pub fn record_ticket(&self, outcome: &str) {
        self.tickets.with_label_values(&[outcome]).inc();
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    match metrics.render() {
                        Ok(body) => (StatusCode::OK, body),
                        Err(e) => {
                            warn!(error = %e, "Failed to encode metrics");
                            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                        }
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl LedgerObserver for MetricsRegistry {
    fn on_check(&self, key: &BucketKey, outcome: CheckOutcome, elapsed: Duration) {
        let modality = key.modality.as_str();
        self.exposure_checks
            .with_label_values(&[modality, outcome.as_str()])
            .inc();
        self.check_latency_us
            .with_label_values(&[modality])
            .observe(elapsed.as_secs_f64() * 1_000_000.0);
        match outcome {
            CheckOutcome::NewlyBlocked => self.blocks.with_label_values(&[modality]).inc(),
            CheckOutcome::Accepted | CheckOutcome::Unlimited => self.open_reservations.inc(),
            _ => {}
        }
    }

    fn on_settled(&self, _reservation: Uuid) {
        self.open_reservations.dec();
    }

    fn on_malformed_positions(&self, _bet_id: Uuid, _token: &str) {
        self.malformed_positions.inc();
    }

    fn on_infrastructure_error(&self, operation: &'static str) {
        self.infrastructure_errors
            .with_label_values(&[operation])
            .inc();
    }
}
