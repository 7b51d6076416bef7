//! Bicho Risk Gate - Entry Point
//!
//! Admits bet tickets read as JSON lines on stdin and writes one JSON
//! decision line per ticket to stdout. Runs until SIGINT or end of input.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging, to stderr)
//! 3. Open the limit snapshot, bet journal and block log
//! 4. Sync `[[limits]]` into the limit store
//! 5. Build the exposure ledger (+ Prometheus observer) and ticket gate
//! 6. Spawn health server, metrics server, config watcher and reservation sweep
//! 7. Run the stdin loop: admit → append bets → commit reservations
//! 8. On SIGINT/EOF → readiness 503, stop tasks, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use bicho_risk_engine::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use bicho_risk_engine::adapters::persistence::{BetJournal, BlockedLog, LimitFileStore};
use bicho_risk_engine::config::{self, AppConfig, hot_reload::ConfigWatcher};
use bicho_risk_engine::ports::LedgerObserver;
use bicho_risk_engine::usecases::{
    AdmissionOutcome, BetAdmission, ExposureLedger, LedgerSettings, Ticket,
};

type Gate = BetAdmission<LimitFileStore, BetJournal, BlockedLog>;

/// One stdin line.
#[derive(Debug, Deserialize)]
struct GateRequest {
    #[serde(default)]
    id: Option<String>,
    ticket: Ticket,
}

/// One stdout line.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GateReply {
    Decided {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(flatten)]
        outcome: AdmissionOutcome,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        status: &'static str,
        error: String,
        retryable: bool,
    },
}

impl GateReply {
    fn failed(id: Option<String>, error: impl ToString, retryable: bool) -> Self {
        Self::Failed {
            id,
            status: "error",
            error: error.to_string(),
            retryable,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BICHO_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    // stdout carries decisions; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.engine.log_level)),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        name = %config.engine.name,
        version = env!("CARGO_PKG_VERSION"),
        default_policy = ?config.ledger.default_policy,
        data_dir = %config.persistence.data_dir,
        "Starting bicho risk gate"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());

    // ── 3. Open stores ──────────────────────────────────────
    let data_dir = &config.persistence.data_dir;
    let limits = Arc::new(
        LimitFileStore::open(data_dir)
            .await
            .context("Failed to open limit store")?,
    );
    let journal = Arc::new(
        BetJournal::new(data_dir)
            .await
            .context("Failed to open bet journal")?,
    );
    let blocked = Arc::new(
        BlockedLog::open(data_dir)
            .await
            .context("Failed to open block log")?,
    );

    // ── 4. Seed configured limits ───────────────────────────
    apply_limits(&limits, &config).await?;

    // ── 5. Ledger + gate ────────────────────────────────────
    let metrics = if config.metrics.enabled {
        Some(Arc::new(
            MetricsRegistry::new().context("Failed to create metrics registry")?,
        ))
    } else {
        None
    };
    let mut ledger = ExposureLedger::new(
        Arc::clone(&limits),
        Arc::clone(&journal),
        blocked,
        LedgerSettings::from(&config.ledger),
    );
    if let Some(metrics) = &metrics {
        ledger = ledger.with_observer(Arc::clone(metrics) as Arc<dyn LedgerObserver>);
    }
    let gate = Arc::new(BetAdmission::new(Arc::new(ledger)));

    // ── 6. Background tasks ─────────────────────────────────
    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_shutdown = shutdown_tx.subscribe();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run(health_shutdown).await {
            error!(error = %e, "Health server failed");
        }
    });

    let metrics_handle = metrics.clone().map(|metrics| {
        let bind_address = config.metrics.bind_address.clone();
        let metrics_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(bind_address, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        })
    });

    let (mut watcher, config_rx) = ConfigWatcher::new(&config_path, config.clone());
    let watcher_shutdown = shutdown_tx.subscribe();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown).await {
            error!(error = %e, "Config watcher failed");
        }
    });
    let reload_handle = tokio::spawn(reapply_limits_on_change(
        Arc::clone(&limits),
        config_rx,
        shutdown_tx.subscribe(),
    ));
    let sweep_handle = tokio::spawn(sweep_lapsed_reservations(
        Arc::clone(&gate),
        Duration::from_millis(config.ledger.reservation_ttl_ms),
        shutdown_tx.subscribe(),
    ));

    health.mark_ready();
    info!("Gate ready, reading tickets from stdin");

    // ── 7. Ticket loop ──────────────────────────────────────
    let gate_result = run_gate(&gate, &journal, &health, metrics.as_deref()).await;

    // ── 8. Graceful shutdown ────────────────────────────────
    health.mark_stopping();
    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(5), watcher_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reload_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

    info!("Shutdown complete");
    gate_result?;
    // A pending stdin read would otherwise keep the blocking pool alive.
    std::process::exit(0)
}

/// Read tickets until EOF or SIGINT.
async fn run_gate(
    gate: &Gate,
    journal: &BetJournal,
    health: &HealthState,
    metrics: Option<&MetricsRegistry>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            biased;
            _ = signal::ctrl_c() => {
                info!("SIGINT received, initiating graceful shutdown");
                return Ok(());
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            info!("End of input, shutting down");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(gate, journal, &line).await;
        if let Some(metrics) = metrics {
            metrics.record_ticket(reply_label(&reply));
        }

        let mut json = serde_json::to_string(&reply).context("Failed to serialize reply")?;
        json.push('\n');
        stdout
            .write_all(json.as_bytes())
            .await
            .context("Failed to write stdout")?;
        stdout.flush().await.context("Failed to flush stdout")?;
        health.record_ticket();
    }
}

async fn handle_line(gate: &Gate, journal: &BetJournal, line: &str) -> GateReply {
    let request: GateRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed ticket request");
            return GateReply::failed(None, format!("malformed request: {e}"), false);
        }
    };

    let outcome = match gate.admit(&request.ticket).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let retryable = e.is_retryable();
            return GateReply::failed(request.id, e, retryable);
        }
    };

    if let AdmissionOutcome::Accepted(admitted) = &outcome {
        let bets = admitted.bets(&request.ticket);
        if let Err(e) = journal.append(&bets).await {
            error!(error = %e, "Failed to persist admitted bets, releasing reservations");
            gate.release(admitted).await;
            return GateReply::failed(request.id, format!("{e:#}"), true);
        }
        gate.commit(admitted).await;
    }

    GateReply::Decided {
        id: request.id,
        outcome,
    }
}

fn reply_label(reply: &GateReply) -> &'static str {
    match reply {
        GateReply::Decided {
            outcome: AdmissionOutcome::Accepted(_),
            ..
        } => "accepted",
        GateReply::Decided { .. } => "rejected",
        GateReply::Failed { retryable: true, .. } => "failed",
        GateReply::Failed { .. } => "invalid",
    }
}

/// Make the limit table match `[[limits]]`; dropped scopes go inactive.
async fn apply_limits(limits: &LimitFileStore, config: &AppConfig) -> Result<()> {
    let deactivated = limits
        .sync_configured(&config.limits)
        .await
        .context("Failed to apply configured limits")?;
    info!(count = config.limits.len(), deactivated, "Configured limits applied");
    Ok(())
}

/// Expire reservations whose tickets were never committed or released.
async fn sweep_lapsed_reservations(gate: Arc<Gate>, every: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return,
            _ = interval.tick() => {
                let lapsed = gate.ledger().sweep_lapsed().await;
                if lapsed > 0 {
                    warn!(lapsed, "Swept lapsed reservations");
                }
            }
        }
    }
}

/// Re-sync `[[limits]]` whenever the watcher publishes a new config.
async fn reapply_limits_on_change(
    limits: Arc<LimitFileStore>,
    mut config_rx: watch::Receiver<AppConfig>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let config = config_rx.borrow_and_update().clone();
                if let Err(e) = apply_limits(&limits, &config).await {
                    warn!(error = %e, "Failed to apply reloaded limits");
                }
            }
        }
    }
}
