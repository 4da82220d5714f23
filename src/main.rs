//! BitTicker - Entry Point
//!
//! Terminal BTC ticker: live price on one coloured line, threshold
//! alerts on the terminal bell. Runs until `stop` or Ctrl-C.
//!
//! Wiring sequence:
//! 1. Load config (path from `BITTICKER_CONFIG`, default `config.toml`)
//! 2. Init tracing on stderr (JSON or pretty)
//! 3. Create metrics registry, display task and controller
//! 4. Spawn health/metrics server (/live, /ready, /metrics)
//! 5. Spawn config watcher + snapshot forwarder
//! 6. Spawn stdin command reader + Ctrl-C forwarder
//! 7. Run the controller loop until stop
//! 8. Broadcast shutdown, join background tasks

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};

use bitticker::adapters::feeds::FeedConnector;
use bitticker::adapters::metrics::{HealthServer, TickerMetrics};
use bitticker::adapters::signals::{CommandReader, forward_ctrl_c};
use bitticker::adapters::sinks::{ConsoleDisplay, TerminalAlert};
use bitticker::config::hot_reload::ConfigWatcher;
use bitticker::config::{self, AppConfig, AppSection, LogFormat};
use bitticker::ports::ControlSignal;
use bitticker::usecases::{DisplayDispatcher, LifecycleController};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "BITTICKER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// How long background tasks get to finish after shutdown.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    // A stdin read blocked on the terminal must not keep the process alive.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run());
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let loaded = config::loader::load_config(&config_path);
    let config = loaded.as_ref().map_or_else(|_| AppConfig::default(), Clone::clone);

    // ── 2. Initialize logging ───────────────────────────────
    init_tracing(&config.app);
    if let Err(e) = &loaded {
        warn!(error = %e, path = %config_path, "Config unavailable, using defaults");
    }

    info!(
        name = %config.app.name,
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.feed.mode,
        currency = %config.ticker.display_currency,
        alert = config.alert.enabled,
        "Starting BitTicker"
    );

    // ── 3. Channels ─────────────────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(4);
    let (signal_tx, signal_rx) = mpsc::channel::<ControlSignal>(32);
    let (reload_tx, reload_rx) = mpsc::channel::<()>(1);

    // ── 4. Metrics, display and controller ──────────────────
    let metrics = Arc::new(TickerMetrics::new().context("Failed to create metrics registry")?);
    let display = DisplayDispatcher::spawn(Box::new(ConsoleDisplay::stdout(&config.display)));
    let mut controller = LifecycleController::new(
        Arc::new(FeedConnector::new()),
        display,
        Arc::new(TerminalAlert),
        config.clone(),
    )
    .with_metrics(Arc::clone(&metrics));

    let mut tasks = Vec::new();

    // ── 5. Health/metrics server ────────────────────────────
    if config.metrics.enabled {
        let server = HealthServer::new(
            Arc::clone(&metrics),
            controller.connection(),
            config.metrics.bind_address.clone(),
        );
        let server_shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 6. Config hot-reload ────────────────────────────────
    let (mut watcher, config_rx) = ConfigWatcher::new(&config_path, config);
    let watcher_shutdown = shutdown_tx.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown, reload_rx).await {
            error!(error = %e, "Config watcher failed");
        }
    }));
    tasks.push(tokio::spawn(forward_config_changes(config_rx, signal_tx.clone())));

    // ── 7. External signals ─────────────────────────────────
    let reader = CommandReader::new(signal_tx.clone(), reload_tx);
    let stdin_task = tokio::spawn(reader.run(BufReader::new(tokio::io::stdin()), shutdown_tx.subscribe()));
    let ctrl_c_task = tokio::spawn(forward_ctrl_c(signal_tx));

    info!("Ticker running (commands: toggle, screen-on, reload, stop)");

    // ── 8. Controller loop ──────────────────────────────────
    let outcome = controller.run(signal_rx).await;

    // ── Graceful shutdown ───────────────────────────────────
    let _ = shutdown_tx.send(());
    ctrl_c_task.abort();
    stdin_task.abort();

    for task in tasks {
        if tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await.is_err() {
            warn!("Background task did not finish in time");
        }
    }

    info!("Shutdown complete");
    outcome
}

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` overrides `app.log_level`.
fn init_tracing(app: &AppSection) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match app.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

/// Turn every new config snapshot into a `ConfigChanged` signal.
async fn forward_config_changes(
    mut config_rx: watch::Receiver<AppConfig>,
    signals: mpsc::Sender<ControlSignal>,
) {
    while config_rx.changed().await.is_ok() {
        let snapshot = config_rx.borrow_and_update().clone();
        if signals
            .send(ControlSignal::ConfigChanged(Box::new(snapshot)))
            .await
            .is_err()
        {
            break;
        }
    }
}
