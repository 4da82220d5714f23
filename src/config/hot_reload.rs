//! Config Hot-Reload - Watch config.toml for Changes
//!
//! Periodically re-reads config.toml and compares its content hash with
//! the last loaded version. A change produces a brand-new snapshot on a
//! `tokio::sync::watch` channel; the controller treats every new
//! snapshot as a full restart, never as an in-place edit.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;

/// Watches config.toml for changes and broadcasts new snapshots.
///
/// Polls the file instead of using a filesystem watcher, which has
/// portability issues across Linux/macOS/Docker volumes.
pub struct ConfigWatcher {
    /// Path to config.toml.
    config_path: String,
    /// Watch channel sender for config updates.
    config_tx: watch::Sender<AppConfig>,
    /// Hash of the last successfully loaded file content.
    last_hash: Option<u64>,
    /// Time between checks.
    interval: Duration,
}

impl ConfigWatcher {
    /// Create a new config watcher.
    ///
    /// Returns the watcher and a `watch::Receiver` that consumers
    /// can use to get notified of config changes.
    pub fn new(config_path: &str, initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let interval = Duration::from_secs(initial_config.watcher.reload_interval_seconds.max(1));
        let (config_tx, config_rx) = watch::channel(initial_config);

        let watcher = Self {
            config_path: config_path.to_string(),
            config_tx,
            last_hash: None,
            interval,
        };

        (watcher, config_rx)
    }

    /// Run the config watcher loop.
    ///
    /// Checks the file every interval, or immediately when `force_rx`
    /// receives a request. Runs until shutdown.
    #[instrument(skip(self, shutdown_rx, force_rx))]
    pub async fn run(
        &mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
        mut force_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        info!(
            path = %self.config_path,
            interval_secs = self.interval.as_secs(),
            "Config watcher started"
        );

        self.last_hash = self.compute_hash().await;
        let mut force_open = true;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Config watcher shutting down");
                    return Ok(());
                }
                forced = force_rx.recv(), if force_open => {
                    match forced {
                        Some(()) => self.reload(true).await,
                        None => force_open = false,
                    }
                }
                () = tokio::time::sleep(self.interval) => {
                    self.reload(false).await;
                }
            }
        }
    }

    /// Reload if the file changed (or unconditionally when forced).
    async fn reload(&mut self, forced: bool) {
        let new_hash = self.compute_hash().await;

        if !forced && new_hash == self.last_hash {
            debug!("Config unchanged");
            return;
        }

        info!(forced, "Reloading config");

        match super::loader::load_config(&self.config_path) {
            Ok(new_config) => {
                self.last_hash = new_hash;
                if self.config_tx.send(new_config).is_err() {
                    warn!("No config watchers, update dropped");
                } else {
                    info!("Config reloaded successfully");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload config, keeping current");
            }
        }
    }

    /// Hash of the config file contents for diff detection.
    async fn compute_hash(&self) -> Option<u64> {
        let content = tokio::fs::read_to_string(&self.config_path).await.ok()?;

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Some(hasher.finish())
    }
}
