//! Lifecycle Controller - Single Control Loop for the Ticker
//!
//! Owns the feed session, the reconciler, the alert driver and the
//! reconnect policy, and reacts to four sources in one `select!`:
//! external signals, feed updates, the alert repeat and the reconnect
//! timer. Everything the controller owns is touched only from this
//! loop, so no locks are needed.
//!
//! Lifecycle: `Stopped → Starting → Running → Stopped`. `Starting`
//! becomes `Running` when the feed first reports `Connected`.

use std::future::pending;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

use super::alert_driver::AlertDriver;
use super::display_dispatch::DisplayDispatcher;
use super::reconnect::Reconnector;
use crate::adapters::metrics::TickerMetrics;
use crate::config::AppConfig;
use crate::domain::{
  AlertState, ConnectionState, Currency, FeedError, PriceReconciler, PriceTick, ReconciliationState,
};
use crate::ports::{AlertActionSink, ControlSignal, FeedEvent, FeedHandle, FeedUpdate, PriceFeed};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
  Stopped,
  Starting,
  Running,
}

pub struct LifecycleController {
  /// Strategy used to open feed sessions.
  feeds: Arc<dyn PriceFeed>,
  /// Marshals updates onto the display task.
  display: DisplayDispatcher,
  alerts: AlertDriver,
  reconciler: PriceReconciler,
  reconnect: Reconnector,
  /// Current config snapshot. Replaced wholesale, never edited.
  config: AppConfig,
  /// Currency shown now; survives restarts.
  currency: Currency,
  state: ControllerState,
  /// Live feed session, if any.
  feed: Option<FeedHandle>,
  /// The session's event sequence has ended.
  feed_ended: bool,
  /// Number of sessions opened so far.
  sessions: u64,
  display_released: bool,
  /// Published connection state for health probes.
  connection_tx: watch::Sender<ConnectionState>,
  metrics: Option<Arc<TickerMetrics>>,
}

impl LifecycleController {
  pub fn new(
    feeds: Arc<dyn PriceFeed>,
    display: DisplayDispatcher,
    actions: Arc<dyn AlertActionSink>,
    config: AppConfig,
  ) -> Self {
    let (connection_tx, _) = watch::channel(ConnectionState::Disconnected);

    Self {
      feeds,
      display,
      alerts: AlertDriver::new(&config.alert, actions),
      reconciler: reconciler_for(&config),
      reconnect: Reconnector::from_config(&config.feed),
      currency: config.ticker.display_currency,
      config,
      state: ControllerState::Stopped,
      feed: None,
      feed_ended: false,
      sessions: 0,
      display_released: false,
      connection_tx,
      metrics: None,
    }
  }

  /// Report ticks, errors, alerts and restarts to `metrics`.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<TickerMetrics>) -> Self {
    self.alerts = self.alerts.with_metrics(Arc::clone(&metrics));
    self.metrics = Some(metrics);
    self
  }

  pub const fn state(&self) -> ControllerState {
    self.state
  }

  pub const fn currency(&self) -> Currency {
    self.currency
  }

  pub const fn config(&self) -> &AppConfig {
    &self.config
  }

  pub const fn reconciliation(&self) -> &ReconciliationState {
    self.reconciler.state()
  }

  pub const fn alert_state(&self) -> AlertState {
    self.alerts.state()
  }

  /// Subscribe to the feed's connection state.
  pub fn connection(&self) -> watch::Receiver<ConnectionState> {
    self.connection_tx.subscribe()
  }

  /// Reset reconciler and alert state and open a fresh feed session.
  ///
  /// A running session is stopped first.
  #[instrument(skip(self), fields(currency = %self.currency))]
  pub async fn start(&mut self) {
    self.reconnect.cancel();
    self.reconnect.reset();
    self.open_session().await;
  }

  /// Tear everything down. Safe to call any number of times.
  ///
  /// Every step runs even when an earlier one fails.
  #[instrument(skip(self))]
  pub async fn stop(&mut self) {
    if self.state == ControllerState::Stopped && self.feed.is_none() && self.display_released {
      debug!("Controller already stopped");
      return;
    }

    self.alerts.cancel();
    self.reconnect.cancel();
    self.close_session().await;

    if !self.display_released {
      self.display_released = true;
      if let Err(e) = self.display.release().await {
        warn!(error = %e, "Display release failed");
      }
    }

    self.state = ControllerState::Stopped;
    info!("Ticker stopped");
  }

  /// Start (if needed) and process signals until `Stop` or until the
  /// signal channel closes, then stop.
  #[instrument(skip_all)]
  pub async fn run(&mut self, mut signals: mpsc::Receiver<ControlSignal>) -> Result<()> {
    if self.feed.is_none() {
      self.start().await;
    }

    loop {
      tokio::select! {
        biased;
        signal = signals.recv() => {
          match signal {
            Some(ControlSignal::Stop) | None => break,
            Some(ControlSignal::ScreenOn) => self.on_screen_on().await,
            Some(ControlSignal::ToggleCurrency) => self.toggle_currency().await,
            Some(ControlSignal::ConfigChanged(config)) => self.apply_config(*config).await,
          }
        }
        update = next_feed_update(self.feed.as_mut()), if !self.feed_ended => {
          self.on_feed_update(update).await;
        }
        () = self.alerts.next_fire() => {
          self.alerts.fire().await;
        }
        () = self.reconnect.wait() => {
          info!(attempt = self.reconnect.attempt(), "Restarting feed after backoff");
          self.open_session().await;
        }
      }
    }

    self.stop().await;
    Ok(())
  }

  /// Host became visible again.
  ///
  /// The feed is restarted when the session had reached `Connected` at
  /// some point or has already ended; a session still connecting is
  /// left alone. The display is reused as is.
  pub async fn on_screen_on(&mut self) {
    let restart = match &self.feed {
      None => true,
      Some(handle) => self.feed_ended || handle.was_connected(),
    };

    if restart {
      info!("Screen on, restarting feed");
      self.start().await;
    } else {
      debug!("Screen on while feed is still connecting");
    }
  }

  /// Flip the display currency and tell the live session.
  pub async fn toggle_currency(&mut self) {
    self.currency = self.currency.toggled();
    info!(currency = %self.currency, "Display currency toggled");

    if self.feed_ended {
      return;
    }
    if let Some(handle) = &self.feed {
      if let Err(e) = handle.set_currency(self.currency).await {
        warn!(error = %e, "Currency change not delivered to feed");
      }
    }
  }

  /// Replace the config snapshot and restart from scratch.
  #[instrument(skip_all)]
  pub async fn apply_config(&mut self, config: AppConfig) {
    if config.ticker.display_currency != self.config.ticker.display_currency {
      self.currency = config.ticker.display_currency;
    }
    if config.display != self.config.display {
      self.display.configure(config.display.clone()).await;
    }

    self.reconnect = Reconnector::from_config(&config.feed);
    self.config = config;
    info!(mode = ?self.config.feed.mode, "Config snapshot applied, restarting feed");
    self.start().await;
  }

  async fn on_feed_update(&mut self, update: FeedUpdate) {
    match update {
      FeedUpdate::Event(FeedEvent::Tick(tick)) => self.on_tick(tick).await,
      FeedUpdate::Event(FeedEvent::Error(error)) => self.on_feed_error(error).await,
      FeedUpdate::State(state) => self.on_connection_state(state),
      FeedUpdate::Ended => {
        self.feed_ended = true;
        // No feed behind the last price: stop repeating and re-arm from inactive.
        self.alerts.reset(&self.config.alert);
        self.on_connection_state(ConnectionState::Disconnected);
        match self.reconnect.schedule() {
          Some(delay) => info!(?delay, "Feed ended, restart scheduled"),
          None => info!("Feed ended, waiting for screen-on or config change"),
        }
      }
    }
  }

  async fn on_tick(&mut self, tick: PriceTick) {
    if tick.currency != self.currency {
      debug!(currency = %tick.currency, "Dropping tick for previous currency");
      return;
    }
    if let Some(metrics) = &self.metrics {
      metrics.record_tick(&tick);
    }
    self.reconnect.reset();

    let reconciled = self.reconciler.on_tick(&tick);
    debug!(price = %tick.price, color = ?reconciled.color, "Tick reconciled");
    self.display.show_price(reconciled.text, reconciled.color).await;
    self.alerts.on_price(tick.price).await;
  }

  async fn on_feed_error(&mut self, error: FeedError) {
    warn!(error = %error, kind = error.kind(), code = ?error.code(), "Feed error");
    if let Some(metrics) = &self.metrics {
      metrics.record_feed_error(&error);
    }
    self.display.show_error(error.to_string()).await;
  }

  fn on_connection_state(&mut self, state: ConnectionState) {
    debug!(%state, "Feed connection state");
    self.connection_tx.send_replace(state);
    if let Some(metrics) = &self.metrics {
      metrics.set_connection(state);
    }
    if state == ConnectionState::Connected && self.state == ControllerState::Starting {
      self.state = ControllerState::Running;
      info!(feed = self.feeds.name(), "Ticker running");
    }
  }

  /// Stop the current session (if any), reset state, open a new one.
  async fn open_session(&mut self) {
    self.close_session().await;

    self.reconciler = reconciler_for(&self.config);
    self.alerts.reset(&self.config.alert);

    self.sessions += 1;
    if self.sessions > 1 {
      if let Some(metrics) = &self.metrics {
        metrics.record_restart();
      }
    }

    self.feed = Some(self.feeds.start(&self.config.feed, self.currency));
    self.feed_ended = false;
    self.display_released = false;
    self.state = ControllerState::Starting;
    info!(feed = self.feeds.name(), currency = %self.currency, session = self.sessions, "Feed session started");
  }

  async fn close_session(&mut self) {
    if let Some(handle) = self.feed.take() {
      if let Err(e) = handle.stop().await {
        warn!(error = %e, "Feed did not stop cleanly");
      }
      self.on_connection_state(ConnectionState::Disconnected);
    }
    self.feed_ended = false;
  }
}

fn reconciler_for(config: &AppConfig) -> PriceReconciler {
  PriceReconciler::new(
    config.ticker.comparison_interval_seconds,
    config.ticker.comparison,
    config.ticker.price_format,
  )
}

async fn next_feed_update(feed: Option<&mut FeedHandle>) -> FeedUpdate {
  match feed {
    Some(handle) => handle.next_update().await,
    None => pending().await,
  }
}
