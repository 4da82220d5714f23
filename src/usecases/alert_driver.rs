//! Alert Driver - Repeating Alert Action
//!
//! Wraps the pure [`AlertEvaluator`] with the side effects: on
//! `Activated` the action runs at once and then every second; on
//! `Deactivated` the repeat is dropped before the call returns, so no
//! action can run after the price has left the alert range.
//!
//! The repeat is a plain `Interval` polled by the controller's loop
//! through [`AlertDriver::next_fire`]; there is no separate task to
//! cancel.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::adapters::metrics::TickerMetrics;
use crate::config::AlertConfig;
use crate::domain::{AlertEvaluator, AlertState, AlertThresholds, AlertTransition};
use crate::ports::AlertActionSink;

/// Time between repeated alert actions.
pub const REPEAT_PERIOD: Duration = Duration::from_secs(1);

pub struct AlertDriver {
  evaluator: AlertEvaluator,
  actions: Arc<dyn AlertActionSink>,
  /// Which actions to run and for how long to vibrate.
  config: AlertConfig,
  repeat: Option<Interval>,
  metrics: Option<Arc<TickerMetrics>>,
}

impl AlertDriver {
  pub fn new(config: &AlertConfig, actions: Arc<dyn AlertActionSink>) -> Self {
    Self {
      evaluator: AlertEvaluator::new(AlertThresholds::from(config)),
      actions,
      config: config.clone(),
      repeat: None,
      metrics: None,
    }
  }

  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<TickerMetrics>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub const fn state(&self) -> AlertState {
    self.evaluator.state()
  }

  pub const fn is_repeating(&self) -> bool {
    self.repeat.is_some()
  }

  /// Evaluate a new price and start or stop the repeat on an edge.
  pub async fn on_price(&mut self, price: Decimal) -> AlertTransition {
    let transition = self.evaluator.evaluate(price);

    match transition {
      AlertTransition::Activated => {
        info!(%price, max = %self.config.max_price, min = %self.config.min_price, "Price alert activated");
        self.fire().await;
        let mut repeat = interval_at(Instant::now() + REPEAT_PERIOD, REPEAT_PERIOD);
        repeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.repeat = Some(repeat);
      }
      AlertTransition::Deactivated => {
        info!(%price, "Price alert cleared");
        self.cancel();
      }
      AlertTransition::Unchanged => {}
    }

    transition
  }

  /// Resolves when the next repeated action is due; pending when idle.
  pub async fn next_fire(&mut self) {
    match self.repeat.as_mut() {
      Some(repeat) => {
        repeat.tick().await;
      }
      None => pending().await,
    }
  }

  /// Run the alert action once. Sink failures are logged and counted.
  pub async fn fire(&mut self) {
    if self.config.vibration {
      let duration = Duration::from_millis(self.config.vibration_ms);
      if let Err(e) = self.actions.vibrate(duration).await {
        warn!(error = %e, "Alert vibration failed");
        self.count_failure("vibrate");
      }
    }
    if self.config.sound {
      if let Err(e) = self.actions.play_sound().await {
        warn!(error = %e, "Alert sound failed");
        self.count_failure("sound");
      }
    }

    self.evaluator.record_fire(Utc::now());
    if let Some(metrics) = &self.metrics {
      metrics.record_alert_fired();
    }
    debug!("Alert action fired");
  }

  /// Stop repeating without touching the evaluator.
  pub fn cancel(&mut self) {
    self.repeat = None;
  }

  /// Stop repeating and start over with new thresholds.
  pub fn reset(&mut self, config: &AlertConfig) {
    self.cancel();
    self.evaluator = AlertEvaluator::new(AlertThresholds::from(config));
    self.config = config.clone();
  }

  fn count_failure(&self, action: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.record_action_failure(action);
    }
  }
}
