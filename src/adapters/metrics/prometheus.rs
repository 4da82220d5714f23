//! Prometheus Metrics Registry - Ticker Observability
//!
//! All metrics are named `bitticker_*` and live in a private registry
//! rendered by the `/metrics` endpoint.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;

use crate::domain::{ConnectionState, FeedError, PriceTick};

/// Centralized Prometheus metrics for the ticker.
pub struct TickerMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Ticks received, by currency.
    pub ticks_total: IntCounterVec,
    /// Feed errors, by `FeedError::kind`.
    pub feed_errors_total: IntCounterVec,
    /// Most recent price, by currency.
    pub last_price: GaugeVec,
    /// Feed connection status (1 = connected, 0 = anything else).
    pub feed_connected: Gauge,
    /// Alert actions executed.
    pub alerts_fired_total: IntCounter,
    /// Failed vibrate / sound calls, by action.
    pub alert_action_failures_total: IntCounterVec,
    /// Feed sessions started after the first one.
    pub feed_restarts_total: IntCounter,
}

impl TickerMetrics {
    /// Create and register all metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = IntCounterVec::new(
            Opts::new("bitticker_ticks_total", "Price ticks received"),
            &["currency"],
        )?;

        let feed_errors_total = IntCounterVec::new(
            Opts::new("bitticker_feed_errors_total", "Feed errors reported"),
            &["kind"],
        )?;

        let last_price = GaugeVec::new(
            Opts::new("bitticker_last_price", "Most recent BTC price"),
            &["currency"],
        )?;

        let feed_connected = Gauge::new(
            "bitticker_feed_connected",
            "Feed connection status (1=connected, 0=disconnected)",
        )?;

        let alerts_fired_total =
            IntCounter::new("bitticker_alerts_fired_total", "Alert actions executed")?;

        let alert_action_failures_total = IntCounterVec::new(
            Opts::new(
                "bitticker_alert_action_failures_total",
                "Alert vibrate/sound calls that failed",
            ),
            &["action"],
        )?;

        let feed_restarts_total =
            IntCounter::new("bitticker_feed_restarts_total", "Feed sessions restarted")?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(feed_errors_total.clone()))?;
        registry.register(Box::new(last_price.clone()))?;
        registry.register(Box::new(feed_connected.clone()))?;
        registry.register(Box::new(alerts_fired_total.clone()))?;
        registry.register(Box::new(alert_action_failures_total.clone()))?;
        registry.register(Box::new(feed_restarts_total.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            feed_errors_total,
            last_price,
            feed_connected,
            alerts_fired_total,
            alert_action_failures_total,
            feed_restarts_total,
        })
    }

    pub fn record_tick(&self, tick: &PriceTick) {
        let currency = tick.currency.code();
        self.ticks_total.with_label_values(&[currency]).inc();
        if let Some(price) = tick.price.to_f64() {
            self.last_price.with_label_values(&[currency]).set(price);
        }
    }

    pub fn record_feed_error(&self, error: &FeedError) {
        self.feed_errors_total.with_label_values(&[error.kind()]).inc();
    }

    pub fn set_connection(&self, state: ConnectionState) {
        self.feed_connected.set(state.as_gauge());
    }

    pub fn record_alert_fired(&self) {
        self.alerts_fired_total.inc();
    }

    pub fn record_action_failure(&self, action: &str) {
        self.alert_action_failures_total.with_label_values(&[action]).inc();
    }

    pub fn record_restart(&self) {
        self.feed_restarts_total.inc();
    }

    /// Encode every metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
