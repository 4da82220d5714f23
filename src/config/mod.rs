//! Configuration Module - TOML-based Ticker Configuration
//!
//! The whole `AppConfig` is the Config Snapshot: it is read once at
//! startup, passed by value into the controller and replaced wholesale
//! whenever `config.toml` changes. No component mutates it in place.
//! Every section has defaults so a partial file is still valid.

pub mod hot_reload;
pub mod loader;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::price::{Currency, PriceFormat};
use crate::domain::reconciler::ComparisonMode;

/// Top-level ticker configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
  /// Process identity and logging.
  pub app: AppSection,
  /// Price source selection and endpoints.
  pub feed: FeedConfig,
  /// Reference-price comparison and text formatting.
  pub ticker: TickerConfig,
  /// Price-threshold alerting.
  pub alert: AlertConfig,
  /// Appearance handed to the display sink.
  pub display: DisplayConfig,
  /// Prometheus metrics and health probes.
  pub metrics: MetricsConfig,
  /// Config file reload cadence.
  pub watcher: WatcherConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSection {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  /// Log output format.
  pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
  /// Structured JSON lines.
  #[default]
  Json,
  /// Human-readable, coloured output.
  Pretty,
}

/// How the live price is obtained.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
  /// Persistent WebSocket ticker subscription.
  #[default]
  Streaming,
  /// Periodic REST request.
  Polling,
}

/// What the controller does after a feed sequence ends.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectMode {
  /// Only restart on an external signal (screen on, config change).
  #[default]
  OnSignal,
  /// Restart automatically with capped exponential backoff.
  Backoff,
}

/// Feed connector configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
  /// Streaming or polling strategy.
  pub mode: FeedMode,
  /// Public ticker WebSocket endpoint.
  pub ws_url: String,
  /// REST API base URL (without trailing slash).
  pub rest_url: String,
  /// Asset identifier for the `ids` query parameter.
  pub asset_id: String,
  /// Instrument subscribed while displaying USD.
  pub usd_instrument: String,
  /// Instrument subscribed while displaying the local currency.
  pub local_instrument: String,
  /// Interval between polls (milliseconds).
  pub poll_interval_ms: u64,
  /// Per-request timeout for polling (milliseconds).
  pub request_timeout_ms: u64,
  /// Restart policy after the feed sequence ends.
  pub reconnect: ReconnectMode,
  /// First backoff delay (milliseconds).
  pub backoff_initial_ms: u64,
  /// Backoff ceiling (milliseconds).
  pub backoff_max_ms: u64,
}

impl FeedConfig {
  /// Instrument symbol to subscribe for a display currency.
  pub fn instrument_for(&self, currency: Currency) -> &str {
    match currency {
      Currency::Usd => &self.usd_instrument,
      Currency::Cny => &self.local_instrument,
    }
  }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TickerConfig {
  /// Length of the comparison window in seconds (1..=60).
  pub comparison_interval_seconds: u64,
  /// Currency shown at startup.
  pub display_currency: Currency,
  /// Text rendering of the price.
  pub price_format: PriceFormat,
  /// Rebase-then-compare (default) or compare-then-rebase.
  pub comparison: ComparisonMode,
}

/// Threshold alert configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AlertConfig {
  /// Master switch.
  pub enabled: bool,
  /// Upper bound, 0 disables it.
  pub max_price: Decimal,
  /// Lower bound, 0 disables it.
  pub min_price: Decimal,
  /// Vibrate on every alert action.
  pub vibration: bool,
  /// Play the notification sound on every alert action.
  pub sound: bool,
  /// Length of one vibration pulse (milliseconds).
  pub vibration_ms: u64,
}

/// Appearance settings forwarded to the display sink.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
  /// Font size (12..=30).
  pub font_size: f32,
  /// Background opacity (0.0..=1.0).
  pub alpha: f32,
  /// Text colour for flat ticks and errors.
  pub font_color: String,
  /// Background colour.
  pub bg_color: String,
  /// Colour for upward ticks.
  pub up_color: String,
  /// Colour for downward ticks.
  pub down_color: String,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
  /// Serve `/metrics`, `/live` and `/ready`.
  pub enabled: bool,
  /// Server bind address.
  pub bind_address: String,
}

/// Config hot-reload configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatcherConfig {
  /// Seconds between config file checks.
  pub reload_interval_seconds: u64,
}

// Defaults

pub const DEFAULT_COMPARISON_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_ALPHA: f32 = 0.7;
pub const DEFAULT_FONT_COLOR: &str = "#FFFFFF";
pub const DEFAULT_BG_COLOR: &str = "#000000";
pub const DEFAULT_UP_COLOR: &str = "#00FF00";
pub const DEFAULT_DOWN_COLOR: &str = "#FF0000";

impl Default for AppSection {
  fn default() -> Self {
    Self {
      name: "bitticker".to_string(),
      log_level: "info".to_string(),
      log_format: LogFormat::Json,
    }
  }
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      mode: FeedMode::Streaming,
      ws_url: "wss://ws.okx.com:8443/ws/v5/public".to_string(),
      rest_url: "https://api.coingecko.com/api/v3".to_string(),
      asset_id: "bitcoin".to_string(),
      usd_instrument: "BTC-USDT".to_string(),
      local_instrument: "BTC-USDT".to_string(),
      poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
      request_timeout_ms: 10_000,
      reconnect: ReconnectMode::OnSignal,
      backoff_initial_ms: 1_000,
      backoff_max_ms: 60_000,
    }
  }
}

impl Default for TickerConfig {
  fn default() -> Self {
    Self {
      comparison_interval_seconds: DEFAULT_COMPARISON_INTERVAL_SECS,
      display_currency: Currency::Usd,
      price_format: PriceFormat::Raw,
      comparison: ComparisonMode::RebaseFirst,
    }
  }
}

impl Default for AlertConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      max_price: Decimal::ZERO,
      min_price: Decimal::ZERO,
      vibration: true,
      sound: true,
      vibration_ms: 200,
    }
  }
}

impl Default for DisplayConfig {
  fn default() -> Self {
    Self {
      font_size: DEFAULT_FONT_SIZE,
      alpha: DEFAULT_ALPHA,
      font_color: DEFAULT_FONT_COLOR.to_string(),
      bg_color: DEFAULT_BG_COLOR.to_string(),
      up_color: DEFAULT_UP_COLOR.to_string(),
      down_color: DEFAULT_DOWN_COLOR.to_string(),
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9090".to_string(),
    }
  }
}

impl Default for WatcherConfig {
  fn default() -> Self {
    Self {
      reload_interval_seconds: 60,
    }
  }
}
