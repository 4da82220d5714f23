//! Configuration Loader - File Loading and Sanitization
//!
//! Handles loading `config.toml` and rejecting invalid user input at
//! the boundary. Invalid values never reach the core: each offending
//! field falls back to its default and the rejection is logged.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::{
  AppConfig, DEFAULT_ALPHA, DEFAULT_BG_COLOR, DEFAULT_COMPARISON_INTERVAL_SECS,
  DEFAULT_DOWN_COLOR, DEFAULT_FONT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_POLL_INTERVAL_MS,
  DEFAULT_UP_COLOR, FeedConfig,
};

/// A user-entered value that was rejected and replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} = {value:?}: {reason}")]
pub struct ConfigError {
  /// Dotted path of the rejected field (e.g. `alert.max_price`).
  pub field: &'static str,
  /// The rejected value as written.
  pub value: String,
  /// Why it was rejected.
  pub reason: &'static str,
}

/// Load and sanitize configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file can't be read or isn't valid TOML.
/// Out-of-range values are not errors, see [`sanitize`].
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    mode = ?config.feed.mode,
    interval_secs = config.ticker.comparison_interval_seconds,
    alert = config.alert.enabled,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML text into a sanitized snapshot.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let raw: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;

  let (config, rejected) = sanitize(raw);
  for issue in &rejected {
    warn!(field = issue.field, value = %issue.value, reason = issue.reason, "Config value rejected, using default");
  }

  Ok(config)
}

/// Replace every out-of-range field with its default.
///
/// Returns the corrected snapshot and the list of rejected values.
pub fn sanitize(mut config: AppConfig) -> (AppConfig, Vec<ConfigError>) {
  let mut rejected = Vec::new();

  let interval = config.ticker.comparison_interval_seconds;
  if !(1..=60).contains(&interval) {
    rejected.push(ConfigError {
      field: "ticker.comparison_interval_seconds",
      value: interval.to_string(),
      reason: "must be in 1..=60",
    });
    config.ticker.comparison_interval_seconds = DEFAULT_COMPARISON_INTERVAL_SECS;
  }

  sanitize_bound(&mut config.alert.max_price, "alert.max_price", &mut rejected);
  sanitize_bound(&mut config.alert.min_price, "alert.min_price", &mut rejected);

  sanitize_feed(&mut config.feed, &mut rejected);

  let display = &mut config.display;
  if !(12.0..=30.0).contains(&display.font_size) {
    rejected.push(ConfigError {
      field: "display.font_size",
      value: display.font_size.to_string(),
      reason: "must be in 12..=30",
    });
    display.font_size = DEFAULT_FONT_SIZE;
  }
  if !(0.0..=1.0).contains(&display.alpha) {
    rejected.push(ConfigError {
      field: "display.alpha",
      value: display.alpha.to_string(),
      reason: "must be in 0.0..=1.0",
    });
    display.alpha = DEFAULT_ALPHA;
  }
  sanitize_color(&mut display.font_color, "display.font_color", DEFAULT_FONT_COLOR, &mut rejected);
  sanitize_color(&mut display.bg_color, "display.bg_color", DEFAULT_BG_COLOR, &mut rejected);
  sanitize_color(&mut display.up_color, "display.up_color", DEFAULT_UP_COLOR, &mut rejected);
  sanitize_color(&mut display.down_color, "display.down_color", DEFAULT_DOWN_COLOR, &mut rejected);

  if config.watcher.reload_interval_seconds == 0 {
    rejected.push(ConfigError {
      field: "watcher.reload_interval_seconds",
      value: "0".to_string(),
      reason: "must be positive",
    });
    config.watcher.reload_interval_seconds = super::WatcherConfig::default().reload_interval_seconds;
  }

  (config, rejected)
}

fn sanitize_feed(feed: &mut FeedConfig, rejected: &mut Vec<ConfigError>) {
  let defaults = FeedConfig::default();

  if feed.poll_interval_ms == 0 {
    rejected.push(ConfigError {
      field: "feed.poll_interval_ms",
      value: "0".to_string(),
      reason: "must be positive",
    });
    feed.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
  }
  if feed.request_timeout_ms == 0 {
    rejected.push(ConfigError {
      field: "feed.request_timeout_ms",
      value: "0".to_string(),
      reason: "must be positive",
    });
    feed.request_timeout_ms = defaults.request_timeout_ms;
  }
  if feed.backoff_initial_ms == 0 || feed.backoff_initial_ms > feed.backoff_max_ms {
    rejected.push(ConfigError {
      field: "feed.backoff_initial_ms",
      value: feed.backoff_initial_ms.to_string(),
      reason: "must be positive and not above backoff_max_ms",
    });
    feed.backoff_initial_ms = defaults.backoff_initial_ms;
    feed.backoff_max_ms = feed.backoff_max_ms.max(defaults.backoff_initial_ms);
  }
  if feed.ws_url.is_empty() {
    rejected.push(ConfigError {
      field: "feed.ws_url",
      value: String::new(),
      reason: "must not be empty",
    });
    feed.ws_url = defaults.ws_url;
  }
  if feed.rest_url.is_empty() {
    rejected.push(ConfigError {
      field: "feed.rest_url",
      value: String::new(),
      reason: "must not be empty",
    });
    feed.rest_url = defaults.rest_url;
  }
  feed.rest_url = feed.rest_url.trim_end_matches('/').to_string();
  if feed.usd_instrument.is_empty() {
    rejected.push(ConfigError {
      field: "feed.usd_instrument",
      value: String::new(),
      reason: "must not be empty",
    });
    feed.usd_instrument = defaults.usd_instrument;
  }
  if feed.local_instrument.is_empty() {
    rejected.push(ConfigError {
      field: "feed.local_instrument",
      value: String::new(),
      reason: "must not be empty",
    });
    feed.local_instrument = defaults.local_instrument;
  }
}

fn sanitize_bound(bound: &mut Decimal, field: &'static str, rejected: &mut Vec<ConfigError>) {
  if bound.is_sign_negative() && !bound.is_zero() {
    rejected.push(ConfigError {
      field,
      value: bound.to_string(),
      reason: "must be >= 0 (0 disables the bound)",
    });
    *bound = Decimal::ZERO;
  }
}

fn sanitize_color(
  color: &mut String,
  field: &'static str,
  default: &str,
  rejected: &mut Vec<ConfigError>,
) {
  if !is_hex_color(color) {
    rejected.push(ConfigError {
      field,
      value: color.clone(),
      reason: "expected #RRGGBB or #AARRGGBB",
    });
    *color = default.to_string();
  }
}

/// `#RRGGBB` or `#AARRGGBB`.
pub fn is_hex_color(value: &str) -> bool {
  value
    .strip_prefix('#')
    .is_some_and(|hex| matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
