//! Metrics and Monitoring Adapters
//!
//! Prometheus registry plus the axum server exposing `/live`, `/ready`
//! and `/metrics` on `metrics.bind_address`.

pub mod health;
pub mod prometheus;

pub use health::HealthServer;
pub use self::prometheus::TickerMetrics;
