//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (WebSocket, HTTP, terminal, Prometheus).
//!
//! Adapter categories:
//! - `feeds`: OKX streaming and CoinGecko polling price sources
//! - `metrics`: Prometheus metrics export and health checks
//! - `signals`: stdin commands and Ctrl-C
//! - `sinks`: terminal display and alert actions

pub mod feeds;
pub mod metrics;
pub mod signals;
pub mod sinks;
