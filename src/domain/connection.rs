//! Feed connection state, as published by a running feed task.

use serde::Serialize;

/// Lifecycle of one feed connection.
///
/// Owned by the feed task; everyone else only reads it through a
/// `watch::Receiver`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    /// No connection (initial, or after close/failure).
    #[default]
    Disconnected,
    /// Connect or first request in progress.
    Connecting,
    /// Receiving prices.
    Connected,
    /// Close requested, waiting for the transport to finish.
    Closing,
}

impl ConnectionState {
    /// Numeric form for the `feed_connected` gauge.
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Connected => 1.0,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}
