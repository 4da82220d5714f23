//! Error taxonomy for the ticker core.
//!
//! Nothing here is fatal to the process: feed errors end up as an error
//! string on the display, sink errors are logged and swallowed. Parse
//! failures on the streaming feed have no type at all, the message is
//! simply dropped.

use thiserror::Error;

/// Transport-level failure reported by a feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Could not establish the connection.
    #[error("connection failed: {reason}")]
    Connect { reason: String },

    /// The peer closed the stream.
    #[error("connection closed: {reason} (code: {})", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Closed { code: Option<u16>, reason: String },

    /// Read or write failure on an open connection.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// A poll request failed or returned a non-success status.
    #[error("request failed: {reason}")]
    Request { status: Option<u16>, reason: String },

    /// A poll response did not contain the expected price.
    #[error("unexpected payload: {reason}")]
    Payload { reason: String },
}

impl FeedError {
    /// Protocol code attached to the failure, if any.
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Closed { code, .. } => *code,
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }

    /// Short label for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Closed { .. } => "closed",
            Self::Transport { .. } => "transport",
            Self::Request { .. } => "request",
            Self::Payload { .. } => "payload",
        }
    }
}

/// Failure inside a display or alert-action sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The required hardware or output is not present.
    #[error("{0} unavailable")]
    Unavailable(&'static str),

    /// The sink tried and failed.
    #[error("sink failed: {0}")]
    Failed(String),

    /// The sink's task or channel is gone.
    #[error("sink closed")]
    Closed,
}
