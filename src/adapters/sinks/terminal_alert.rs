//! Terminal Alert - Bell-based Alert Action
//!
//! A terminal has no vibration motor, so `vibrate` always reports the
//! hardware as unavailable; the controller logs that and still plays
//! the sound. The sound is the ASCII bell written to stderr.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::SinkError;
use crate::ports::AlertActionSink;

/// Alert sink for console hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalAlert;

#[async_trait]
impl AlertActionSink for TerminalAlert {
    async fn vibrate(&self, duration: Duration) -> Result<(), SinkError> {
        debug!(?duration, "Vibration requested on a terminal host");
        Err(SinkError::Unavailable("vibration motor"))
    }

    async fn play_sound(&self) -> Result<(), SinkError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")
            .and_then(|()| err.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}
