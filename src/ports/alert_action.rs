//! Alert Action Port - Vibration and Sound Boundary
//!
//! One alert action is a vibration pulse and/or a notification sound.
//! Failures (missing hardware, audio device busy) are returned to the
//! caller, which logs them and carries on.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::SinkError;

/// Performs the physical side of an alert.
#[async_trait]
pub trait AlertActionSink: Send + Sync + 'static {
  /// Vibrate for `duration`.
  async fn vibrate(&self, duration: Duration) -> Result<(), SinkError>;

  /// Play the default notification sound.
  async fn play_sound(&self) -> Result<(), SinkError>;
}
