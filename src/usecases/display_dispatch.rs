//! Display Dispatch - Display-affinity Task
//!
//! The display sink is owned by one dedicated task. The controller never
//! touches the sink directly; it posts `DisplayUpdate`s over an ordered
//! channel, so updates are applied in the order ticks were reconciled.
//! Sink failures are logged on the display task and never reach the
//! controller, except for `release`, whose outcome is reported back.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::DisplayConfig;
use crate::domain::{ColorClass, SinkError};
use crate::ports::DisplaySink;

/// Capacity of the controller → display channel.
const DISPLAY_BUFFER: usize = 64;

/// One instruction for the display task.
#[derive(Debug)]
pub enum DisplayUpdate {
  Price { text: String, color: ColorClass },
  Error(String),
  Configure(Box<DisplayConfig>),
  Release(oneshot::Sender<Result<(), SinkError>>),
}

/// Controller-side handle to the display task.
///
/// The task ends once the dispatcher is dropped.
pub struct DisplayDispatcher {
  tx: mpsc::Sender<DisplayUpdate>,
  task: JoinHandle<()>,
}

impl DisplayDispatcher {
  /// Move `sink` onto its own task.
  pub fn spawn(sink: Box<dyn DisplaySink>) -> Self {
    let (tx, rx) = mpsc::channel(DISPLAY_BUFFER);
    let task = tokio::spawn(run_display(sink, rx));
    Self { tx, task }
  }

  pub async fn show_price(&self, text: String, color: ColorClass) {
    self.post(DisplayUpdate::Price { text, color }).await;
  }

  pub async fn show_error(&self, message: String) {
    self.post(DisplayUpdate::Error(message)).await;
  }

  pub async fn configure(&self, config: DisplayConfig) {
    self.post(DisplayUpdate::Configure(Box::new(config))).await;
  }

  /// Release the sink and wait for the outcome.
  pub async fn release(&self) -> Result<(), SinkError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tx
      .send(DisplayUpdate::Release(reply_tx))
      .await
      .map_err(|_| SinkError::Closed)?;
    reply_rx.await.map_err(|_| SinkError::Closed)?
  }

  /// Whether the display task is still alive.
  pub fn is_running(&self) -> bool {
    !self.task.is_finished()
  }

  async fn post(&self, update: DisplayUpdate) {
    if self.tx.send(update).await.is_err() {
      debug!("Display task gone, update dropped");
    }
  }
}

async fn run_display(mut sink: Box<dyn DisplaySink>, mut rx: mpsc::Receiver<DisplayUpdate>) {
  while let Some(update) = rx.recv().await {
    let result = match update {
      DisplayUpdate::Price { text, color } => sink.show_price(&text, color),
      DisplayUpdate::Error(message) => sink.show_error(&message),
      DisplayUpdate::Configure(config) => sink.configure(&config),
      DisplayUpdate::Release(reply) => {
        let _ = reply.send(sink.release());
        continue;
      }
    };
    if let Err(e) = result {
      warn!(error = %e, "Display sink update failed");
    }
  }
  debug!("Display task finished");
}
