//! Price Feed Port - Live Price Source Interface
//!
//! A feed is started with a config snapshot and a display currency and
//! hands back a [`FeedHandle`]. The handle yields an ordered sequence of
//! ticks and errors plus connection-state changes; once the sequence
//! has ended the handle is spent and a fresh `start` is required.
//! Retrying is never the feed's job.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::FeedConfig;
use crate::domain::{ConnectionState, Currency, FeedError, PriceTick};

/// Capacity of the feed → controller event channel.
const EVENT_BUFFER: usize = 1024;

/// Capacity of the controller → feed command channel.
const COMMAND_BUFFER: usize = 16;

/// How long `stop` waits for the feed task before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Event emitted by a running feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
  /// A new price.
  Tick(PriceTick),
  /// A reported failure (the sequence may or may not continue).
  Error(FeedError),
}

/// Command sent from the controller to a running feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
  /// Switch the subscribed instrument / polled currency.
  SetCurrency(Currency),
  /// Close the connection and end the sequence.
  Shutdown,
}

/// What [`FeedHandle::next_update`] resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
  /// Tick or error, in arrival order.
  Event(FeedEvent),
  /// The feed's connection state changed.
  State(ConnectionState),
  /// The sequence is over.
  Ended,
}

/// Trait for live price sources.
///
/// Implementors spawn their I/O on the tokio runtime and return
/// immediately; connection progress is reported through the handle.
pub trait PriceFeed: Send + Sync + 'static {
  /// Short name for logs.
  fn name(&self) -> &'static str;

  /// Start a new feed session.
  fn start(&self, config: &FeedConfig, currency: Currency) -> FeedHandle;
}

/// Feed-task side of a [`FeedHandle`].
pub struct FeedTaskIo {
  /// Ticks and errors towards the controller.
  pub events: mpsc::Sender<FeedEvent>,
  /// Commands from the controller.
  pub commands: mpsc::Receiver<FeedCommand>,
  /// Published connection state.
  pub state: watch::Sender<ConnectionState>,
}

impl FeedTaskIo {
  /// Deliver an event. Returns `false` once the controller has gone away.
  pub async fn emit(&self, event: FeedEvent) -> bool {
    self.events.send(event).await.is_ok()
  }

  /// Publish a connection state.
  pub fn set_state(&self, state: ConnectionState) {
    self.state.send_replace(state);
  }
}

/// Controller side of one feed session.
pub struct FeedHandle {
  events: mpsc::Receiver<FeedEvent>,
  commands: mpsc::Sender<FeedCommand>,
  state: watch::Receiver<ConnectionState>,
  state_open: bool,
  was_connected: bool,
  task: Option<JoinHandle<()>>,
}

impl FeedHandle {
  /// Create a connected handle / task-io pair with no task attached.
  pub fn pair() -> (Self, FeedTaskIo) {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let handle = Self {
      events: events_rx,
      commands: commands_tx,
      state: state_rx,
      state_open: true,
      was_connected: false,
      task: None,
    };
    let io = FeedTaskIo {
      events: events_tx,
      commands: commands_rx,
      state: state_tx,
    };

    (handle, io)
  }

  /// Spawn `run` as the feed task and return its handle.
  pub fn spawn<F, Fut>(run: F) -> Self
  where
    F: FnOnce(FeedTaskIo) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let (mut handle, io) = Self::pair();
    handle.task = Some(tokio::spawn(run(io)));
    handle
  }

  /// A handle whose sequence is a single error followed by the end.
  pub fn failed(error: FeedError) -> Self {
    let (handle, io) = Self::pair();
    // Fresh channel with spare capacity, cannot fail.
    let _ = io.events.try_send(FeedEvent::Error(error));
    handle
  }

  /// Last published connection state.
  pub fn connection_state(&self) -> ConnectionState {
    *self.state.borrow()
  }

  /// Whether this session ever reached `Connected`.
  pub const fn was_connected(&self) -> bool {
    self.was_connected
  }

  /// Wait for the next event or state change.
  ///
  /// Events are returned in arrival order. After `Ended` every further
  /// call returns `Ended` again.
  pub async fn next_update(&mut self) -> FeedUpdate {
    loop {
      tokio::select! {
        biased;
        event = self.events.recv() => {
          return event.map_or(FeedUpdate::Ended, FeedUpdate::Event);
        }
        changed = self.state.changed(), if self.state_open => {
          if changed.is_ok() {
            let state = *self.state.borrow_and_update();
            if state == ConnectionState::Connected {
              self.was_connected = true;
            }
            return FeedUpdate::State(state);
          }
          self.state_open = false;
        }
      }
    }
  }

  /// Forward a currency toggle to the feed task.
  pub async fn set_currency(&self, currency: Currency) -> Result<()> {
    self
      .commands
      .send(FeedCommand::SetCurrency(currency))
      .await
      .map_err(|_| anyhow!("feed task is no longer running"))
  }

  /// Ask the feed to close and wait for its task.
  ///
  /// The task is aborted if it does not finish within 5 seconds.
  pub async fn stop(mut self) -> Result<()> {
    let _ = self.commands.try_send(FeedCommand::Shutdown);

    let Some(mut task) = self.task.take() else {
      return Ok(());
    };

    match tokio::time::timeout(STOP_TIMEOUT, &mut task).await {
      Ok(Ok(())) => {
        debug!("Feed task joined");
        Ok(())
      }
      Ok(Err(e)) => Err(anyhow!("feed task failed: {e}")),
      Err(_) => {
        task.abort();
        Err(anyhow!("feed task did not stop within {STOP_TIMEOUT:?}, aborted"))
      }
    }
  }
}

impl Drop for FeedHandle {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}
