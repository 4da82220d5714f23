//! Control Port - External Lifecycle Signals
//!
//! Inbound signals for the lifecycle controller. Producers (stdin,
//! Ctrl-C, the config watcher) push them into one ordered channel.

use crate::config::AppConfig;

/// External stimulus for the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
  /// The host became visible again; revive the feed if it went stale.
  ScreenOn,
  /// Flip between USD and the local currency.
  ToggleCurrency,
  /// A new config snapshot replaces the current one.
  ConfigChanged(Box<AppConfig>),
  /// Tear everything down and leave the run loop.
  Stop,
}
