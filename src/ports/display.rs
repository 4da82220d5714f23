//! Display Sink Port - Rendering Boundary
//!
//! The display owns whatever presents the price (an overlay, a terminal
//! line). It is driven from a single display task, so implementations
//! take `&mut self` and need not be `Sync`.

use crate::config::DisplayConfig;
use crate::domain::{ColorClass, SinkError};

/// Receives rendered prices and error text.
pub trait DisplaySink: Send + 'static {
  /// Show a price with its up/down/flat class.
  fn show_price(&mut self, text: &str, color: ColorClass) -> Result<(), SinkError>;

  /// Replace the price with an error message.
  fn show_error(&mut self, message: &str) -> Result<(), SinkError>;

  /// Apply new appearance settings to the existing surface.
  fn configure(&mut self, _config: &DisplayConfig) -> Result<(), SinkError> {
    Ok(())
  }

  /// Tear down display resources. Must tolerate being called twice.
  fn release(&mut self) -> Result<(), SinkError>;
}
