//! Terminal Sinks - Display and Alert Adapters for a Console Host
//!
//! - `ConsoleDisplay`: one self-overwriting status line with 24-bit colour
//! - `TerminalAlert`: terminal bell as the notification sound

pub mod console;
pub mod terminal_alert;

pub use console::ConsoleDisplay;
pub use terminal_alert::TerminalAlert;
