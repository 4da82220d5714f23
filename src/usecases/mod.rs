//! Use Cases Layer - Application Logic
//!
//! Orchestrates the domain state machines with the port interfaces.
//!
//! Use cases:
//! - `LifecycleController`: the single control loop
//! - `AlertDriver`: immediate + repeating alert action
//! - `DisplayDispatcher`: display-affinity task owning the sink
//! - `Reconnector`: restart policy after a feed ends

pub mod alert_driver;
pub mod controller;
pub mod display_dispatch;
pub mod reconnect;

pub use alert_driver::AlertDriver;
pub use controller::{ControllerState, LifecycleController};
pub use display_dispatch::DisplayDispatcher;
pub use reconnect::Reconnector;
