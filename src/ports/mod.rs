//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PriceFeed`: live price source (streaming or polling)
//! - `DisplaySink`: rendering of price and error text
//! - `AlertActionSink`: vibration / notification sound
//! - `ControlSignal`: external lifecycle stimuli for the controller

pub mod alert_action;
pub mod control;
pub mod display;
pub mod price_feed;

pub use alert_action::AlertActionSink;
pub use control::ControlSignal;
pub use display::DisplaySink;
pub use price_feed::{FeedCommand, FeedEvent, FeedHandle, FeedTaskIo, FeedUpdate, PriceFeed};
