//! Domain layer - Core ticker logic and models.
//!
//! Pure, synchronous state machines with no I/O: the reconciler and the
//! alert evaluator can be driven tick by tick in tests and benches.

pub mod alert;
pub mod connection;
pub mod errors;
pub mod price;
pub mod reconciler;

// Re-export core types for convenience
pub use alert::{AlertEvaluator, AlertState, AlertThresholds, AlertTransition};
pub use connection::ConnectionState;
pub use errors::{FeedError, SinkError};
pub use price::{ColorClass, Currency, PriceFormat, PriceTick};
pub use reconciler::{ComparisonMode, PriceReconciler, Reconciled, ReconciliationState};
