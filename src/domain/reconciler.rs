//! Price reconciler - reference-window up/down classification.
//!
//! Keeps the last price and a reference price that is rebased once per
//! comparison window. Every tick is classified against the reference and
//! rendered as display text.
//!
//! Two orderings are supported:
//! - `RebaseFirst`: rebase, then compare. A rebase tick is compared with
//!   itself and is therefore always `Flat`. Default.
//! - `PreviousWindow`: compare against the reference that was in force
//!   when the tick arrived, then rebase.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::{ColorClass, Currency, PriceFormat, PriceTick};

/// Ordering of rebase and comparison on a window boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Rebase before classifying.
    #[default]
    RebaseFirst,
    /// Classify against the previous reference, then rebase.
    PreviousWindow,
}

/// Reconciler state, mutated only by [`PriceReconciler::on_tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Price of the most recent tick.
    pub last_price: Option<Decimal>,
    /// Baseline of the current comparison window.
    pub reference_price: Option<Decimal>,
    /// When the baseline was captured.
    pub reference_set_at: Option<DateTime<Utc>>,
    /// Currency the baseline is quoted in.
    pub reference_currency: Option<Currency>,
}

/// Result of reconciling one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Text for the display sink.
    pub text: String,
    /// Direction relative to the reference.
    pub color: ColorClass,
}

/// Tracks the reference price and classifies ticks.
#[derive(Debug, Clone)]
pub struct PriceReconciler {
    /// Window length in whole seconds.
    interval_secs: i64,
    mode: ComparisonMode,
    format: PriceFormat,
    state: ReconciliationState,
}

impl PriceReconciler {
    pub fn new(interval_secs: u64, mode: ComparisonMode, format: PriceFormat) -> Self {
        Self {
            interval_secs: i64::try_from(interval_secs).unwrap_or(i64::MAX).max(1),
            mode,
            format,
            state: ReconciliationState::default(),
        }
    }

    /// Current state (read-only).
    pub const fn state(&self) -> &ReconciliationState {
        &self.state
    }

    /// Forget the reference and last price.
    pub fn reset(&mut self) {
        self.state = ReconciliationState::default();
    }

    /// Classify `tick`, update the state and render the display text.
    pub fn on_tick(&mut self, tick: &PriceTick) -> Reconciled {
        let price = tick.price;
        let rebase = self.window_expired(tick);

        let color = match self.mode {
            ComparisonMode::RebaseFirst => {
                if rebase {
                    self.rebase(tick);
                }
                classify(price, self.state.reference_price)
            }
            ComparisonMode::PreviousWindow => {
                let baseline = if self.state.reference_currency == Some(tick.currency) {
                    self.state.reference_price
                } else {
                    None
                };
                let color = classify(price, baseline);
                if rebase {
                    self.rebase(tick);
                }
                color
            }
        };

        self.state.last_price = Some(price);

        Reconciled {
            text: self.format.format(price, tick.currency),
            color,
        }
    }

    /// Whether `tick` starts a new comparison window.
    ///
    /// Elapsed time is measured in whole epoch seconds.
    fn window_expired(&self, tick: &PriceTick) -> bool {
        match (self.state.reference_price, self.state.reference_set_at) {
            (Some(_), Some(set_at)) if self.state.reference_currency == Some(tick.currency) => {
                tick.received_at.timestamp() - set_at.timestamp() >= self.interval_secs
            }
            _ => true,
        }
    }

    fn rebase(&mut self, tick: &PriceTick) {
        self.state.reference_price = Some(tick.price);
        self.state.reference_set_at = Some(tick.received_at);
        self.state.reference_currency = Some(tick.currency);
    }
}

fn classify(price: Decimal, reference: Option<Decimal>) -> ColorClass {
    match reference {
        Some(reference) if price > reference => ColorClass::Up,
        Some(reference) if price < reference => ColorClass::Down,
        _ => ColorClass::Flat,
    }
}
