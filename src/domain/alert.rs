//! Price-threshold alert evaluation.
//!
//! The alert condition holds while alerting is enabled, at least one
//! bound is configured, and the price is at or beyond a bound. A zero
//! bound is disabled. Only edges (inactive → active, active → inactive)
//! are reported; the repeating action itself lives in the alert driver.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::AlertConfig;

/// Alert thresholds taken from the config snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    /// Master switch.
    pub enabled: bool,
    /// Upper bound, zero disables it.
    pub max_price: Decimal,
    /// Lower bound, zero disables it.
    pub min_price: Decimal,
}

impl AlertThresholds {
    /// Whether the evaluator can ever activate.
    pub fn is_armed(&self) -> bool {
        self.enabled && !(self.max_price.is_zero() && self.min_price.is_zero())
    }

    /// Whether `price` satisfies the alert condition.
    pub fn is_breached(&self, price: Decimal) -> bool {
        self.is_armed()
            && ((self.max_price > Decimal::ZERO && price >= self.max_price)
                || (self.min_price > Decimal::ZERO && price <= self.min_price))
    }
}

impl From<&AlertConfig> for AlertThresholds {
    fn from(config: &AlertConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_price: config.max_price,
            min_price: config.min_price,
        }
    }
}

/// Evaluator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    /// Condition currently holds.
    pub active: bool,
    /// Last time the alert action ran.
    pub last_fired_at: Option<DateTime<Utc>>,
}

/// Edge reported by [`AlertEvaluator::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// Condition started holding: fire now and start repeating.
    Activated,
    /// Condition stopped holding: cancel the repeat.
    Deactivated,
    /// No edge.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    state: AlertState,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            state: AlertState::default(),
        }
    }

    pub const fn state(&self) -> AlertState {
        self.state
    }

    pub const fn is_active(&self) -> bool {
        self.state.active
    }

    pub const fn thresholds(&self) -> AlertThresholds {
        self.thresholds
    }

    /// Evaluate a new price and update `active`.
    pub fn evaluate(&mut self, price: Decimal) -> AlertTransition {
        let holds = self.thresholds.is_breached(price);

        match (self.state.active, holds) {
            (false, true) => {
                self.state.active = true;
                AlertTransition::Activated
            }
            (true, false) => {
                self.state.active = false;
                AlertTransition::Deactivated
            }
            _ => AlertTransition::Unchanged,
        }
    }

    /// Record that the alert action ran.
    pub fn record_fire(&mut self, at: DateTime<Utc>) {
        self.state.last_fired_at = Some(at);
    }

    /// Back to inactive, keeping the thresholds.
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }
}
