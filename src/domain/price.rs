//! Core ticker domain types.
//!
//! Defines the price observation flowing through the system, the
//! display currencies, the up/down/flat classification and the text
//! formatting rules for the display sink.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display currency for the ticker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// US dollar (USDT-quoted on the streaming feed).
    #[default]
    Usd,
    /// Chinese yuan, the "local" display currency.
    #[serde(alias = "local")]
    Cny,
}

impl Currency {
    /// The other currency (single-tap toggle).
    pub const fn toggled(self) -> Self {
        match self {
            Self::Usd => Self::Cny,
            Self::Cny => Self::Usd,
        }
    }

    /// Lowercase code used in `vs_currencies` queries and response payloads.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Cny => "cny",
        }
    }

    /// Symbol prefixed in `PriceFormat::Symbol` text.
    pub const fn symbol(self) -> char {
        match self {
            Self::Usd => '$',
            Self::Cny => '¥',
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Cny => write!(f, "CNY"),
        }
    }
}

/// One price observation produced by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTick {
    /// Last trade price.
    pub price: Decimal,
    /// Currency the price is quoted in.
    pub currency: Currency,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl PriceTick {
    /// Tick stamped with the current time.
    pub fn now(price: Decimal, currency: Currency) -> Self {
        Self {
            price,
            currency,
            received_at: Utc::now(),
        }
    }
}

/// Direction of a tick relative to the reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorClass {
    /// Above the reference.
    Up,
    /// Below the reference.
    Down,
    /// Equal to the reference (or no reference yet).
    Flat,
}

/// How a price is rendered as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFormat {
    /// Normalized decimal string: `67000.1`.
    #[default]
    Raw,
    /// Currency symbol and integer part: `$67000`.
    Symbol,
}

impl PriceFormat {
    /// Render `price` for display.
    pub fn format(self, price: Decimal, currency: Currency) -> String {
        match self {
            Self::Raw => price.normalize().to_string(),
            Self::Symbol => format!("{}{}", currency.symbol(), price.trunc()),
        }
    }
}
