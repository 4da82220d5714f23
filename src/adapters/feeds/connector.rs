//! Feed Connector - Strategy Selection for the Price Feed
//!
//! Picks the streaming or polling adapter from the snapshot's
//! `feed.mode` on every start, so a config swap can change strategy
//! without rebuilding the controller.

use tracing::info;

use super::coingecko::CoinGeckoFeed;
use super::okx::OkxTickerFeed;
use crate::config::{FeedConfig, FeedMode};
use crate::domain::Currency;
use crate::ports::{FeedHandle, PriceFeed};

/// Dispatches `start` to the strategy named in the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedConnector {
    streaming: OkxTickerFeed,
    polling: CoinGeckoFeed,
}

impl FeedConnector {
    pub const fn new() -> Self {
        Self {
            streaming: OkxTickerFeed,
            polling: CoinGeckoFeed,
        }
    }

    /// The adapter used for `mode`.
    pub fn strategy(&self, mode: FeedMode) -> &dyn PriceFeed {
        match mode {
            FeedMode::Streaming => &self.streaming,
            FeedMode::Polling => &self.polling,
        }
    }
}

impl PriceFeed for FeedConnector {
    fn name(&self) -> &'static str {
        "connector"
    }

    fn start(&self, config: &FeedConfig, currency: Currency) -> FeedHandle {
        let strategy = self.strategy(config.mode);
        info!(strategy = strategy.name(), currency = %currency, "Starting price feed");
        strategy.start(config, currency)
    }
}
