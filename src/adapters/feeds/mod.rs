//! Price Feed Adapters - Live BTC Price Sources
//!
//! Provides two interchangeable strategies behind the `PriceFeed` port:
//! - OKX: persistent WebSocket ticker subscription (streaming)
//! - CoinGecko: periodic REST request (polling)
//! - Connector: picks one of the above from the config snapshot

pub mod coingecko;
pub mod connector;
pub mod okx;

pub use coingecko::CoinGeckoFeed;
pub use connector::FeedConnector;
pub use okx::OkxTickerFeed;
