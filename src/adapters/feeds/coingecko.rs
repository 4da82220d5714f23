//! CoinGecko REST Feed - Polling BTC Price Source
//!
//! Requests `simple/price` once per poll interval (the first request
//! goes out immediately) and maps the `{"<asset>":{"<currency>":<n>}}`
//! payload to a tick. A failed request is reported for that cycle only;
//! polling continues until shutdown.

use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::domain::{ConnectionState, Currency, FeedError, PriceTick};
use crate::ports::{FeedCommand, FeedEvent, FeedHandle, FeedTaskIo, PriceFeed};

/// Polling strategy backed by the CoinGecko public API.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinGeckoFeed;

impl PriceFeed for CoinGeckoFeed {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn start(&self, config: &FeedConfig, currency: Currency) -> FeedHandle {
        match PollSession::new(config) {
            Ok(session) => FeedHandle::spawn(move |io| session.run(currency, io)),
            Err(e) => {
                warn!(error = %e, "Polling feed could not be created");
                FeedHandle::failed(e)
            }
        }
    }
}

/// Outcome of one poll cycle.
enum PollOutcome {
    /// The request finished (successfully or not).
    Done(Result<Decimal, FeedError>),
    /// Shutdown was requested while the request was in flight.
    Shutdown,
}

/// One polling session.
struct PollSession {
    http: Client,
    rest_url: String,
    asset_id: String,
    poll_interval: Duration,
}

impl PollSession {
    fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| FeedError::Connect {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            rest_url: config.rest_url.clone(),
            asset_id: config.asset_id.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    #[instrument(skip_all, fields(url = %self.rest_url, interval = ?self.poll_interval))]
    async fn run(self, currency: Currency, mut io: FeedTaskIo) {
        io.set_state(ConnectionState::Connecting);
        info!("Polling feed started");

        let mut current = currency;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                cmd = io.commands.recv() => {
                    match cmd {
                        Some(FeedCommand::SetCurrency(next)) => {
                            debug!(currency = %next, "Currency applies from the next poll");
                            current = next;
                        }
                        Some(FeedCommand::Shutdown) | None => break,
                    }
                }
                _ = ticker.tick() => {
                    let requested = current;
                    let result = match self.poll_once(requested, &mut io, &mut current).await {
                        PollOutcome::Done(result) => result,
                        PollOutcome::Shutdown => break,
                    };

                    let event = match result {
                        Ok(price) => {
                            if *io.state.borrow() != ConnectionState::Connected {
                                io.set_state(ConnectionState::Connected);
                            }
                            FeedEvent::Tick(PriceTick::now(price, requested))
                        }
                        Err(e) => {
                            warn!(error = %e, currency = %requested, "Poll failed");
                            FeedEvent::Error(e)
                        }
                    };
                    if !io.emit(event).await {
                        break;
                    }
                }
            }
        }

        io.set_state(ConnectionState::Disconnected);
        info!("Polling feed stopped");
    }

    /// Run one request while still accepting commands.
    ///
    /// A currency change during the request is stored for the next
    /// cycle; the in-flight request keeps the currency it started with.
    async fn poll_once(
        &self,
        requested: Currency,
        io: &mut FeedTaskIo,
        current: &mut Currency,
    ) -> PollOutcome {
        let fetch = self.fetch_price(requested);
        tokio::pin!(fetch);

        loop {
            tokio::select! {
                result = &mut fetch => return PollOutcome::Done(result),
                cmd = io.commands.recv() => {
                    match cmd {
                        Some(FeedCommand::SetCurrency(next)) => {
                            debug!(currency = %next, "Currency applies from the next poll");
                            *current = next;
                        }
                        Some(FeedCommand::Shutdown) | None => return PollOutcome::Shutdown,
                    }
                }
            }
        }
    }

    /// GET `simple/price` for one currency.
    async fn fetch_price(&self, currency: Currency) -> Result<Decimal, FeedError> {
        let url = format!("{}/simple/price", self.rest_url);

        let response = self
            .http
            .get(&url)
            .query(&[("ids", self.asset_id.as_str()), ("vs_currencies", currency.code())])
            .send()
            .await
            .map_err(|e| FeedError::Request {
                status: e.status().map(|s| s.as_u16()),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Request {
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let payload: Value = response.json().await.map_err(|e| FeedError::Payload {
            reason: e.to_string(),
        })?;

        extract_price(&payload, &self.asset_id, currency)
    }
}

/// Read `payload[asset][currency]` as a decimal.
pub fn extract_price(payload: &Value, asset_id: &str, currency: Currency) -> Result<Decimal, FeedError> {
    let value = payload
        .get(asset_id)
        .and_then(|asset| asset.get(currency.code()))
        .ok_or_else(|| FeedError::Payload {
            reason: format!("missing {asset_id}.{}", currency.code()),
        })?;

    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    };

    parsed.ok_or_else(|| FeedError::Payload {
        reason: format!("{asset_id}.{} is not a number: {value}", currency.code()),
    })
}
