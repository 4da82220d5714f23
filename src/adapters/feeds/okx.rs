//! OKX WebSocket Feed - Streaming BTC Price Source
//!
//! Connects to the OKX public WebSocket, subscribes to the `tickers`
//! channel for one instrument and emits the `last` trade price of every
//! push. A currency toggle is handled on the live connection by
//! unsubscribing the old instrument and subscribing the new one.
//!
//! One connection per session: a close frame, read error or connect
//! failure is reported once and the session ends. Reconnecting is the
//! controller's decision.

use std::str::FromStr;

use futures_util::{Sink, SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::domain::{ConnectionState, Currency, FeedError, PriceTick};
use crate::ports::{FeedCommand, FeedEvent, FeedHandle, FeedTaskIo, PriceFeed};

/// OKX subscribe / unsubscribe request.
#[derive(Debug, Serialize)]
struct SubscriptionMsg<'a> {
    op: &'static str,
    args: [ChannelArg<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChannelArg<'a> {
    channel: &'static str,
    #[serde(rename = "instId")]
    inst_id: &'a str,
}

impl<'a> SubscriptionMsg<'a> {
    const fn new(op: &'static str, inst_id: &'a str) -> Self {
        Self {
            op,
            args: [ChannelArg {
                channel: "tickers",
                inst_id,
            }],
        }
    }
}

/// Inbound OKX message: either a data push or an event acknowledgement.
#[derive(Debug, Deserialize)]
struct InboundMsg {
    /// Present on acknowledgements (`subscribe`, `unsubscribe`, `error`).
    event: Option<String>,
    /// Error code on `error` events.
    code: Option<String>,
    /// Error text on `error` events.
    msg: Option<String>,
    /// Channel the push belongs to.
    arg: Option<PushArg>,
    /// Ticker payloads; only the first is used.
    #[serde(default)]
    data: Vec<TickerData>,
}

#[derive(Debug, Deserialize)]
struct PushArg {
    #[serde(rename = "instId")]
    inst_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    /// Last traded price as a decimal string.
    last: Option<String>,
}

/// Extract the last trade price from a ticker push.
///
/// Returns `None` for anything that is not a usable push for
/// `instrument`: event frames, malformed JSON, an empty `data` array,
/// a missing or non-numeric `last`, or a push for another instrument.
pub fn extract_last_price(text: &str, instrument: &str) -> Option<Decimal> {
    let msg: InboundMsg = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "Dropping malformed OKX message");
            return None;
        }
    };

    if let Some(event) = msg.event.as_deref() {
        if event == "error" {
            warn!(code = ?msg.code, message = ?msg.msg, "OKX rejected a request");
        } else {
            debug!(event, "OKX event");
        }
        return None;
    }

    if let Some(inst_id) = msg.arg.and_then(|a| a.inst_id) {
        if inst_id != instrument {
            debug!(inst_id, "Dropping push for superseded instrument");
            return None;
        }
    }

    let last = msg.data.first()?.last.as_deref()?;
    Decimal::from_str(last).ok()
}

/// Streaming strategy backed by the OKX public tickers channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkxTickerFeed;

impl PriceFeed for OkxTickerFeed {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn start(&self, config: &FeedConfig, currency: Currency) -> FeedHandle {
        let session = OkxSession {
            config: config.clone(),
        };
        FeedHandle::spawn(move |io| session.run(currency, io))
    }
}

/// One WebSocket session.
struct OkxSession {
    config: FeedConfig,
}

impl OkxSession {
    /// Run the session to completion.
    ///
    /// Emits exactly one `FeedError` if the session ends for any reason
    /// other than a shutdown request.
    #[instrument(skip_all, fields(url = %self.config.ws_url))]
    async fn run(self, currency: Currency, mut io: FeedTaskIo) {
        io.set_state(ConnectionState::Connecting);
        info!("Connecting to OKX WebSocket");

        let outcome = self.connect_and_stream(currency, &mut io).await;
        io.set_state(ConnectionState::Disconnected);

        match outcome {
            Ok(()) => info!("OKX feed closed"),
            Err(e) => {
                warn!(error = %e, code = ?e.code(), "OKX feed ended");
                io.emit(FeedEvent::Error(e)).await;
            }
        }
    }

    /// Connect, subscribe, stream until error or shutdown.
    async fn connect_and_stream(
        &self,
        currency: Currency,
        io: &mut FeedTaskIo,
    ) -> Result<(), FeedError> {
        let (ws_stream, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| FeedError::Connect {
                reason: e.to_string(),
            })?;

        let (mut write, mut read) = ws_stream.split();
        io.set_state(ConnectionState::Connected);

        let mut current = currency;
        let mut instrument = self.config.instrument_for(current).to_string();
        send_json(&mut write, &SubscriptionMsg::new("subscribe", &instrument)).await?;
        info!(instrument = %instrument, "OKX WebSocket subscribed");

        loop {
            tokio::select! {
                biased;
                cmd = io.commands.recv() => {
                    match cmd {
                        Some(FeedCommand::SetCurrency(next)) => {
                            if next == current {
                                continue;
                            }
                            let next_instrument = self.config.instrument_for(next).to_string();
                            if next_instrument != instrument {
                                send_json(&mut write, &SubscriptionMsg::new("unsubscribe", &instrument)).await?;
                            }
                            send_json(&mut write, &SubscriptionMsg::new("subscribe", &next_instrument)).await?;
                            info!(from = %instrument, to = %next_instrument, currency = %next, "OKX resubscribed");
                            current = next;
                            instrument = next_instrument;
                        }
                        Some(FeedCommand::Shutdown) | None => {
                            io.set_state(ConnectionState::Closing);
                            if let Err(e) = write.close().await {
                                debug!(error = %e, "Close handshake failed");
                            }
                            return Ok(());
                        }
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Some(price) = extract_last_price(&text, &instrument) else {
                                continue;
                            };
                            if !io.emit(FeedEvent::Tick(PriceTick::now(price, current))).await {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Err(match frame {
                                Some(frame) => FeedError::Closed {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.to_string(),
                                },
                                None => FeedError::Closed {
                                    code: None,
                                    reason: "closed by peer".to_string(),
                                },
                            });
                        }
                        Some(Ok(Message::Ping(data))) => {
                            // Pong is handled automatically by tungstenite
                            debug!(len = data.len(), "OKX ping received");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(FeedError::Transport { reason: e.to_string() });
                        }
                        None => {
                            return Err(FeedError::Closed {
                                code: None,
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

async fn send_json<S>(write: &mut S, msg: &impl Serialize) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|e| FeedError::Transport {
        reason: format!("encode failed: {e}"),
    })?;
    write
        .send(Message::Text(json))
        .await
        .map_err(|e| FeedError::Transport { reason: e.to_string() })
}
