//! Feed Adapter Tests - Streaming and Polling Against Local Servers
//!
//! The streaming adapter talks to an in-process tokio-tungstenite
//! server; the polling adapter talks to a wiremock server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bitticker::adapters::feeds::{CoinGeckoFeed, OkxTickerFeed};
use bitticker::config::{FeedConfig, FeedMode};
use bitticker::domain::{ConnectionState, Currency, FeedError};
use bitticker::ports::{FeedEvent, FeedHandle, FeedUpdate, PriceFeed};

const WAIT: Duration = Duration::from_secs(5);

/// Next tick or error, skipping state changes. `None` once ended.
async fn next_event(handle: &mut FeedHandle) -> Option<FeedEvent> {
    loop {
        let update = tokio::time::timeout(WAIT, handle.next_update())
            .await
            .expect("feed went silent");
        match update {
            FeedUpdate::Event(event) => return Some(event),
            FeedUpdate::State(_) => {}
            FeedUpdate::Ended => return None,
        }
    }
}

/// Wait until the handle reports `state`.
async fn wait_for_state(handle: &mut FeedHandle, state: ConnectionState) {
    loop {
        let update = tokio::time::timeout(WAIT, handle.next_update())
            .await
            .expect("state never reached");
        match update {
            FeedUpdate::State(s) if s == state => return,
            FeedUpdate::Ended => panic!("feed ended before reaching {state}"),
            _ => {}
        }
    }
}

// ---- Streaming ----

/// Single-connection WebSocket server.
///
/// Frames from the client arrive on the returned receiver; frames sent
/// on the returned sender go to the client.
async fn ws_server() -> (String, mpsc::UnboundedReceiver<Message>, mpsc::UnboundedSender<Message>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(msg)) => {
                        let _ = inbound_tx.send(msg);
                    }
                    _ => break,
                },
                out = outbound_rx.recv() => match out {
                    Some(msg) => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    (url, inbound_rx, outbound_tx)
}

async fn next_json(inbound: &mut mpsc::UnboundedReceiver<Message>) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, inbound.recv())
            .await
            .expect("client sent nothing")
            .expect("server closed");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn push(inst_id: &str, last: &str) -> Message {
    Message::Text(
        json!({
            "arg": {"channel": "tickers", "instId": inst_id},
            "data": [{"instId": inst_id, "last": last}]
        })
        .to_string(),
    )
}

fn streaming_config(ws_url: String) -> FeedConfig {
    FeedConfig {
        mode: FeedMode::Streaming,
        ws_url,
        usd_instrument: "BTC-USDT".to_string(),
        local_instrument: "BTC-USDC".to_string(),
        ..FeedConfig::default()
    }
}

#[tokio::test]
async fn streaming_subscribes_and_emits_ticks() {
    let (url, mut inbound, outbound) = ws_server().await;
    let mut handle = OkxTickerFeed.start(&streaming_config(url), Currency::Usd);

    wait_for_state(&mut handle, ConnectionState::Connected).await;
    assert_eq!(
        next_json(&mut inbound).await,
        json!({"op": "subscribe", "args": [{"channel": "tickers", "instId": "BTC-USDT"}]})
    );

    outbound.send(push("BTC-USDT", "67000.5")).unwrap();
    outbound.send(Message::Text("{not json".to_string())).unwrap();
    outbound
        .send(Message::Text(r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT"}}"#.to_string()))
        .unwrap();
    outbound.send(push("BTC-USDT", "67001")).unwrap();

    let Some(FeedEvent::Tick(first)) = next_event(&mut handle).await else {
        panic!("expected a tick");
    };
    assert_eq!((first.price, first.currency), (dec!(67000.5), Currency::Usd));

    // Malformed and event frames are dropped without an error.
    let Some(FeedEvent::Tick(second)) = next_event(&mut handle).await else {
        panic!("expected a tick");
    };
    assert_eq!(second.price, dec!(67001));
    assert!(handle.was_connected());

    handle.stop().await.unwrap();
    let close = tokio::time::timeout(WAIT, inbound.recv()).await.unwrap();
    assert!(matches!(close, Some(Message::Close(_)) | None));
}

#[tokio::test]
async fn streaming_toggle_resubscribes_on_the_same_connection() {
    let (url, mut inbound, outbound) = ws_server().await;
    let mut handle = OkxTickerFeed.start(&streaming_config(url), Currency::Usd);
    wait_for_state(&mut handle, ConnectionState::Connected).await;
    next_json(&mut inbound).await;

    handle.set_currency(Currency::Cny).await.unwrap();

    assert_eq!(next_json(&mut inbound).await["op"], "unsubscribe");
    let subscribe = next_json(&mut inbound).await;
    assert_eq!(subscribe["op"], "subscribe");
    assert_eq!(subscribe["args"][0]["instId"], "BTC-USDC");

    // A late push for the old instrument is ignored.
    outbound.send(push("BTC-USDT", "1")).unwrap();
    outbound.send(push("BTC-USDC", "480000")).unwrap();

    let Some(FeedEvent::Tick(tick)) = next_event(&mut handle).await else {
        panic!("expected a tick");
    };
    assert_eq!((tick.price, tick.currency), (dec!(480000), Currency::Cny));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn streaming_close_reports_one_error_then_ends() {
    let (url, mut inbound, outbound) = ws_server().await;
    let mut handle = OkxTickerFeed.start(&streaming_config(url), Currency::Usd);
    wait_for_state(&mut handle, ConnectionState::Connected).await;
    next_json(&mut inbound).await;

    outbound
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "maintenance".into(),
        })))
        .unwrap();

    match next_event(&mut handle).await {
        Some(FeedEvent::Error(FeedError::Closed { code, reason })) => {
            assert_eq!(code, Some(1001));
            assert_eq!(reason, "maintenance");
        }
        other => panic!("expected a close error, got {other:?}"),
    }
    assert_eq!(next_event(&mut handle).await, None);
    assert_eq!(handle.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn streaming_connect_failure_reports_one_error_then_ends() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut handle = OkxTickerFeed.start(&streaming_config(url), Currency::Usd);

    assert!(matches!(
        next_event(&mut handle).await,
        Some(FeedEvent::Error(FeedError::Connect { .. }))
    ));
    assert_eq!(next_event(&mut handle).await, None);
    assert!(!handle.was_connected());
}

// ---- Polling ----

fn polling_config(server: &MockServer) -> FeedConfig {
    FeedConfig {
        mode: FeedMode::Polling,
        rest_url: server.uri(),
        poll_interval_ms: 100,
        request_timeout_ms: 2_000,
        ..FeedConfig::default()
    }
}

fn price_body(currency: &str, price: f64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"bitcoin": {currency: price}}))
}

#[tokio::test]
async fn polling_emits_ticks_and_survives_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(price_body("usd", 67012.5))
        .mount(&server)
        .await;

    let mut handle = CoinGeckoFeed.start(&polling_config(&server), Currency::Usd);

    match next_event(&mut handle).await {
        Some(FeedEvent::Error(FeedError::Request { status, .. })) => assert_eq!(status, Some(503)),
        other => panic!("expected a request error, got {other:?}"),
    }
    let Some(FeedEvent::Tick(tick)) = next_event(&mut handle).await else {
        panic!("polling stopped after an error");
    };
    assert_eq!((tick.price, tick.currency), (dec!(67012.5), Currency::Usd));
    assert!(handle.was_connected());

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn polling_currency_change_applies_from_the_next_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("vs_currencies", "usd"))
        .respond_with(price_body("usd", 67000.0).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("vs_currencies", "cny"))
        .respond_with(price_body("cny", 480000.0))
        .mount(&server)
        .await;

    let mut handle = CoinGeckoFeed.start(&polling_config(&server), Currency::Usd);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The USD request is still in flight.
    handle.set_currency(Currency::Cny).await.unwrap();

    let Some(FeedEvent::Tick(first)) = next_event(&mut handle).await else {
        panic!("expected a tick");
    };
    assert_eq!(first.currency, Currency::Usd);

    let Some(FeedEvent::Tick(second)) = next_event(&mut handle).await else {
        panic!("expected a tick");
    };
    assert_eq!((second.price, second.currency), (dec!(480000), Currency::Cny));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn polling_payload_without_price_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut handle = CoinGeckoFeed.start(&polling_config(&server), Currency::Usd);

    assert!(matches!(
        next_event(&mut handle).await,
        Some(FeedEvent::Error(FeedError::Payload { .. }))
    ));
    handle.stop().await.unwrap();
}
