//! Integration Tests - Controller Wired to Scripted Adapters
//!
//! Drives the lifecycle controller through a scripted price feed, a
//! recording display sink and a mockall alert sink. Time is paused so
//! alert repetition and backoff are deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bitticker::config::{AppConfig, DisplayConfig, FeedConfig, ReconnectMode};
use bitticker::domain::{ColorClass, ConnectionState, Currency, FeedError, PriceTick, SinkError};
use bitticker::ports::{
    AlertActionSink, ControlSignal, DisplaySink, FeedCommand, FeedEvent, FeedHandle, FeedTaskIo,
    PriceFeed,
};
use bitticker::usecases::{ControllerState, DisplayDispatcher, LifecycleController};

// ---- Mock Definitions ----

mock! {
    pub Actions {}

    #[async_trait::async_trait]
    impl AlertActionSink for Actions {
        async fn vibrate(&self, duration: Duration) -> Result<(), SinkError>;
        async fn play_sound(&self) -> Result<(), SinkError>;
    }
}

/// One session opened by the controller.
struct Session {
    currency: Currency,
    io: FeedTaskIo,
}

/// Feed whose sessions are driven by the test.
struct ScriptedFeed {
    sessions: mpsc::UnboundedSender<Session>,
}

impl PriceFeed for ScriptedFeed {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn start(&self, _config: &FeedConfig, currency: Currency) -> FeedHandle {
        let (handle, io) = FeedHandle::pair();
        let _ = self.sessions.send(Session { currency, io });
        handle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shown {
    Price(String, ColorClass),
    Error(String),
    Configured(String),
}

#[derive(Default)]
struct DisplayLog {
    shown: Vec<Shown>,
    releases: usize,
}

struct RecordingDisplay(Arc<Mutex<DisplayLog>>);

impl DisplaySink for RecordingDisplay {
    fn show_price(&mut self, text: &str, color: ColorClass) -> Result<(), SinkError> {
        self.0.lock().unwrap().shown.push(Shown::Price(text.to_string(), color));
        Ok(())
    }

    fn show_error(&mut self, message: &str) -> Result<(), SinkError> {
        self.0.lock().unwrap().shown.push(Shown::Error(message.to_string()));
        Ok(())
    }

    fn configure(&mut self, config: &DisplayConfig) -> Result<(), SinkError> {
        self.0.lock().unwrap().shown.push(Shown::Configured(config.up_color.clone()));
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        self.0.lock().unwrap().releases += 1;
        Ok(())
    }
}

struct Harness {
    signals: mpsc::Sender<ControlSignal>,
    sessions: mpsc::UnboundedReceiver<Session>,
    display: Arc<Mutex<DisplayLog>>,
    controller: JoinHandle<LifecycleController>,
}

impl Harness {
    fn start(config: AppConfig, actions: MockActions) -> Self {
        let (sessions_tx, sessions) = mpsc::unbounded_channel();
        let display = Arc::new(Mutex::new(DisplayLog::default()));
        let dispatcher = DisplayDispatcher::spawn(Box::new(RecordingDisplay(Arc::clone(&display))));

        let mut controller = LifecycleController::new(
            Arc::new(ScriptedFeed { sessions: sessions_tx }),
            dispatcher,
            Arc::new(actions),
            config,
        );
        let (signals, signals_rx) = mpsc::channel(16);
        let controller = tokio::spawn(async move {
            controller.run(signals_rx).await.unwrap();
            controller
        });

        Self {
            signals,
            sessions,
            display,
            controller,
        }
    }

    async fn next_session(&mut self) -> Session {
        tokio::time::timeout(Duration::from_secs(1), self.sessions.recv())
            .await
            .expect("no session started")
            .expect("feed dropped")
    }

    fn no_new_session(&mut self) -> bool {
        self.sessions.try_recv().is_err()
    }

    async fn send(&self, signal: ControlSignal) {
        self.signals.send(signal).await.unwrap();
        settle().await;
    }

    fn shown(&self) -> Vec<Shown> {
        self.display.lock().unwrap().shown.clone()
    }

    async fn stop(self) -> (LifecycleController, Arc<Mutex<DisplayLog>>) {
        self.signals.send(ControlSignal::Stop).await.unwrap();
        (self.controller.await.unwrap(), self.display)
    }
}

/// Let the controller and display tasks drain their queues.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn tick(session: &Session, price: Decimal) {
    assert!(session.io.emit(FeedEvent::Tick(PriceTick::now(price, session.currency))).await);
    settle().await;
}

fn quiet_actions() -> MockActions {
    let mut actions = MockActions::new();
    actions.expect_vibrate().never();
    actions.expect_play_sound().never();
    actions
}

// ---- Tests ----

#[tokio::test(start_paused = true)]
async fn ticks_are_coloured_against_the_window_reference() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connected);

    tick(&session, dec!(67000)).await;
    tick(&session, dec!(67010.5)).await;
    tick(&session, dec!(66990)).await;

    assert_eq!(
        harness.shown(),
        vec![
            Shown::Price("67000".to_string(), ColorClass::Flat),
            Shown::Price("67010.5".to_string(), ColorClass::Up),
            Shown::Price("66990".to_string(), ColorClass::Down),
        ]
    );

    let (controller, _) = harness.stop().await;
    assert_eq!(controller.reconciliation().reference_price, Some(dec!(67000)));
    assert_eq!(controller.state(), ControllerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn alert_fires_immediately_then_every_second_until_cleared() {
    let mut config = AppConfig::default();
    config.alert.enabled = true;
    config.alert.max_price = dec!(50000);

    let mut actions = MockActions::new();
    actions
        .expect_vibrate()
        .withf(|d| *d == Duration::from_millis(200))
        .times(4)
        .returning(|_| Err(SinkError::Unavailable("vibration motor")));
    actions.expect_play_sound().times(4).returning(|| Ok(()));

    let mut harness = Harness::start(config, actions);
    let session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connected);

    tick(&session, dec!(49999)).await;
    // Immediate action, then repeats at +1s, +2s, +3s.
    tick(&session, dec!(50000)).await;
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    tick(&session, dec!(49000)).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let (controller, _) = harness.stop().await;
    assert!(!controller.alert_state().active);
    // Mock expectations are checked when the controller drops.
    drop(controller);
}

#[tokio::test(start_paused = true)]
async fn feed_error_is_shown_and_on_signal_waits_for_screen_on() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connected);
    settle().await;

    let error = FeedError::Closed {
        code: Some(1006),
        reason: "abnormal".to_string(),
    };
    assert!(session.io.emit(FeedEvent::Error(error.clone())).await);
    drop(session);
    settle().await;

    assert_eq!(harness.shown(), vec![Shown::Error(error.to_string())]);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(harness.no_new_session());

    harness.send(ControlSignal::ScreenOn).await;
    let revived = harness.next_session().await;
    assert_eq!(revived.currency, Currency::Usd);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn alert_stops_repeating_once_the_feed_ends() {
    let mut config = AppConfig::default();
    config.alert.enabled = true;
    config.alert.max_price = dec!(50000);
    config.alert.vibration = false;
    config.alert.sound = true;

    let mut actions = MockActions::new();
    actions.expect_vibrate().never();
    // Only the immediate action on activation.
    actions.expect_play_sound().times(1).returning(|| Ok(()));

    let mut harness = Harness::start(config, actions);
    let session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connected);

    tick(&session, dec!(60000)).await;

    let error = FeedError::Transport {
        reason: "connection reset".to_string(),
    };
    assert!(session.io.emit(FeedEvent::Error(error)).await);
    drop(session);
    settle().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(harness.no_new_session());

    let (controller, _) = harness.stop().await;
    assert!(!controller.alert_state().active);
    drop(controller);
}

#[tokio::test(start_paused = true)]
async fn backoff_restarts_an_ended_feed() {
    let mut config = AppConfig::default();
    config.feed.reconnect = ReconnectMode::Backoff;
    config.feed.backoff_initial_ms = 1_000;

    let mut harness = Harness::start(config, quiet_actions());

    let first = harness.next_session().await;
    drop(first);
    settle().await;
    assert!(harness.no_new_session());

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let second = harness.next_session().await;
    drop(second);
    settle().await;

    // Second attempt waits twice as long.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(harness.no_new_session());
    tokio::time::sleep(Duration::from_millis(600)).await;
    harness.next_session().await;

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn screen_on_leaves_a_connecting_session_alone() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connecting);
    settle().await;

    harness.send(ControlSignal::ScreenOn).await;
    assert!(harness.no_new_session());

    session.io.set_state(ConnectionState::Connected);
    settle().await;
    harness.send(ControlSignal::ScreenOn).await;
    harness.next_session().await;

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn toggle_is_forwarded_and_stale_ticks_are_dropped() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let mut session = harness.next_session().await;
    session.io.set_state(ConnectionState::Connected);

    harness.send(ControlSignal::ToggleCurrency).await;
    assert_eq!(
        session.io.commands.recv().await,
        Some(FeedCommand::SetCurrency(Currency::Cny))
    );

    // Still tagged with the old currency: dropped.
    tick(&session, dec!(67000)).await;
    assert!(
        session
            .io
            .emit(FeedEvent::Tick(PriceTick::now(dec!(480000), Currency::Cny)))
            .await
    );
    settle().await;

    assert_eq!(
        harness.shown(),
        vec![Shown::Price("480000".to_string(), ColorClass::Flat)]
    );

    let (controller, _) = harness.stop().await;
    assert_eq!(controller.currency(), Currency::Cny);
}

#[tokio::test(start_paused = true)]
async fn config_change_restarts_feed_and_restyles_display() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let mut first = harness.next_session().await;
    first.io.set_state(ConnectionState::Connected);
    tick(&first, dec!(100)).await;

    let mut next = AppConfig::default();
    next.ticker.display_currency = Currency::Cny;
    next.display.up_color = "#2196F3".to_string();
    harness.send(ControlSignal::ConfigChanged(Box::new(next))).await;

    assert_eq!(first.io.commands.recv().await, Some(FeedCommand::Shutdown));
    let second = harness.next_session().await;
    assert_eq!(second.currency, Currency::Cny);
    assert!(harness.shown().contains(&Shown::Configured("#2196F3".to_string())));

    let (controller, _) = harness.stop().await;
    assert_eq!(controller.reconciliation().last_price, None);
    assert_eq!(controller.config().display.up_color, "#2196F3");
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let mut harness = Harness::start(AppConfig::default(), quiet_actions());
    let mut session = harness.next_session().await;

    let (mut controller, display) = harness.stop().await;
    assert_eq!(session.io.commands.recv().await, Some(FeedCommand::Shutdown));

    controller.stop().await;
    controller.stop().await;

    assert_eq!(display.lock().unwrap().releases, 1);
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(*controller.connection().borrow(), ConnectionState::Disconnected);
}
