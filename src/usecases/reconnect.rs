//! Reconnect Policy - When to Restart an Ended Feed
//!
//! `on_signal` never schedules anything: the feed stays down until the
//! next ScreenOn or config change. `backoff` schedules a restart after
//! `min(initial * 2^attempt, max)`; the attempt counter goes back to
//! zero once a session delivers a tick.

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::config::{FeedConfig, ReconnectMode};

#[derive(Debug, Clone)]
pub struct Reconnector {
  mode: ReconnectMode,
  initial: Duration,
  max: Duration,
  attempt: u32,
  deadline: Option<Instant>,
}

impl Reconnector {
  pub fn from_config(config: &FeedConfig) -> Self {
    let initial = Duration::from_millis(config.backoff_initial_ms);
    Self {
      mode: config.reconnect,
      initial,
      max: Duration::from_millis(config.backoff_max_ms).max(initial),
      attempt: 0,
      deadline: None,
    }
  }

  /// Delay before restart number `attempt` (zero-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    2u32
      .checked_pow(attempt)
      .and_then(|factor| self.initial.checked_mul(factor))
      .map_or(self.max, |delay| delay.min(self.max))
  }

  /// Schedule a restart if the policy allows one. Returns the delay.
  pub fn schedule(&mut self) -> Option<Duration> {
    if self.mode == ReconnectMode::OnSignal {
      return None;
    }
    let delay = self.delay_for(self.attempt);
    self.attempt = self.attempt.saturating_add(1);
    self.deadline = Some(Instant::now() + delay);
    Some(delay)
  }

  /// Resolves when a scheduled restart is due; pending otherwise.
  pub async fn wait(&mut self) {
    match self.deadline {
      Some(deadline) => {
        sleep_until(deadline).await;
        self.deadline = None;
      }
      None => pending().await,
    }
  }

  /// Drop a scheduled restart.
  pub const fn cancel(&mut self) {
    self.deadline = None;
  }

  /// A session delivered data: start counting from zero again.
  pub const fn reset(&mut self) {
    self.attempt = 0;
  }

  pub const fn is_scheduled(&self) -> bool {
    self.deadline.is_some()
  }

  pub const fn attempt(&self) -> u32 {
    self.attempt
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn backoff(initial_ms: u64, max_ms: u64) -> Reconnector {
    Reconnector::from_config(&FeedConfig {
      reconnect: ReconnectMode::Backoff,
      backoff_initial_ms: initial_ms,
      backoff_max_ms: max_ms,
      ..FeedConfig::default()
    })
  }

  #[test]
  fn delays_double_up_to_the_cap() {
    let r = backoff(1_000, 10_000);
    let delays: Vec<u64> = (0..6).map(|a| r.delay_for(a).as_millis() as u64).collect();
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    assert_eq!(r.delay_for(200), Duration::from_secs(10));
  }

  #[test]
  fn on_signal_never_schedules() {
    let mut r = Reconnector::from_config(&FeedConfig::default());
    assert_eq!(r.schedule(), None);
    assert!(!r.is_scheduled());
  }

  #[tokio::test(start_paused = true)]
  async fn wait_fires_after_delay_and_reset_restarts_sequence() {
    let mut r = backoff(500, 60_000);

    assert_eq!(r.schedule(), Some(Duration::from_millis(500)));
    let started = Instant::now();
    r.wait().await;
    assert_eq!(started.elapsed(), Duration::from_millis(500));
    assert!(!r.is_scheduled());

    assert_eq!(r.schedule(), Some(Duration::from_millis(1_000)));
    r.cancel();
    r.reset();
    assert_eq!(r.attempt(), 0);
    assert_eq!(r.schedule(), Some(Duration::from_millis(500)));
  }
}
