//! External Signals - stdin Commands and Ctrl-C
//!
//! Turns terminal input into [`ControlSignal`]s for the controller.
//! One command per line, case-insensitive:
//!
//! | line               | effect                          |
//! |--------------------|---------------------------------|
//! | `toggle`, `t`      | `ToggleCurrency`                |
//! | `screen-on`, `on`  | `ScreenOn`                      |
//! | `stop`, `q`        | `Stop`                          |
//! | `reload`, `r`      | immediate config file check     |
//!
//! End of input is not a stop request: the ticker keeps running until
//! `stop` or Ctrl-C.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::ports::ControlSignal;

/// Parsed stdin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    ScreenOn,
    Stop,
    Reload,
}

/// Parse one input line. Blank or unknown lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "toggle" | "t" => Some(Command::Toggle),
        "screen-on" | "on" => Some(Command::ScreenOn),
        "stop" | "q" | "quit" => Some(Command::Stop),
        "reload" | "r" => Some(Command::Reload),
        _ => None,
    }
}

/// Reads commands from a line-oriented source.
pub struct CommandReader {
    signals: mpsc::Sender<ControlSignal>,
    reload: mpsc::Sender<()>,
}

impl CommandReader {
    pub const fn new(signals: mpsc::Sender<ControlSignal>, reload: mpsc::Sender<()>) -> Self {
        Self { signals, reload }
    }

    /// Read `input` until EOF, shutdown, or the controller goes away.
    #[instrument(skip_all)]
    pub async fn run<R>(self, input: R, mut shutdown_rx: broadcast::Receiver<()>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Command input closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Command input failed");
                    break;
                }
            };

            let Some(command) = parse_command(&line) else {
                if !line.trim().is_empty() {
                    info!(input = %line.trim(), "Unknown command (toggle, screen-on, reload, stop)");
                }
                continue;
            };

            debug!(?command, "Command received");
            let signal = match command {
                Command::Toggle => ControlSignal::ToggleCurrency,
                Command::ScreenOn => ControlSignal::ScreenOn,
                Command::Stop => ControlSignal::Stop,
                Command::Reload => {
                    // A pending reload already covers this one.
                    let _ = self.reload.try_send(());
                    continue;
                }
            };
            if self.signals.send(signal).await.is_err() {
                break;
            }
        }
    }
}

/// Forward Ctrl-C as `Stop`.
pub async fn forward_ctrl_c(signals: mpsc::Sender<ControlSignal>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("SIGINT received, stopping");
            let _ = signals.send(ControlSignal::Stop).await;
        }
        Err(e) => warn!(error = %e, "Ctrl-C handler unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!(parse_command("toggle"), Some(Command::Toggle));
        assert_eq!(parse_command(" T \n"), Some(Command::Toggle));
        assert_eq!(parse_command("screen-on"), Some(Command::ScreenOn));
        assert_eq!(parse_command("on"), Some(Command::ScreenOn));
        assert_eq!(parse_command("q"), Some(Command::Stop));
        assert_eq!(parse_command("Reload"), Some(Command::Reload));
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("buy"), None);
    }

    #[tokio::test]
    async fn lines_become_signals_in_order() {
        let (signals_tx, mut signals_rx) = mpsc::channel(8);
        let (reload_tx, mut reload_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let input: &[u8] = b"t\nnonsense\n\non\nr\nstop\n";
        CommandReader::new(signals_tx, reload_tx)
            .run(input, shutdown_rx)
            .await;

        assert_eq!(signals_rx.recv().await, Some(ControlSignal::ToggleCurrency));
        assert_eq!(signals_rx.recv().await, Some(ControlSignal::ScreenOn));
        assert_eq!(signals_rx.recv().await, Some(ControlSignal::Stop));
        assert_eq!(signals_rx.recv().await, None);
        assert_eq!(reload_rx.recv().await, Some(()));
    }
}
