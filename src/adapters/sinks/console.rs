//! Console Display - Single-line Terminal Ticker
//!
//! Renders the price on one line that is rewritten in place, coloured
//! with the configured up/down/font colours using 24-bit ANSI escapes.
//! The `#AARRGGBB` alpha channel is ignored; the background is only
//! painted when `display.alpha` is above zero.

use std::io::{self, Write};

use crate::config::DisplayConfig;
use crate::domain::{ColorClass, SinkError};
use crate::ports::DisplaySink;

/// 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#RRGGBB` or `#AARRGGBB`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        let rgb = match hex.len() {
            6 => hex,
            8 => hex.get(2..)?,
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(rgb.get(i..i + 2)?, 16).ok();
        Some(Self(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Palette resolved from the display config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    font: Rgb,
    up: Rgb,
    down: Rgb,
    background: Option<Rgb>,
}

impl Palette {
    fn from_config(config: &DisplayConfig) -> Self {
        let white = Rgb(0xFF, 0xFF, 0xFF);
        Self {
            font: Rgb::parse_hex(&config.font_color).unwrap_or(white),
            up: Rgb::parse_hex(&config.up_color).unwrap_or(Rgb(0, 0xFF, 0)),
            down: Rgb::parse_hex(&config.down_color).unwrap_or(Rgb(0xFF, 0, 0)),
            background: (config.alpha > 0.0)
                .then(|| Rgb::parse_hex(&config.bg_color))
                .flatten(),
        }
    }

    const fn for_class(&self, color: ColorClass) -> Rgb {
        match color {
            ColorClass::Up => self.up,
            ColorClass::Down => self.down,
            ColorClass::Flat => self.font,
        }
    }
}

/// Display sink writing a single status line.
pub struct ConsoleDisplay {
    out: Box<dyn Write + Send>,
    palette: Palette,
    released: bool,
}

impl ConsoleDisplay {
    /// Display on stdout.
    pub fn stdout(config: &DisplayConfig) -> Self {
        Self::with_writer(config, Box::new(io::stdout()))
    }

    /// Display on any writer.
    pub fn with_writer(config: &DisplayConfig, out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            palette: Palette::from_config(config),
            released: false,
        }
    }

    fn render(&mut self, text: &str, fg: Rgb) -> Result<(), SinkError> {
        self.released = false;
        let Rgb(r, g, b) = fg;
        let bg = self
            .palette
            .background
            .map(|Rgb(br, bg, bb)| format!("\x1b[48;2;{br};{bg};{bb}m"))
            .unwrap_or_default();

        write!(self.out, "\r\x1b[2K{bg}\x1b[38;2;{r};{g};{b}m {text} \x1b[0m")
            .and_then(|()| self.out.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}

impl DisplaySink for ConsoleDisplay {
    fn show_price(&mut self, text: &str, color: ColorClass) -> Result<(), SinkError> {
        let fg = self.palette.for_class(color);
        self.render(text, fg)
    }

    fn show_error(&mut self, message: &str) -> Result<(), SinkError> {
        let fg = self.palette.font;
        self.render(&format!("Error: {message}"), fg)
    }

    fn configure(&mut self, config: &DisplayConfig) -> Result<(), SinkError> {
        self.palette = Palette::from_config(config);
        Ok(())
    }

    fn release(&mut self) -> Result<(), SinkError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        writeln!(self.out, "\x1b[0m")
            .and_then(|()| self.out.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}
