//! Blocking I2C driver for RGB-backlit 16x2 character LCD modules
//!
//! Targets DFR0554-class display boards: an HD44780-compatible character
//! controller and a PCA9633-compatible RGB LED driver sharing one bus at
//! fixed addresses. The driver owns an [`embedded_hal::i2c::I2c`] bus
//! handle and an [`embedded_hal::delay::DelayNs`] delay source, and is
//! stateless with respect to on-screen content.
//!
//! ```ignore
//! let mut lcd = RgbLcd::new(i2c, delay);
//! lcd.init()?;
//! lcd.set_rgb(0, 255, 0)?;
//! lcd.set_cursor_pos(0, 0)?;
//! lcd.print("HI")?;
//! ```
//!
//! An async rendition of the same surface lives in the `iris1602-async`
//! crate; both share the encoding modules here, so the two cannot drift.

#![no_std]
#![deny(unsafe_code)]

pub mod backlight;
pub mod cmd;
pub mod driver;
pub mod textbuf;

pub use driver::{LcdConfig, LcdError, RgbLcd, ScrollDirection};
pub use textbuf::TextBuffer;
