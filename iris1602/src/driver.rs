//! Blocking driver for the RGB-backlit 16x2 character LCD
//!
//! One instance handle drives both chips on the module: the character
//! controller (text, cursor, clear, scroll, mode flags) and the backlight
//! LED driver (per-channel PWM). Every operation translates directly into
//! one or more 2-byte bus writes and runs to completion on the caller's
//! thread; the driver holds no state beyond the three display-mode flags
//! and the initialization gate. Exclusive bus ownership is assumed - there
//! is no internal locking.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::backlight::{self, reg};
use crate::cmd;
use crate::textbuf::TextBuffer;

/// Supply stabilization delay before the controller accepts commands
pub const POWER_ON_DELAY_MS: u32 = 50;
/// Settle time after each function-set during bring-up
pub const FUNCTION_SET_DELAY_MS: u32 = 5;
/// Function-set repeats needed to leave the controller's indeterminate
/// power-on state; a controller quirk, not a driver workaround
pub const FUNCTION_SET_REPEATS: usize = 3;
/// Final settle delay before the device is considered ready
pub const READY_DELAY_MS: u32 = 500;

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdError<E> {
    /// The underlying bus transfer failed
    Bus(E),
    /// Operation issued before `init` has run
    NotInitialized,
}

/// Direction for [`RgbLcd::scroll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScrollDirection {
    Left,
    Right,
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LcdConfig {
    /// Return the first bus failure from every operation instead of
    /// aborting the operation silently
    pub strict_errors: bool,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            strict_errors: false,
        }
    }
}

/// Keep the first error of a multi-step sequence, letting later steps run
fn remember<E>(first: &mut Option<E>, res: Result<(), E>) {
    if first.is_none() {
        if let Err(e) = res {
            *first = Some(e);
        }
    }
}

/// RGB-backlit 16x2 LCD driver
///
/// Owns the bus handle and a delay source for the duration of its life;
/// [`RgbLcd::shutdown`] hands both back. Display contents and the cursor
/// address live only in the device - the driver mirrors nothing beyond its
/// mode flags.
pub struct RgbLcd<I2C, D> {
    i2c: I2C,
    delay: D,
    config: LcdConfig,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    initialized: bool,
}

impl<I2C, D> RgbLcd<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver with the default (lenient) error policy
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_config(i2c, delay, LcdConfig::default())
    }

    pub fn with_config(i2c: I2C, delay: D, config: LcdConfig) -> Self {
        Self {
            i2c,
            delay,
            config,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            initialized: false,
        }
    }

    /// Bring the device to a known state
    ///
    /// Runs the full bring-up sequence: stabilization delay, the repeated
    /// function-set loop, backlight white and PWM configuration, entry
    /// mode, display on, clear, final settle. Every step runs even when an
    /// earlier one fails; the first failure is returned once the sequence
    /// completes, and the instance stays usable either way.
    ///
    /// The display-control instruction sent here enables the display
    /// without touching the stored mode flags; those remain unset until
    /// the matching `enable_*` operation is called.
    pub fn init(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.display_on = false;
        self.cursor_on = false;
        self.blink_on = false;

        self.delay.delay_ms(POWER_ON_DELAY_MS);

        let mut first_err = None;

        // The controller powers up in an indeterminate state and needs to
        // observe the same function-set several times to settle
        for _ in 0..FUNCTION_SET_REPEATS {
            remember(
                &mut first_err,
                self.command(cmd::function_set(cmd::FONT_5X8, cmd::LINES_2)),
            );
            self.delay.delay_ms(FUNCTION_SET_DELAY_MS);
        }

        remember(&mut first_err, self.write_rgb_channels(255, 255, 255));

        remember(
            &mut first_err,
            self.write_backlight_reg(reg::MODE1, backlight::MODE1_NORMAL),
        );
        remember(
            &mut first_err,
            self.write_backlight_reg(reg::MODE2, backlight::MODE2_GROUP_BLINK),
        );
        remember(
            &mut first_err,
            self.write_backlight_reg(reg::OUTPUT, backlight::OUTPUT_PWM_ALL),
        );

        // Group duty cycle to full at the highest group frequency
        remember(
            &mut first_err,
            self.write_backlight_reg(reg::GRPFREQ, backlight::GRPFREQ_FASTEST),
        );
        remember(
            &mut first_err,
            self.write_backlight_reg(reg::GRPPWM, backlight::GRPPWM_FULL),
        );

        remember(&mut first_err, self.command(cmd::entry_mode(true, false)));
        remember(&mut first_err, self.command(cmd::display_control(true, false, false)));
        remember(&mut first_err, self.command(cmd::CLEAR));

        self.delay.delay_ms(READY_DELAY_MS);

        self.initialized = true;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release the bus and delay handles
    ///
    /// No commands are sent; the device keeps whatever state it has.
    pub fn shutdown(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Turn the display output on or off
    pub fn enable_display(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.display_on = on;
        let res = self.send_display_control();
        self.finish(res)
    }

    /// Show or hide the cursor underline
    pub fn enable_cursor(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.cursor_on = on;
        let res = self.send_display_control();
        self.finish(res)
    }

    /// Enable or disable blinking of the cursor cell
    pub fn enable_blink(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.blink_on = on;
        let res = self.send_display_control();
        self.finish(res)
    }

    /// Clear the display; the controller resets the cursor address to 0
    pub fn clear(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::CLEAR);
        self.finish(res)
    }

    /// Reset the cursor address to 0 without clearing the display
    pub fn return_home(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::RETURN_HOME);
        self.finish(res)
    }

    /// Move the cursor to `col`, `row`
    ///
    /// No bounds check against the visible 16x2 window; out-of-range
    /// positions are passed through and their effect is device-defined.
    pub fn set_cursor_pos(&mut self, col: u8, row: u8) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::set_ddram_addr(col, row));
        self.finish(res)
    }

    /// Shift the entire display one position left or right
    pub fn scroll(&mut self, direction: ScrollDirection) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::display_shift(direction == ScrollDirection::Right));
        self.finish(res)
    }

    /// Write text at the current cursor address
    ///
    /// Bytes are transmitted in order, one transaction each; the device
    /// expects its own 8-bit character set (ASCII for the common glyphs),
    /// so non-ASCII input renders device-defined. The first failed
    /// transaction aborts the rest of the string.
    pub fn print(&mut self, text: &str) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let mut res = Ok(());
        for value in text.bytes() {
            if let Err(e) = self.write_data(value) {
                res = Err(e);
                break;
            }
        }
        self.finish(res)
    }

    /// Format into a bounded scratch buffer, then print
    ///
    /// Output beyond [`crate::textbuf::CAPACITY`] bytes is silently
    /// truncated on a character boundary. Use with `core::format_args!`.
    pub fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), LcdError<I2C::Error>> {
        let mut buf = TextBuffer::new();
        // Formatting cannot fail; overflow truncates instead
        let _ = fmt::write(&mut buf, args);
        self.print(buf.as_str())
    }

    /// Set the backlight color
    ///
    /// Three independent register writes in RED, GREEN, BLUE order; a
    /// failed channel neither blocks nor rolls back the others.
    pub fn set_rgb(&mut self, red: u8, green: u8, blue: u8) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.write_rgb_channels(red, green, blue);
        self.finish(res)
    }

    /// Check if the bring-up sequence has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn display_enabled(&self) -> bool {
        self.display_on
    }

    pub fn cursor_enabled(&self) -> bool {
        self.cursor_on
    }

    pub fn blink_enabled(&self) -> bool {
        self.blink_on
    }

    /// Get the configuration
    pub fn config(&self) -> &LcdConfig {
        &self.config
    }

    /// Send one instruction to the character controller
    fn command(&mut self, op: u8) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(cmd::LCD_ADDR, &cmd::instruction_frame(op))
            .map_err(LcdError::Bus)
    }

    /// Write one byte to DDRAM at the current cursor address
    fn write_data(&mut self, value: u8) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(cmd::LCD_ADDR, &cmd::data_frame(value))
            .map_err(LcdError::Bus)
    }

    /// Set a single backlight controller register
    fn write_backlight_reg(&mut self, register: u8, value: u8) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(backlight::RGB_ADDR, &backlight::register_write(register, value))
            .map_err(LcdError::Bus)
    }

    fn write_rgb_channels(&mut self, red: u8, green: u8, blue: u8) -> Result<(), LcdError<I2C::Error>> {
        // One transaction per channel; a failed channel does not stop the others
        let r = self.write_backlight_reg(reg::RED, red);
        let g = self.write_backlight_reg(reg::GREEN, green);
        let b = self.write_backlight_reg(reg::BLUE, blue);
        r.and(g).and(b)
    }

    fn send_display_control(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.command(cmd::display_control(
            self.display_on,
            self.cursor_on,
            self.blink_on,
        ))
    }

    fn ensure_init(&self) -> Result<(), LcdError<I2C::Error>> {
        if self.initialized {
            Ok(())
        } else {
            Err(LcdError::NotInitialized)
        }
    }

    /// Apply the configured error policy to a finished operation
    fn finish(&self, res: Result<(), LcdError<I2C::Error>>) -> Result<(), LcdError<I2C::Error>> {
        match res {
            Err(LcdError::Bus(_)) if !self.config.strict_errors => Ok(()),
            other => other,
        }
    }
}
