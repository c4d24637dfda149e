//! Async rendition of the `iris1602` driver surface
//!
//! Same device, same wire protocol, same state model and error policy;
//! operations await an [`embedded_hal_async::i2c::I2c`] bus and an
//! [`embedded_hal_async::delay::DelayNs`] delay source instead of
//! blocking on them. All byte-level encoding and bring-up timing comes
//! from `iris1602`, so the two surfaces cannot drift.

#![no_std]
#![deny(unsafe_code)]

use core::fmt;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use iris1602::backlight::{self, reg};
use iris1602::cmd;
use iris1602::driver::{
    FUNCTION_SET_DELAY_MS, FUNCTION_SET_REPEATS, POWER_ON_DELAY_MS, READY_DELAY_MS,
};
use iris1602::{LcdConfig, LcdError, ScrollDirection, TextBuffer};

/// Keep the first error of a multi-step sequence, letting later steps run
fn remember<E>(first: &mut Option<E>, res: Result<(), E>) {
    if first.is_none() {
        if let Err(e) = res {
            *first = Some(e);
        }
    }
}

/// RGB-backlit 16x2 LCD driver, async flavor
///
/// See [`iris1602::RgbLcd`] for the operation surface; every method here
/// is its awaiting twin.
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
    /// The bring-up sequence, ordering, and timing match the blocking
    /// driver exactly: every step runs even when an earlier one fails,
    /// the first failure is returned once the sequence completes, and the
    /// instance stays usable either way.
    pub async fn init(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.display_on = false;
        self.cursor_on = false;
        self.blink_on = false;

        self.delay.delay_ms(POWER_ON_DELAY_MS).await;

        let mut first_err = None;

        // The controller powers up in an indeterminate state and needs to
        // observe the same function-set several times to settle
        for _ in 0..FUNCTION_SET_REPEATS {
            let res = self
                .command(cmd::function_set(cmd::FONT_5X8, cmd::LINES_2))
                .await;
            remember(&mut first_err, res);
            self.delay.delay_ms(FUNCTION_SET_DELAY_MS).await;
        }

        let res = self.write_rgb_channels(255, 255, 255).await;
        remember(&mut first_err, res);

        let res = self
            .write_backlight_reg(reg::MODE1, backlight::MODE1_NORMAL)
            .await;
        remember(&mut first_err, res);
        let res = self
            .write_backlight_reg(reg::MODE2, backlight::MODE2_GROUP_BLINK)
            .await;
        remember(&mut first_err, res);
        let res = self
            .write_backlight_reg(reg::OUTPUT, backlight::OUTPUT_PWM_ALL)
            .await;
        remember(&mut first_err, res);

        // Group duty cycle to full at the highest group frequency
        let res = self
            .write_backlight_reg(reg::GRPFREQ, backlight::GRPFREQ_FASTEST)
            .await;
        remember(&mut first_err, res);
        let res = self
            .write_backlight_reg(reg::GRPPWM, backlight::GRPPWM_FULL)
            .await;
        remember(&mut first_err, res);

        let res = self.command(cmd::entry_mode(true, false)).await;
        remember(&mut first_err, res);
        let res = self.command(cmd::display_control(true, false, false)).await;
        remember(&mut first_err, res);
        let res = self.command(cmd::CLEAR).await;
        remember(&mut first_err, res);

        self.delay.delay_ms(READY_DELAY_MS).await;

        self.initialized = true;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release the bus and delay handles
    pub fn shutdown(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Turn the display output on or off
    pub async fn enable_display(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.display_on = on;
        let res = self.send_display_control().await;
        self.finish(res)
    }

    /// Show or hide the cursor underline
    pub async fn enable_cursor(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.cursor_on = on;
        let res = self.send_display_control().await;
        self.finish(res)
    }

    /// Enable or disable blinking of the cursor cell
    pub async fn enable_blink(&mut self, on: bool) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        self.blink_on = on;
        let res = self.send_display_control().await;
        self.finish(res)
    }

    /// Clear the display; the controller resets the cursor address to 0
    pub async fn clear(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::CLEAR).await;
        self.finish(res)
    }

    /// Reset the cursor address to 0 without clearing the display
    pub async fn return_home(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::RETURN_HOME).await;
        self.finish(res)
    }

    /// Move the cursor to `col`, `row`; out-of-range positions are
    /// passed through and their effect is device-defined
    pub async fn set_cursor_pos(&mut self, col: u8, row: u8) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.command(cmd::set_ddram_addr(col, row)).await;
        self.finish(res)
    }

    /// Shift the entire display one position left or right
    pub async fn scroll(&mut self, direction: ScrollDirection) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self
            .command(cmd::display_shift(direction == ScrollDirection::Right))
            .await;
        self.finish(res)
    }

    /// Write text at the current cursor address
    ///
    /// One transaction per byte; the first failed transaction aborts the
    /// rest of the string.
    pub async fn print(&mut self, text: &str) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let mut res = Ok(());
        for value in text.bytes() {
            if let Err(e) = self.write_data(value).await {
                res = Err(e);
                break;
            }
        }
        self.finish(res)
    }

    /// Format into a bounded scratch buffer, then print
    pub async fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), LcdError<I2C::Error>> {
        let mut buf = TextBuffer::new();
        // Formatting cannot fail; overflow truncates instead
        let _ = fmt::write(&mut buf, args);
        self.print(buf.as_str()).await
    }

    /// Set the backlight color
    ///
    /// Three independent register writes in RED, GREEN, BLUE order; a
    /// failed channel neither blocks nor rolls back the others.
    pub async fn set_rgb(&mut self, red: u8, green: u8, blue: u8) -> Result<(), LcdError<I2C::Error>> {
        self.ensure_init()?;
        let res = self.write_rgb_channels(red, green, blue).await;
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
    async fn command(&mut self, op: u8) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(cmd::LCD_ADDR, &cmd::instruction_frame(op))
            .await
            .map_err(LcdError::Bus)
    }

    /// Write one byte to DDRAM at the current cursor address
    async fn write_data(&mut self, value: u8) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(cmd::LCD_ADDR, &cmd::data_frame(value))
            .await
            .map_err(LcdError::Bus)
    }

    /// Set a single backlight controller register
    async fn write_backlight_reg(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), LcdError<I2C::Error>> {
        self.i2c
            .write(backlight::RGB_ADDR, &backlight::register_write(register, value))
            .await
            .map_err(LcdError::Bus)
    }

    async fn write_rgb_channels(
        &mut self,
        red: u8,
        green: u8,
        blue: u8,
    ) -> Result<(), LcdError<I2C::Error>> {
        // One transaction per channel; a failed channel does not stop the others
        let r = self.write_backlight_reg(reg::RED, red).await;
        let g = self.write_backlight_reg(reg::GREEN, green).await;
        let b = self.write_backlight_reg(reg::BLUE, blue).await;
        r.and(g).and(b)
    }

    async fn send_display_control(&mut self) -> Result<(), LcdError<I2C::Error>> {
        self.command(cmd::display_control(
            self.display_on,
            self.cursor_on,
            self.blink_on,
        ))
        .await
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
