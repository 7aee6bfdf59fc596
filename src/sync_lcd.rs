use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use ufmt_write::uWrite;

use crate::protocol::{self, Registers, BRING_UP_4BIT, BRING_UP_8BIT, BRING_UP_REPEAT};
use crate::{
    Backlight, Command, Config, DisplayControl, EntryMode, Error, Font, Mode, Shift, Timing,
};

/// Collects the display settings before the power-on sequence runs.
pub struct LcdBuilder<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    i2c: &'a mut I,
    delay: &'a mut D,
    config: Config,
}

impl<'a, I, D> LcdBuilder<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Set I2C address of the expander, 0x27 if not set.
    pub fn with_address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    /// Number of rows of the display, between 1 and 4.
    pub fn with_rows(mut self, rows: u8) -> Self {
        self.config.set_rows(rows);
        self
    }

    pub fn with_font(mut self, font: Font) -> Self {
        self.config.font = font;
        self
    }

    /// Backlight state used from the very first byte on the bus.
    pub fn with_backlight(mut self, backlight: Backlight) -> Self {
        self.config.backlight = backlight;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.config.timing = timing;
        self
    }

    /// Initializes the hardware and hands out the ready driver.
    ///
    /// The controller powers up with an unknown bus width, so it is first forced into 8 bit
    /// mode with three raw nibbles, then switched to 4 bit mode. Only after that the normal
    /// two nibble framing is valid. See the [datasheet], figure 24.
    ///
    /// Any bus error during this sequence fails with [`Error::Init`].
    ///
    /// [datasheet]: https://www.sparkfun.com/datasheets/LCD/HD44780.pdf
    pub fn init(self) -> Result<Lcd<'a, I, D>, Error<I::Error>> {
        let mut lcd = Lcd {
            i2c: self.i2c,
            delay: self.delay,
            address: self.config.address,
            rows: self.config.rows,
            timing: self.config.timing,
            regs: Registers::new(&self.config),
        };
        debug!("lcd: bring-up at address {=u8:#x}", lcd.address);
        match lcd.bring_up() {
            Ok(()) => {
                debug!("lcd: ready");
                Ok(lcd)
            }
            Err(e) => {
                warn!("lcd: bring-up failed");
                Err(Error::Init(e))
            }
        }
    }
}

/// API to write to the LCD.
pub struct Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    i2c: &'a mut I,
    delay: &'a mut D,
    address: u8,
    rows: u8,
    timing: Timing,
    regs: Registers,
}

impl<'a, I, D> Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Start configuring a display with the I2C and delay instance. Call
    /// [`LcdBuilder::init`] to get a usable driver.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(i2c: &'a mut I, delay: &'a mut D) -> LcdBuilder<'a, I, D> {
        LcdBuilder {
            i2c,
            delay,
            config: Config::new(),
        }
    }

    fn bring_up(&mut self) -> Result<(), I::Error> {
        // Initial delay to wait for init after power on.
        self.delay.delay_us(self.timing.power_on_us);

        for _ in 0..BRING_UP_REPEAT {
            self.pulse(BRING_UP_8BIT, Mode::Cmd)?;
            self.delay.delay_us(self.timing.bring_up_settle_us);
        }
        self.pulse(BRING_UP_4BIT, Mode::Cmd)?;
        self.delay.delay_us(self.timing.bring_up_settle_us);

        self.send(self.regs.function_set, Mode::Cmd)?;
        self.send(self.regs.display_control, Mode::Cmd)?;
        self.send(self.regs.entry_mode, Mode::Cmd)?;

        self.send(Command::Clear as u8, Mode::Cmd)?;
        self.delay.delay_us(self.timing.clear_settle_us);

        self.delay.delay_us(self.timing.ready_settle_us);
        Ok(())
    }

    /// Latch one nibble: enable high, hold, enable low, hold.
    fn pulse(&mut self, nibble: u8, mode: Mode) -> Result<(), I::Error> {
        let [high, low] = protocol::strobe(self.regs.compose(nibble, mode));
        self.i2c.write(self.address, &[high])?;
        self.delay.delay_us(self.timing.enable_high_us);
        self.i2c.write(self.address, &[low])?;
        self.delay.delay_us(self.timing.enable_low_us);
        Ok(())
    }

    fn send(&mut self, data: u8, mode: Mode) -> Result<(), I::Error> {
        let [high, low] = protocol::split(data);
        self.pulse(high, mode)?;
        self.pulse(low, mode)
    }

    fn command(&mut self, data: u8) -> Result<(), Error<I::Error>> {
        self.send(data, Mode::Cmd).map_err(Error::Transport)
    }

    /// Sends an updated register byte. The mirror only keeps the new value once the whole
    /// byte went out.
    fn commit(&mut self, previous: Registers, data: u8) -> Result<(), Error<I::Error>> {
        let result = self.command(data);
        if result.is_err() {
            self.regs = previous;
        }
        result
    }

    fn update_display_control(
        &mut self,
        flag: DisplayControl,
        on: bool,
    ) -> Result<(), Error<I::Error>> {
        let previous = self.regs;
        let data = self.regs.display_control(flag, on);
        self.commit(previous, data)
    }

    fn update_entry_mode(&mut self, flag: EntryMode, on: bool) -> Result<(), Error<I::Error>> {
        let previous = self.regs;
        let data = self.regs.entry_mode(flag, on);
        self.commit(previous, data)
    }

    /// Switch the backlight. A no-op instruction is sent so the new state reaches the
    /// expander right away.
    pub fn backlight(&mut self, backlight: Backlight) -> Result<(), Error<I::Error>> {
        trace!("lcd: backlight {}", backlight);
        self.regs.backlight = backlight;
        self.command(Command::NoOp as u8)
    }

    /// Write a single character at the cursor.
    pub fn write_char(&mut self, c: char) -> Result<(), Error<I::Error>> {
        self.send(c as u8, Mode::Data).map_err(Error::Transport)
    }

    /// Write string to display at the cursor. Nothing wraps or truncates.
    pub fn write_str(&mut self, data: &str) -> Result<(), Error<I::Error>> {
        for c in data.chars() {
            self.write_char(c)?;
        }
        Ok(())
    }

    /// Write string from the start of `line`.
    pub fn writeln(&mut self, data: &str, line: u8) -> Result<(), Error<I::Error>> {
        self.set_cursor(0, line)?;
        self.write_str(data)
    }

    /// Clear the display
    pub fn clear(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::Clear as u8)?;
        self.delay.delay_us(self.timing.clear_settle_us);
        Ok(())
    }

    /// Return cursor to upper left corner, i.e. (0,0).
    pub fn return_home(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::ReturnHome as u8)?;
        self.delay.delay_us(self.timing.clear_settle_us);
        Ok(())
    }

    /// Set the cursor to (col, row). Coordinates are zero-based. Rows past the configured row
    /// count are rejected before anything is sent.
    ///
    /// Columns are not checked against the display width: the address is the row base plus
    /// `col`, so a column past the end of a row lands in DDRAM of another row (or off screen),
    /// e.g. `set_cursor(0x40, 0)` addresses the start of row 1.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Error<I::Error>> {
        let rows = self.rows;
        match protocol::ddram_address(col, row, rows) {
            Some(data) => self.command(data),
            None => {
                warn!("lcd: row {} rejected, {} rows", row, rows);
                Err(Error::InvalidRow { row, rows })
            }
        }
    }

    pub fn cursor(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorOn, true)
    }

    pub fn no_cursor(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorOn, false)
    }

    pub fn display(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::DisplayOn, true)
    }

    /// Blank the display. DDRAM content is kept.
    pub fn no_display(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::DisplayOn, false)
    }

    pub fn blink(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorBlink, true)
    }

    pub fn no_blink(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorBlink, false)
    }

    pub fn left_to_right(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::EntryLeft, true)
    }

    pub fn right_to_left(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::EntryLeft, false)
    }

    /// Shift the display on every write instead of moving the cursor.
    pub fn autoscroll(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::ShiftIncrement, true)
    }

    pub fn no_autoscroll(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::ShiftIncrement, false)
    }

    /// Moves the cursor one char to the left
    pub fn cursor_move_left(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8)
    }

    /// Moves the cursor one char to the right
    pub fn cursor_move_right(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8 | Shift::MoveRight as u8)
    }

    /// Scrolls the display one char to the left
    pub fn display_move_left(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8 | Shift::DisplayMove as u8)
    }

    /// Scrolls the display one char to the right
    pub fn display_move_right(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8 | Shift::DisplayMove as u8 | Shift::MoveRight as u8)
    }

    /// Last display control byte sent to the controller.
    pub fn display_control(&self) -> u8 {
        self.regs.display_control
    }

    /// Last entry mode byte sent to the controller.
    pub fn entry_mode(&self) -> u8 {
        self.regs.entry_mode
    }

    /// Function set byte sent during initialization.
    pub fn function_set(&self) -> u8 {
        self.regs.function_set
    }

    pub fn backlight_state(&self) -> Backlight {
        self.regs.backlight
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }
}

impl<'a, I, D> uWrite for Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = Error<I::Error>;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write_str(s)
    }
}

impl<'a, I, D> fmt::Write for Lcd<'a, I, D>
where
    I: I2c,
    D: DelayNs,
{
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Lcd::write_str(self, s).map_err(|_| fmt::Error)
    }
}
