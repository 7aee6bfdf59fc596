use embedded_hal_async::{delay::DelayNs, i2c::I2c};

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

    pub fn with_backlight(mut self, backlight: Backlight) -> Self {
        self.config.backlight = backlight;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.config.timing = timing;
        self
    }

    /// Initializes the hardware, see [`crate::sync_lcd::LcdBuilder::init`].
    pub async fn init(self) -> Result<Lcd<'a, I, D>, Error<I::Error>> {
        let mut lcd = Lcd {
            i2c: self.i2c,
            delay: self.delay,
            address: self.config.address,
            rows: self.config.rows,
            timing: self.config.timing,
            regs: Registers::new(&self.config),
        };
        debug!("lcd: bring-up at address {=u8:#x}", lcd.address);
        match lcd.bring_up().await {
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
    /// Start configuring a display with the I2C and delay instance.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(i2c: &'a mut I, delay: &'a mut D) -> LcdBuilder<'a, I, D> {
        LcdBuilder {
            i2c,
            delay,
            config: Config::new(),
        }
    }

    async fn bring_up(&mut self) -> Result<(), I::Error> {
        self.delay.delay_us(self.timing.power_on_us).await;

        for _ in 0..BRING_UP_REPEAT {
            self.pulse(BRING_UP_8BIT, Mode::Cmd).await?;
            self.delay.delay_us(self.timing.bring_up_settle_us).await;
        }
        self.pulse(BRING_UP_4BIT, Mode::Cmd).await?;
        self.delay.delay_us(self.timing.bring_up_settle_us).await;

        let registers = [
            self.regs.function_set,
            self.regs.display_control,
            self.regs.entry_mode,
        ];
        for data in registers.iter() {
            self.send(*data, Mode::Cmd).await?;
        }

        self.send(Command::Clear as u8, Mode::Cmd).await?;
        self.delay.delay_us(self.timing.clear_settle_us).await;

        self.delay.delay_us(self.timing.ready_settle_us).await;
        Ok(())
    }

    async fn pulse(&mut self, nibble: u8, mode: Mode) -> Result<(), I::Error> {
        let [high, low] = protocol::strobe(self.regs.compose(nibble, mode));
        self.i2c.write(self.address, &[high]).await?;
        self.delay.delay_us(self.timing.enable_high_us).await;
        self.i2c.write(self.address, &[low]).await?;
        self.delay.delay_us(self.timing.enable_low_us).await;
        Ok(())
    }

    async fn send(&mut self, data: u8, mode: Mode) -> Result<(), I::Error> {
        let [high, low] = protocol::split(data);
        self.pulse(high, mode).await?;
        self.pulse(low, mode).await
    }

    async fn command(&mut self, data: u8) -> Result<(), Error<I::Error>> {
        self.send(data, Mode::Cmd).await.map_err(Error::Transport)
    }

    async fn commit(&mut self, previous: Registers, data: u8) -> Result<(), Error<I::Error>> {
        let result = self.command(data).await;
        if result.is_err() {
            self.regs = previous;
        }
        result
    }

    async fn update_display_control(
        &mut self,
        flag: DisplayControl,
        on: bool,
    ) -> Result<(), Error<I::Error>> {
        let previous = self.regs;
        let data = self.regs.display_control(flag, on);
        self.commit(previous, data).await
    }

    async fn update_entry_mode(
        &mut self,
        flag: EntryMode,
        on: bool,
    ) -> Result<(), Error<I::Error>> {
        let previous = self.regs;
        let data = self.regs.entry_mode(flag, on);
        self.commit(previous, data).await
    }

    pub async fn backlight(&mut self, backlight: Backlight) -> Result<(), Error<I::Error>> {
        trace!("lcd: backlight {}", backlight);
        self.regs.backlight = backlight;
        self.command(Command::NoOp as u8).await
    }

    pub async fn write_char(&mut self, c: char) -> Result<(), Error<I::Error>> {
        self.send(c as u8, Mode::Data)
            .await
            .map_err(Error::Transport)
    }

    /// Write string to display.
    pub async fn write_str(&mut self, data: &str) -> Result<(), Error<I::Error>> {
        for c in data.chars() {
            self.write_char(c).await?;
        }
        Ok(())
    }

    pub async fn writeln(&mut self, data: &str, line: u8) -> Result<(), Error<I::Error>> {
        self.set_cursor(0, line).await?;
        self.write_str(data).await
    }

    /// Clear the display
    pub async fn clear(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::Clear as u8).await?;
        self.delay.delay_us(self.timing.clear_settle_us).await;
        Ok(())
    }

    /// Return cursor to upper left corner, i.e. (0,0).
    pub async fn return_home(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::ReturnHome as u8).await?;
        self.delay.delay_us(self.timing.clear_settle_us).await;
        Ok(())
    }

    /// Set the cursor to (col, row). Coordinates are zero-based. Columns are not checked, see
    /// [`crate::sync_lcd::Lcd::set_cursor`].
    pub async fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), Error<I::Error>> {
        let rows = self.rows;
        match protocol::ddram_address(col, row, rows) {
            Some(data) => self.command(data).await,
            None => {
                warn!("lcd: row {} rejected, {} rows", row, rows);
                Err(Error::InvalidRow { row, rows })
            }
        }
    }

    pub async fn cursor(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorOn, true)
            .await
    }

    pub async fn no_cursor(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorOn, false)
            .await
    }

    pub async fn display(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::DisplayOn, true)
            .await
    }

    pub async fn no_display(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::DisplayOn, false)
            .await
    }

    pub async fn blink(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorBlink, true)
            .await
    }

    pub async fn no_blink(&mut self) -> Result<(), Error<I::Error>> {
        self.update_display_control(DisplayControl::CursorBlink, false)
            .await
    }

    pub async fn left_to_right(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::EntryLeft, true).await
    }

    pub async fn right_to_left(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::EntryLeft, false).await
    }

    pub async fn autoscroll(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::ShiftIncrement, true)
            .await
    }

    pub async fn no_autoscroll(&mut self) -> Result<(), Error<I::Error>> {
        self.update_entry_mode(EntryMode::ShiftIncrement, false)
            .await
    }

    /// Moves the cursor one char to the left
    pub async fn cursor_move_left(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8).await
    }

    /// Moves the cursor one char to the right
    pub async fn cursor_move_right(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8 | Shift::MoveRight as u8)
            .await
    }

    /// Scrolls the display one char to the left
    pub async fn display_move_left(&mut self) -> Result<(), Error<I::Error>> {
        self.command(Command::CursorShift as u8 | Shift::DisplayMove as u8)
            .await
    }

    /// Scrolls the display one char to the right
    pub async fn display_move_right(&mut self) -> Result<(), Error<I::Error>> {
        self.command(
            Command::CursorShift as u8 | Shift::DisplayMove as u8 | Shift::MoveRight as u8,
        )
        .await
    }

    pub fn display_control(&self) -> u8 {
        self.regs.display_control
    }

    pub fn entry_mode(&self) -> u8 {
        self.regs.entry_mode
    }

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

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };
    use futures::executor::block_on;
    use std::vec::Vec;

    const ADDR: u8 = 0x27;

    #[derive(Default)]
    struct RecordingDelay {
        ns: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.ns.push(ns);
        }
    }

    fn strobes(bytes: &[u8]) -> Vec<I2cTransaction> {
        bytes
            .iter()
            .flat_map(|b| {
                std::vec![
                    I2cTransaction::write(ADDR, std::vec![b | 0x04]),
                    I2cTransaction::write(ADDR, std::vec![*b]),
                ]
            })
            .collect()
    }

    fn init_bytes() -> Vec<u8> {
        std::vec![
            0x38, 0x38, 0x38, 0x28, // raw bring-up nibbles
            0x28, 0x88, // function set 0x28
            0x08, 0xc8, // display control 0x0c
            0x08, 0x68, // entry mode 0x06
            0x08, 0x18, // clear
        ]
    }

    #[test]
    fn init_and_write() {
        let mut bytes = init_bytes();
        bytes.extend_from_slice(&[0xc8, 0x08, 0x49, 0x19]);
        let mut i2c = I2cMock::new(&strobes(&bytes));
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
            lcd.writeln("A", 1).await.unwrap();
            assert_eq!(
                lcd.set_cursor(0, 4).await,
                Err(Error::InvalidRow { row: 4, rows: 4 })
            );
        });
        i2c.done();
    }

    #[test]
    fn toggles_and_backlight() {
        let mut bytes = init_bytes();
        bytes.extend_from_slice(&[
            0x08, 0xd8, // blink: 0x0d
            0x08, 0x78, // autoscroll: 0x07
            0x00, 0x00, // no-op, backlight off
            0x10, 0xc0, // display right: 0x1c
        ]);
        let mut i2c = I2cMock::new(&strobes(&bytes));
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
            lcd.blink().await.unwrap();
            lcd.autoscroll().await.unwrap();
            lcd.backlight(Backlight::Off).await.unwrap();
            lcd.display_move_right().await.unwrap();
            assert_eq!(lcd.display_control(), 0x0d);
            assert_eq!(lcd.entry_mode(), 0x07);
        });
        i2c.done();
    }

    #[test]
    fn init_delays() {
        let mut i2c = I2cMock::new(&strobes(&init_bytes()));
        let mut delay = RecordingDelay::default();
        block_on(async {
            Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
        });

        let ns = &delay.ns;
        assert_eq!(ns.len(), 1 + 4 * 3 + 4 * 2 * 2 + 2);
        assert_eq!(ns[0], 50_000_000);
        assert_eq!(&ns[1..4], &[500_000, 100_000, 4_100_000]);
        assert_eq!(&ns[ns.len() - 2..], &[200_000_000, 5_000_000]);
        i2c.done();
    }

    #[test]
    fn register_toggles_round_trip() {
        let mut bytes = init_bytes();
        bytes.extend_from_slice(&[
            0x08, 0xe8, // cursor: 0x0e
            0x08, 0xc8, // no cursor: 0x0c
            0x08, 0x88, // no display: 0x08
            0x08, 0xc8, // display: 0x0c
            0x08, 0x48, // right to left: 0x04
            0x08, 0x58, // autoscroll: 0x05
            0x08, 0x48, // no autoscroll: 0x04
            0x08, 0x68, // left to right: 0x06
        ]);
        let mut i2c = I2cMock::new(&strobes(&bytes));
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
            lcd.cursor().await.unwrap();
            assert_eq!(lcd.display_control(), 0x0e);
            lcd.no_cursor().await.unwrap();
            assert_eq!(lcd.display_control(), 0x0c);
            lcd.no_display().await.unwrap();
            lcd.display().await.unwrap();
            assert_eq!(lcd.entry_mode(), 0x06);

            lcd.right_to_left().await.unwrap();
            lcd.autoscroll().await.unwrap();
            assert_eq!(lcd.entry_mode(), 0x05);
            lcd.no_autoscroll().await.unwrap();
            lcd.left_to_right().await.unwrap();
            assert_eq!(lcd.entry_mode(), 0x06);
            assert_eq!(lcd.display_control(), 0x0c);
            assert_eq!(lcd.function_set(), 0x28);
        });
        i2c.done();
    }

    #[test]
    fn failed_enable_low_write_stops_transfer() {
        let mut transactions = strobes(&init_bytes());
        transactions.push(I2cTransaction::write(ADDR, std::vec![0x4d]));
        transactions.push(I2cTransaction::write(ADDR, std::vec![0x49]).with_error(ErrorKind::Other));
        let mut i2c = I2cMock::new(&transactions);
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
            assert_eq!(
                lcd.write_str("AB").await,
                Err(Error::Transport(ErrorKind::Other))
            );
        });
        i2c.done();
    }

    #[test]
    fn failed_toggle_keeps_register_mirror() {
        let mut transactions = strobes(&init_bytes());
        // blink: 0x0d, high nibble
        transactions.push(I2cTransaction::write(ADDR, std::vec![0x0c]));
        transactions.push(I2cTransaction::write(ADDR, std::vec![0x08]).with_error(ErrorKind::Other));
        let mut i2c = I2cMock::new(&transactions);
        let mut delay = NoopDelay::new();
        block_on(async {
            let mut lcd = Lcd::new(&mut i2c, &mut delay).init().await.unwrap();
            assert_eq!(lcd.blink().await, Err(Error::Transport(ErrorKind::Other)));
            assert_eq!(lcd.display_control(), 0x0c);
        });
        i2c.done();
    }

    #[test]
    fn init_failure() {
        let transactions =
            [I2cTransaction::write(ADDR, std::vec![0x3c]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&transactions);
        let mut delay = NoopDelay::new();
        let result = block_on(Lcd::new(&mut i2c, &mut delay).init());
        assert!(matches!(result, Err(Error::Init(ErrorKind::Other))));
        i2c.done();
    }
}
