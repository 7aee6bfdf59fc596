#![no_std]
//! Driver for HD44780 character LCDs connected through a PCF8574 I2C expander (the common
//! "I2C backpack"), running the controller in 4-bit mode. It requires an I2C instance
//! implementing [`embedded_hal::i2c::I2c`] and a delay implementing
//! [`embedded_hal::delay::DelayNs`].
//!
//! The expander byte is wired as `D7 D6 D5 D4 BL EN RW RS`, so every byte the driver writes
//! carries one nibble of data, the register select, the enable strobe and the backlight.
//!
//! Usage:
//! ```ignore
//! const LCD_ADDRESS: u8 = 0x27; // Address depends on hardware
//!
//! let mut lcd = lcd_hd44780_i2c::Lcd::new(&mut i2c, &mut delay)
//!     .with_address(LCD_ADDRESS)
//!     .with_rows(4)
//!     .init()?;
//!
//! lcd.writeln("Hello", 0)?;
//! lcd.set_cursor(3, 1)?;
//! lcd.cursor()?;
//! lcd.write_str("world")?;
//! ```
//!
//! Enable the `async` feature for the same driver over `embedded-hal-async`, and the `defmt`
//! feature to get driver events and errors through `defmt`.

#[macro_use]
mod fmt;

#[cfg(feature = "async")]
pub mod async_lcd;
mod error;
mod protocol;
pub mod sync_lcd;

pub use error::Error;
pub use sync_lcd::{Lcd, LcdBuilder};

/// Default I2C address of PCF8574 backpacks.
pub const DEFAULT_ADDRESS: u8 = 0x27;

/// Highest number of rows with a known DDRAM layout.
pub const MAX_ROWS: u8 = 4;

/// DDRAM base address of each row on 16x4 and 20x4 layouts. 1 and 2 row displays use a prefix.
const ROW_OFFSETS: [u8; MAX_ROWS as usize] = [0x00, 0x40, 0x14, 0x54];

/// Backlight line of the expander. Not part of the controller's command stream, it is OR'ed
/// into every byte written to the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Backlight {
    Off = 0x00,
    On = 0x08,
}

/// Character font, part of the function set register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Font {
    Font5x8 = 0x00,
    Font5x10 = 0x04,
}

/// Control pins of the expander byte.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Pin {
    Enable = 0x04,
}

/// Register select: instruction or data register.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Cmd = 0x00,
    Data = 0x01,
}

/// Instruction opcodes.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Command {
    NoOp = 0x00,
    Clear = 0x01,
    ReturnHome = 0x02,
    EntryModeSet = 0x04,
    DisplayControl = 0x08,
    CursorShift = 0x10,
    FunctionSet = 0x20,
    SetDdramAddr = 0x80,
}

/// Flags of the display control register.
#[repr(u8)]
#[derive(Copy, Clone)]
enum DisplayControl {
    CursorBlink = 0x01,
    CursorOn = 0x02,
    DisplayOn = 0x04,
}

/// Flags of the entry mode register.
#[repr(u8)]
#[derive(Copy, Clone)]
enum EntryMode {
    ShiftIncrement = 0x01,
    EntryLeft = 0x02,
}

/// Flags of the function set register.
#[repr(u8)]
#[derive(Copy, Clone)]
enum FunctionSet {
    TwoLine = 0x08,
    Bit8 = 0x10,
}

/// Flags of the cursor/display shift instruction. Cursor move and left are the zero values.
#[repr(u8)]
#[derive(Copy, Clone)]
enum Shift {
    MoveRight = 0x04,
    DisplayMove = 0x08,
}

/// Minimum delays of each protocol step, in microseconds.
///
/// The defaults are conservative for cheap backpacks. Tests and fast boards may shorten them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Wait after power on before the first bring-up nibble.
    pub power_on_us: u32,
    /// Settle time after each raw bring-up nibble.
    pub bring_up_settle_us: u32,
    /// How long the enable line is held high.
    pub enable_high_us: u32,
    /// Hold after the enable line falls, before the next transfer.
    pub enable_low_us: u32,
    /// Settle time after clear and return home.
    pub clear_settle_us: u32,
    /// Final settle time of the initialization.
    pub ready_settle_us: u32,
}

impl Timing {
    pub const fn new() -> Self {
        Self {
            power_on_us: 50_000,
            bring_up_settle_us: 4_100,
            enable_high_us: 500,
            enable_low_us: 100,
            clear_settle_us: 200_000,
            ready_settle_us: 5_000,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings applied by the initialization sequence.
#[derive(Copy, Clone, Debug)]
struct Config {
    address: u8,
    rows: u8,
    font: Font,
    backlight: Backlight,
    timing: Timing,
}

impl Config {
    const fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            rows: MAX_ROWS,
            font: Font::Font5x8,
            backlight: Backlight::On,
            timing: Timing::new(),
        }
    }

    fn set_rows(&mut self, rows: u8) {
        self.rows = rows.clamp(1, MAX_ROWS);
    }
}
