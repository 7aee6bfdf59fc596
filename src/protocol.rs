//! Controller state mirror and the byte layout of the 4-bit bus, shared by the blocking and
//! async drivers. Nothing here touches the bus.

use crate::{
    Backlight, Command, Config, DisplayControl, EntryMode, FunctionSet, Mode, Pin, ROW_OFFSETS,
};

/// Raw nibbles of the bring-up sequence, sent before the bus width is known.
pub(crate) const BRING_UP_8BIT: u8 = Command::FunctionSet as u8 | FunctionSet::Bit8 as u8;
pub(crate) const BRING_UP_4BIT: u8 = Command::FunctionSet as u8;
pub(crate) const BRING_UP_REPEAT: usize = 3;

/// Mirror of the controller's write-only registers. Every field holds the full command byte
/// last sent to the controller, opcode included.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Registers {
    pub function_set: u8,
    pub display_control: u8,
    pub entry_mode: u8,
    pub backlight: Backlight,
}

impl Registers {
    /// Power-on values: display on, cursor and blink off, left to right entry.
    pub fn new(config: &Config) -> Self {
        let lines = if config.rows > 1 {
            FunctionSet::TwoLine as u8
        } else {
            0x00
        };
        Self {
            function_set: Command::FunctionSet as u8 | lines | config.font as u8,
            display_control: Command::DisplayControl as u8 | DisplayControl::DisplayOn as u8,
            entry_mode: Command::EntryModeSet as u8 | EntryMode::EntryLeft as u8,
            backlight: config.backlight,
        }
    }

    /// Updates one display control flag and returns the full command byte to send.
    pub fn display_control(&mut self, flag: DisplayControl, on: bool) -> u8 {
        self.display_control = apply(self.display_control, flag as u8, on);
        self.display_control
    }

    /// Updates one entry mode flag and returns the full command byte to send.
    pub fn entry_mode(&mut self, flag: EntryMode, on: bool) -> u8 {
        self.entry_mode = apply(self.entry_mode, flag as u8, on);
        self.entry_mode
    }

    /// Expander byte for one nibble transfer, enable line low.
    pub fn compose(&self, nibble: u8, mode: Mode) -> u8 {
        (nibble & 0xf0) | mode as u8 | self.backlight as u8
    }
}

fn apply(register: u8, flag: u8, on: bool) -> u8 {
    if on {
        register | flag
    } else {
        register & !flag
    }
}

/// High nibble first, then the low nibble moved into the data lines.
pub(crate) fn split(value: u8) -> [u8; 2] {
    [value & 0xf0, (value << 4) & 0xf0]
}

/// The two writes of an enable pulse: strobe high, then low with the same payload.
pub(crate) fn strobe(byte: u8) -> [u8; 2] {
    [byte | Pin::Enable as u8, byte & !(Pin::Enable as u8)]
}

/// Set DDRAM address command for a position, `None` if the row is not available.
pub(crate) fn ddram_address(col: u8, row: u8, rows: u8) -> Option<u8> {
    if row >= rows {
        return None;
    }
    let offset = *ROW_OFFSETS.get(row as usize)?;
    Some(Command::SetDdramAddr as u8 | col.wrapping_add(offset))
}
