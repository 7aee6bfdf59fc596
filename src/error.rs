use core::fmt;

/// Errors of the LCD driver, generic over the I2C error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// A byte write on the bus failed. The controller may be left mid transfer, re-run the
    /// initialization before trusting the display again. A failed register toggle leaves the
    /// driver's register mirror at its value before the call.
    Transport(E),
    /// Requested row is outside the configured row count. Nothing was sent.
    InvalidRow { row: u8, rows: u8 },
    /// The bus failed during the power-on sequence.
    Init(E),
}

impl<E> Error<E> {
    /// The underlying bus error, if any.
    pub fn transport_error(&self) -> Option<&E> {
        match self {
            Error::Transport(e) | Error::Init(e) => Some(e),
            Error::InvalidRow { .. } => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "I2C write failed: {:?}", e),
            Error::InvalidRow { row, rows } => {
                write!(f, "row {} out of range, display has {} rows", row, rows)
            }
            Error::Init(e) => write!(f, "LCD initialization failed: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Transport(_e) => defmt::write!(fmt, "I2C error"),
            Error::InvalidRow { row, rows } => {
                defmt::write!(fmt, "Row {} out of range ({} rows)", row, rows)
            }
            Error::Init(_e) => defmt::write!(fmt, "Initialization failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use std::string::ToString;

    #[test]
    fn display_names_the_row() {
        let err: Error<ErrorKind> = Error::InvalidRow { row: 5, rows: 4 };
        assert_eq!(err.to_string(), "row 5 out of range, display has 4 rows");
        assert_eq!(err.transport_error(), None);
    }

    #[test]
    fn init_keeps_bus_error() {
        let err = Error::Init(ErrorKind::Other);
        assert_eq!(err.transport_error(), Some(&ErrorKind::Other));
    }
}
