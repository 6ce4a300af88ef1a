//! Our error types for the adapter board.

use thiserror::Error;

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error raised while talking to an FNP PSU over the bus.
#[derive(Error, Debug)]
pub enum Error<E: embedded_hal::i2c::Error> {
    #[error("Bus transaction failed")]
    Bus(E),
    #[error("Unsupported voltage scale exponent ({0})")]
    UnsupportedScale(u8),
}

/// Reasons a console command argument is rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamError {
    #[error("Missing parameter")]
    Missing,
    #[error("Parameter out of range")]
    OutOfRange,
    #[error("Malformed parameter")]
    Malformed,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("No free soft timer slots")]
    PoolExhausted,
}

/// Errors from the buffered UART.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    #[error("No data available")]
    WouldBlock,
    #[error("Transmit buffer full")]
    TxFull,
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialError::WouldBlock => embedded_io::ErrorKind::Other,
            SerialError::TxFull => embedded_io::ErrorKind::OutOfMemory,
        }
    }
}
