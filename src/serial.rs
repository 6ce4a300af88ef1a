//! Console byte streams.
//!
//! [ByteSource] is what a [Console](crate::console::Console) reads from and
//! echoes to. Any blocking-free [embedded_io] stream qualifies, including
//! [BufferedSerial], the console half of the interrupt-fed UART rings used
//! on the board.

use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use embedded_io::{ErrorType, Read, ReadReady, Write, WriteReady};
use heapless::spsc::{Consumer, Producer, Queue};

use crate::error::SerialError;

/// Non-blocking byte stream consumed one byte at a time.
pub trait ByteSource {
    fn data_ready(&mut self) -> bool;
    fn get(&mut self) -> Option<u8>;
    fn put(&mut self, byte: u8);
}

impl<T: Read + ReadReady + Write> ByteSource for T {
    fn data_ready(&mut self) -> bool {
        self.read_ready().unwrap_or(false)
    }

    fn get(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn put(&mut self, byte: u8) {
        // Console output is best effort.
        let _ = self.write_all(&[byte]);
    }
}

/// [fmt::Write] adapter that echoes text into a [ByteSource].
pub struct Echo<'a, S: ?Sized>(&'a mut S);

impl<'a, S: ByteSource + ?Sized> Echo<'a, S> {
    pub fn new(port: &'a mut S) -> Self {
        Self(port)
    }
}

impl<S: ByteSource + ?Sized> fmt::Write for Echo<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.0.put(byte);
        }
        Ok(())
    }
}

/// Receive and transmit rings of an interrupt-driven UART.
///
/// Place it in a `static` and [split](Self::split) it once at startup: the
/// [UartIsr] half goes to the interrupt handlers, the [BufferedSerial] half
/// to a [Console](crate::console::Console). Usable capacity is `N - 1`.
pub struct UartBuffers<const N: usize = 64> {
    rx: Queue<u8, N>,
    tx: Queue<u8, N>,
    rx_overflow: AtomicBool,
}

impl<const N: usize> UartBuffers<N> {
    pub const fn new() -> Self {
        const { assert!(N.is_power_of_two(), "ring size must be a power of two") };
        Self {
            rx: Queue::new(),
            tx: Queue::new(),
            rx_overflow: AtomicBool::new(false),
        }
    }

    /// Hand out the interrupt side and the console side.
    pub fn split(&mut self) -> (UartIsr<'_>, BufferedSerial<'_>) {
        let (rx_producer, rx_consumer) = self.rx.split();
        let (tx_producer, tx_consumer) = self.tx.split();
        (
            UartIsr {
                rx: rx_producer,
                tx: tx_consumer,
                rx_overflow: &self.rx_overflow,
            },
            BufferedSerial {
                rx: rx_consumer,
                tx: tx_producer,
                rx_overflow: &self.rx_overflow,
            },
        )
    }
}

impl<const N: usize> Default for UartBuffers<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt handler end of a [UartBuffers].
pub struct UartIsr<'a> {
    rx: Producer<'a, u8>,
    tx: Consumer<'a, u8>,
    rx_overflow: &'a AtomicBool,
}

impl UartIsr<'_> {
    /// Receive interrupt. A byte that does not fit is dropped and the
    /// overflow flag is latched.
    pub fn isr_receive(&mut self, byte: u8) {
        if self.rx.enqueue(byte).is_err() && !self.rx_overflow.swap(true, Ordering::AcqRel) {
            log::warn!("UART receive overflow");
        }
    }

    /// Transmit-ready interrupt. Returns the next byte to shift out.
    pub fn isr_transmit(&mut self) -> Option<u8> {
        self.tx.dequeue()
    }
}

/// Idle loop end of a [UartBuffers]. Never blocks.
pub struct BufferedSerial<'a> {
    rx: Consumer<'a, u8>,
    tx: Producer<'a, u8>,
    rx_overflow: &'a AtomicBool,
}

impl BufferedSerial<'_> {
    /// Read and clear the sticky receive overflow flag.
    pub fn take_rx_overflow(&self) -> bool {
        self.rx_overflow.swap(false, Ordering::AcqRel)
    }
}

impl ErrorType for BufferedSerial<'_> {
    type Error = SerialError;
}

impl Read for BufferedSerial<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.rx.ready() {
            return Err(SerialError::WouldBlock);
        }

        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.rx.dequeue() {
                Some(byte) => *slot = byte,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }
}

impl ReadReady for BufferedSerial<'_> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.rx.ready())
    }
}

impl Write for BufferedSerial<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        for &byte in buf {
            if self.tx.enqueue(byte).is_err() {
                break;
            }
            count += 1;
        }

        if count == 0 && !buf.is_empty() {
            return Err(SerialError::TxFull);
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl WriteReady for BufferedSerial<'_> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.tx.ready())
    }
}
