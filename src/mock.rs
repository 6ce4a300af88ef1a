//! We use this mocking module in unit tests to stand in for the board's
//! hardware: the console UART, the PSU bus, PS_ON, EEPROM, watchdog and
//! display.

use std::collections::{BTreeMap, VecDeque};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, OutputPin, StatefulOutputPin},
    i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation},
};

use crate::{
    board::{Board, Watchdog},
    config::PersistentStore,
    display::{DisplayFrame, StatusDisplay},
    register::FnpRegister,
};

/// Console serial port with scripted input and captured output.
#[derive(Debug, Default)]
pub struct MockSerial {
    input: VecDeque<u8>,
    written: Vec<u8>,
    should_error_on_write: bool,
    should_error_on_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSerialError {
    /// Would block - no data available
    WouldBlock,
    /// Generic simulated error for testing
    SimulatedError,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        if self.input.is_empty() {
            return Err(MockSerialError::WouldBlock);
        }

        let count = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.input.is_empty())
    }
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if typed by the user.
    pub fn push_input(&mut self, data: &[u8]) {
        self.input.extend(data);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn written_data(&self) -> &[u8] {
        &self.written
    }

    pub fn clear_written_data(&mut self) {
        self.written.clear();
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

/// Simulated no-acknowledge from an absent or failing PSU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack;

impl i2c::Error for Nack {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

/// PSU bus where each present device is a 256-byte register file with an
/// auto-incrementing register pointer.
#[derive(Debug, Default)]
pub struct MockBus {
    devices: BTreeMap<u8, [u8; 256]>,
    failing: Vec<u8>,
    pointer: u8,
    writes: Vec<(u8, u8, u8)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a PSU set to 12.00 V, reading 11.98 V and 5.12 A.
    pub fn with_psu(mut self, address: u8) -> Self {
        let mut regs = [0u8; 256];
        let mut put_text = |len: FnpRegister, first: FnpRegister, text: &str| {
            regs[len as usize] = text.len() as u8;
            let start = first as usize;
            regs[start..start + text.len()].copy_from_slice(text.as_bytes());
        };

        put_text(FnpRegister::ModelLen, FnpRegister::Model, "FNP850-12RG");
        put_text(
            FnpRegister::SerialLen,
            FnpRegister::Serial,
            &format!("SN{address:04X}"),
        );
        put_text(FnpRegister::RevLen, FnpRegister::Rev, "03");
        put_text(FnpRegister::MfgNameLen, FnpRegister::MfgName, "DELTA");

        regs[FnpRegister::MfgYear as usize] = 14;
        regs[FnpRegister::MfgMonth as usize] = 6;
        regs[FnpRegister::MfgDay as usize] = 12;

        let hours = FnpRegister::HoursInService as usize;
        regs[hours..hours + 4].copy_from_slice(&0x0001_2345u32.to_be_bytes());

        let mut put_reading = |msb: FnpRegister, lsb: FnpRegister, scale: FnpRegister, raw: u16, exp: u8| {
            let [hi, lo] = raw.to_be_bytes();
            regs[msb as usize] = hi;
            regs[lsb as usize] = lo;
            regs[scale as usize] = exp;
        };
        put_reading(
            FnpRegister::MeasVoltageMsb,
            FnpRegister::MeasVoltageLsb,
            FnpRegister::MeasVoltageScale,
            11980,
            0,
        );
        put_reading(
            FnpRegister::MeasCurrentMsb,
            FnpRegister::MeasCurrentLsb,
            FnpRegister::MeasCurrentScale,
            512,
            1,
        );
        put_reading(
            FnpRegister::SetVoltageMsb,
            FnpRegister::SetVoltageLsb,
            FnpRegister::SetVoltageScale,
            12000,
            0,
        );

        self.devices.insert(address, regs);
        self
    }

    pub fn set_register(&mut self, address: u8, register: u8, value: u8) {
        if let Some(regs) = self.devices.get_mut(&address) {
            regs[register as usize] = value;
        }
    }

    /// Make a present PSU stop acknowledging.
    pub fn set_failing(&mut self, address: u8, failing: bool) {
        self.failing.retain(|&a| a != address);
        if failing {
            self.failing.push(address);
        }
    }

    /// Register writes carrying data, as (address, register, value).
    pub fn writes(&self) -> &[(u8, u8, u8)] {
        &self.writes
    }
}

impl i2c::ErrorType for MockBus {
    type Error = Nack;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.failing.contains(&address) {
            return Err(Nack);
        }
        let regs = self.devices.get_mut(&address).ok_or(Nack)?;

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let Some((&register, data)) = bytes.split_first() else {
                        continue;
                    };
                    self.pointer = register;
                    for &value in data {
                        regs[self.pointer as usize] = value;
                        self.writes.push((address, self.pointer, value));
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = regs[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

/// PS_ON line recording every level it is driven to.
#[derive(Debug, Default)]
pub struct MockPin {
    high: bool,
    history: Vec<bool>,
}

impl MockPin {
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Levels driven so far, `true` for high.
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl PinErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.history.push(true);
        Ok(())
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

/// Delay that only adds up how long it was asked to wait.
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreError;

/// 64 bytes of EEPROM, erased to `0xFF`.
#[derive(Debug)]
pub struct MockStore {
    data: [u8; 64],
    writes: usize,
    should_error_on_write: bool,
}

impl MockStore {
    pub fn blank() -> Self {
        Self {
            data: [0xFF; 64],
            writes: 0,
            should_error_on_write: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }
}

impl PersistentStore for MockStore {
    type Error = StoreError;

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        let src = self.data.get(start..start + buf.len()).ok_or(StoreError)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(StoreError);
        }
        let start = address as usize;
        let dst = self
            .data
            .get_mut(start..start + data.len())
            .ok_or(StoreError)?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockWatchdog {
    feeds: u32,
    resets: u32,
}

impl MockWatchdog {
    pub fn feeds(&self) -> u32 {
        self.feeds
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }
}

impl Watchdog for MockWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Display that keeps every frame it is given.
#[derive(Debug, Default)]
pub struct MockDisplay {
    frames: Vec<DisplayFrame>,
    steps: usize,
}

impl MockDisplay {
    pub fn frames(&self) -> &[DisplayFrame] {
        &self.frames
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl StatusDisplay for MockDisplay {
    fn start_update(&mut self, frame: &DisplayFrame) {
        self.frames.push(frame.clone());
    }

    fn process(&mut self) {
        self.steps += 1;
    }
}

pub type TestBoard = Board<MockBus, MockPin, MockDelay, MockStore, MockWatchdog>;

pub fn test_board(bus: MockBus) -> TestBoard {
    Board::new(
        bus,
        MockPin::default(),
        MockDelay::default(),
        MockStore::blank(),
        MockWatchdog::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::ByteSource;

    #[test]
    fn serial_reads_scripted_input() {
        let mut mock = MockSerial::new();
        assert!(!mock.data_ready());

        mock.push_input(b"hi");
        assert_eq!(mock.get(), Some(b'h'));
        assert_eq!(mock.pending_input(), 1);
        assert_eq!(mock.get(), Some(b'i'));
        assert_eq!(mock.get(), None);
    }

    #[test]
    fn serial_error_simulation() {
        let mut mock = MockSerial::new();
        mock.push_input(b"x");
        mock.set_read_error(true);
        assert_eq!(mock.get(), None);

        mock.set_write_error(true);
        mock.put(b'y');
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn bus_nacks_unknown_and_failing_addresses() {
        let mut bus = MockBus::new().with_psu(0x41);
        let mut buf = [0u8; 1];

        assert_eq!(bus.write_read(0x42, &[0x00], &mut buf), Err(Nack));
        assert!(bus.write_read(0x41, &[0x00], &mut buf).is_ok());
        assert_eq!(buf[0], 11);

        bus.set_failing(0x41, true);
        assert_eq!(bus.write_read(0x41, &[0x00], &mut buf), Err(Nack));
    }

    #[test]
    fn store_reports_out_of_range_access() {
        let mut store = MockStore::blank();
        let mut buf = [0u8; 8];
        assert_eq!(store.read(60, &mut buf), Err(StoreError));
        assert_eq!(store.write(0, &[1, 2]), Ok(()));
        assert_eq!(store.writes(), 1);
    }
}
