//! Runs the adapter board's console on a real serial port, against
//! simulated PSUs. Connect a terminal to the other end of the port.
//!
//! `cargo run --example serial [PORT]`, log level via `RUST_LOG`.

use std::{collections::HashMap, env, thread, time::Duration};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as PinErrorType, OutputPin, StatefulOutputPin},
    i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation},
};
use fnp_adapter::{
    board::{Board, Watchdog},
    config::PersistentStore,
    console::Console,
    display::{DisplayFrame, StatusDisplay},
    register::FnpRegister,
    system::System,
    timer::{TICK_PERIOD, Ticks},
};
use inquire::Select;
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
const SERIAL_TIMEOUT_MS: u64 = 10;
const SIMULATED_PSUS: [u8; 2] = [0x41, 0x42];

static TICKS: Ticks = Ticks::new();

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let waiting = self
            .0
            .bytes_to_read()
            .map_err(|e| IoError(std::io::Error::other(e)))?;
        Ok(waiting > 0)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// PSUs living in memory. Writing a set voltage also moves the measured
/// voltage, as a real supply would after its power cycle.
#[derive(Default)]
struct SimulatedBus {
    psus: HashMap<u8, [u8; 256]>,
    pointer: u8,
}

#[derive(Debug)]
struct Nack;

impl i2c::Error for Nack {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

impl SimulatedBus {
    fn add_psu(&mut self, address: u8) {
        let mut regs = [0u8; 256];
        let text = |regs: &mut [u8; 256], len: FnpRegister, first: FnpRegister, value: &str| {
            regs[len as usize] = value.len() as u8;
            regs[first as usize..first as usize + value.len()].copy_from_slice(value.as_bytes());
        };
        text(&mut regs, FnpRegister::ModelLen, FnpRegister::Model, "FNP850-12RG");
        text(&mut regs, FnpRegister::SerialLen, FnpRegister::Serial, &format!("SIM{address:02X}"));
        text(&mut regs, FnpRegister::RevLen, FnpRegister::Rev, "S1");
        text(&mut regs, FnpRegister::MfgNameLen, FnpRegister::MfgName, "SIMULATED");
        regs[FnpRegister::MfgYear as usize] = 24;
        regs[FnpRegister::MfgMonth as usize] = 1;
        regs[FnpRegister::MfgDay as usize] = 1;

        // 12.00 V set and measured, 3.40 A.
        regs[FnpRegister::SetVoltageMsb as usize..=FnpRegister::SetVoltageScale as usize]
            .copy_from_slice(&[0x2E, 0xE0, 0]);
        regs[FnpRegister::MeasVoltageMsb as usize..=FnpRegister::MeasVoltageScale as usize]
            .copy_from_slice(&[0x2E, 0xE0, 0]);
        regs[FnpRegister::MeasCurrentMsb as usize..=FnpRegister::MeasCurrentScale as usize]
            .copy_from_slice(&[0x01, 0x54, 1]);

        self.psus.insert(address, regs);
    }
}

impl i2c::ErrorType for SimulatedBus {
    type Error = Nack;
}

impl I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let regs = self.psus.get_mut(&address).ok_or(Nack)?;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let Some((&register, data)) = bytes.split_first() else {
                        continue;
                    };
                    self.pointer = register;
                    for &value in data {
                        regs[self.pointer as usize] = value;
                        if self.pointer == FnpRegister::SetVoltageMsb as u8 {
                            regs[FnpRegister::MeasVoltageMsb as usize] = value;
                        } else if self.pointer == FnpRegister::SetVoltageLsb as u8 {
                            regs[FnpRegister::MeasVoltageLsb as usize] = value;
                        }
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

/// PS_ON line, logged on change.
#[derive(Default)]
struct PsOn {
    high: bool,
}

impl PinErrorType for PsOn {
    type Error = core::convert::Infallible;
}

impl OutputPin for PsOn {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        log::debug!("PS_ON asserted");
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        log::debug!("PS_ON released");
        self.high = true;
        Ok(())
    }
}

impl StatefulOutputPin for PsOn {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// EEPROM kept in memory for the lifetime of the demo.
struct MemoryStore([u8; 64]);

impl PersistentStore for MemoryStore {
    type Error = std::io::Error;

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        let src = self
            .0
            .get(start..start + buf.len())
            .ok_or_else(|| std::io::Error::other("read past end of store"))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        let dst = self
            .0
            .get_mut(start..start + data.len())
            .ok_or_else(|| std::io::Error::other("write past end of store"))?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

struct ExitWatchdog;

impl Watchdog for ExitWatchdog {
    fn feed(&mut self) {}

    fn reset(&mut self) {
        log::info!("Reset requested, exiting");
        std::process::exit(0);
    }
}

/// Prints each new frame to the log instead of an LCD.
#[derive(Default)]
struct LogDisplay {
    last: Option<DisplayFrame>,
}

impl StatusDisplay for LogDisplay {
    fn start_update(&mut self, frame: &DisplayFrame) {
        if self.last.as_ref() != Some(frame) {
            log::info!("[{:<8}|{:<8}]", frame.top.as_str(), frame.bottom.as_str());
            self.last = Some(frame.clone());
        }
    }

    fn process(&mut self) {}
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let mut bus = SimulatedBus::default();
    for address in SIMULATED_PSUS {
        bus.add_psu(address);
    }

    let board = Board::new(
        bus,
        PsOn::default(),
        SleepDelay,
        MemoryStore([0xFF; 64]),
        ExitWatchdog,
    );

    // Stands in for the tick interrupt.
    thread::spawn(|| {
        loop {
            thread::sleep(Duration::from_millis(u64::from(TICK_PERIOD.ticks())));
            TICKS.advance();
        }
    });

    let mut system = System::new(
        &TICKS,
        board,
        [Console::new(PortWrapper(port))],
        LogDisplay::default(),
    )
    .expect("Failed to start display timer");

    system.boot();
    loop {
        system.poll();
        thread::sleep(Duration::from_millis(1));
    }
}
