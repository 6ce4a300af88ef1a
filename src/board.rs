//! Run state of the adapter board and the PSU operations built on it.
//!
//! All console text goes to the `out` writer of whichever console issued
//! the operation. Operations that touch several PSUs report each failing
//! device and carry on with the rest.

use core::fmt::Write;

use embedded_hal::{delay::DelayNs, digital::StatefulOutputPin, i2c::I2c};
use log::{error, info, warn};

use crate::{
    config::{Config, ConfigSource, MAX_PSU, PersistentStore},
    console::Dispatch,
    display::DisplayFrame,
    psu::FnpPsu,
    register::{FIRST_ADDRESS, LAST_ADDRESS},
    system::IdleTasks,
    types::{Centi, State},
};

/// Time the PSUs need after PS_ON before they answer on the bus.
const PS_ON_DELAY_MS: u32 = 500;
/// Off time while power cycling after a set-voltage change, in 100 ms steps.
const POWER_CYCLE_STEPS: u32 = 5;

pub const DEVICE_SLOTS: usize = MAX_PSU as usize;

/// Hardware watchdog.
pub trait Watchdog {
    fn feed(&mut self);

    /// Force a board restart. Does not return on hardware.
    fn reset(&mut self);
}

/// Everything the console commands and the display refresh operate on.
///
/// `ps_on` drives the PSUs' active-low PS_ON line: low means output on.
pub struct Board<B, P, D, E, W> {
    pub(crate) bus: B,
    pub(crate) ps_on: P,
    pub(crate) delay: D,
    pub(crate) store: E,
    pub(crate) watchdog: W,
    pub(crate) config: Config,
    pub(crate) devices: heapless::Vec<u8, DEVICE_SLOTS>,
    pub(crate) output_voltage_stale: bool,
    pub(crate) frame: Option<DisplayFrame>,
}

impl<B, P, D, E, W> Board<B, P, D, E, W>
where
    B: I2c,
    P: StatefulOutputPin,
    D: DelayNs,
    E: PersistentStore,
    W: Watchdog,
{
    /// Takes ownership of the hardware and drives the output off.
    pub fn new(bus: B, mut ps_on: P, delay: D, store: E, watchdog: W) -> Self {
        if let Err(e) = ps_on.set_high() {
            error!("Failed to drive PS_ON: {e:?}");
        }
        Self {
            bus,
            ps_on,
            delay,
            store,
            watchdog,
            config: Config::default(),
            devices: heapless::Vec::new(),
            output_voltage_stale: false,
            frame: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bus addresses of the PSUs found by the last discovery.
    pub fn devices(&self) -> &[u8] {
        &self.devices
    }

    /// A voltage change is waiting for the next power on.
    pub fn is_voltage_stale(&self) -> bool {
        self.output_voltage_stale
    }

    /// Load the configuration and, if start mode is set, bring up the PSUs.
    pub fn boot(&mut self, out: &mut dyn Write) {
        let _ = write!(out, "\r\nStarting up...\r\n");

        match Config::load(&mut self.store) {
            Ok((config, source)) => {
                if source == ConfigSource::Defaults {
                    info!("Stored configuration invalid, defaults written");
                }
                self.config = config;
            }
            Err(e) => {
                error!("Failed to load configuration: {e:?}");
                self.config = Config::default();
            }
        }

        if self.config.start_mode {
            self.init_supplies(out);
        } else {
            let _ = write!(
                out,
                "Output disabled. Not probing attached power supplies\r\n"
            );
        }

        let _ = write!(
            out,
            "Found {} of max {} attached power supplies\r\n",
            self.devices.len(),
            MAX_PSU
        );
    }

    /// Whether PS_ON is currently asserted.
    pub fn output_enabled(&mut self) -> bool {
        self.ps_on.is_set_low().unwrap_or(false)
    }

    /// Drive PS_ON. Does nothing if the output is already in that state.
    pub fn enable_output(&mut self, state: impl Into<State>, out: &mut dyn Write) {
        let on = bool::from(state.into());
        if on == self.output_enabled() {
            return;
        }

        let result = if on {
            let _ = write!(out, "Enabling output...\r\n");
            self.ps_on.set_low()
        } else {
            let _ = write!(out, "Disabling output...\r\n");
            self.ps_on.set_high()
        };
        if let Err(e) = result {
            error!("Failed to drive PS_ON: {e:?}");
        }
    }

    /// Power up, find the PSUs and program their voltage.
    ///
    /// Returns false, with the output switched back off, if fewer PSUs than
    /// `expected_psus` answer.
    pub fn init_supplies(&mut self, out: &mut dyn Write) -> bool {
        self.enable_output(State::On, out);
        self.delay.delay_ms(PS_ON_DELAY_MS);
        self.watchdog.feed();

        self.discover(out);

        let expected = self.config.expected_psus;
        if expected != 0 && self.devices.len() < usize::from(expected) {
            let _ = write!(
                out,
                "Error: Number of power supplies detected ({}) does not match expected number ({})\r\n",
                self.devices.len(),
                expected
            );
            self.enable_output(State::Off, out);
            return false;
        }

        self.adjust_voltages(out);
        !self.devices.is_empty()
    }

    /// Probe every PSU address, remembering up to [MAX_PSU] that answer.
    pub fn discover(&mut self, out: &mut dyn Write) -> usize {
        self.devices.clear();
        let _ = write!(out, "\r\n");

        for address in FIRST_ADDRESS..=LAST_ADDRESS {
            if self.devices.is_full() {
                let _ = write!(
                    out,
                    "Maximum number of supported power supplies found. Aborting\r\n"
                );
                break;
            }

            if let Ok(info) = FnpPsu::new(&mut self.bus, address).device_info() {
                let _ = write!(
                    out,
                    "Detected PSU @ 0x{address:02X}\r\n\
                     Manufacturer     : {}\r\n\
                     Model            : {}\r\n\
                     Serial           : {}\r\n\
                     Rev              : {}\r\n\
                     Mfg. Date        : {}\r\n\
                     Hours in service : {}\r\n\r\n",
                    info.manufacturer,
                    info.model,
                    info.serial,
                    info.revision,
                    info.manufactured,
                    info.hours_in_service
                );
                info!("PSU {} found at {address:#04x}", info.model);
                let _ = self.devices.push(address);
            }

            self.watchdog.feed();
        }

        self.devices.len()
    }

    /// Program the configured voltage into every PSU that differs, then
    /// power cycle so it takes effect. Returns false if any PSU failed.
    pub fn adjust_voltages(&mut self, out: &mut dyn Write) -> bool {
        let target = self.config.output_voltage;
        let mut adjusted = false;
        let mut ok = true;

        for &address in self.devices.iter() {
            let mut psu = FnpPsu::new(&mut self.bus, address);

            let current = match psu.get_set_voltage() {
                Ok(voltage) => voltage,
                Err(e) => {
                    warn!("Set voltage read from {address:#04x} failed: {e:?}");
                    let _ = write!(
                        out,
                        "Error reading set voltage from PSU @ 0x{address:02X}\r\n"
                    );
                    ok = false;
                    continue;
                }
            };
            if current == target {
                continue;
            }

            let _ = write!(
                out,
                "Changing set voltage for PSU @ 0x{address:02X} from {current} to {target}\r\n"
            );
            if let Err(e) = psu.set_set_voltage(&mut self.delay, target) {
                warn!("Set voltage write to {address:#04x} failed: {e:?}");
                let _ = write!(
                    out,
                    "Error changing set voltage on PSU @ 0x{address:02X}\r\n"
                );
                ok = false;
                continue;
            }
            adjusted = true;
        }

        if adjusted {
            self.power_cycle(out);
        }
        ok
    }

    fn power_cycle(&mut self, out: &mut dyn Write) {
        self.enable_output(State::Off, out);
        for _ in 0..POWER_CYCLE_STEPS {
            self.delay.delay_ms(100);
            self.watchdog.feed();
        }
        self.enable_output(State::On, out);
    }

    /// Switch the output on or off.
    ///
    /// Switching on with no PSUs known runs the full bring-up. Switching on
    /// an output that is already on is a successful no-op.
    pub fn change_output(&mut self, state: impl Into<State>, out: &mut dyn Write) -> bool {
        match state.into() {
            State::On => {
                if self.devices.is_empty() {
                    return self.init_supplies(out);
                }
                if !self.output_enabled() {
                    self.enable_output(State::On, out);
                    if self.output_voltage_stale {
                        self.adjust_voltages(out);
                        self.output_voltage_stale = false;
                    }
                }
                true
            }
            State::Off => {
                self.enable_output(State::Off, out);
                true
            }
        }
    }

    /// Print each PSU's voltage and current, then the average voltage and
    /// total current over the PSUs that answered.
    pub fn measure(&mut self, out: &mut dyn Write) -> bool {
        if !self.output_enabled() {
            let _ = write!(out, "Error: Output is currently switched off\r\n");
            return false;
        }
        if self.devices.is_empty() {
            let _ = write!(out, "Error: No power supplies detected\r\n");
            return false;
        }

        let mut voltage_sum = 0u32;
        let mut current_sum = 0u32;
        let mut answered = 0u32;

        for &address in self.devices.iter() {
            let mut psu = FnpPsu::new(&mut self.bus, address);

            let Ok(voltage) = psu.read_voltage() else {
                let _ = write!(out, "Error reading voltage from PSU @ 0x{address:02X}\r\n");
                continue;
            };
            let Ok(current) = psu.read_current() else {
                let _ = write!(out, "Error reading current from PSU @ 0x{address:02X}\r\n");
                continue;
            };

            voltage_sum += u32::from(voltage.0);
            current_sum += u32::from(current.0);
            answered += 1;

            let _ = write!(
                out,
                "PSU @ 0x{address:02X}:\r\nVoltage : {voltage} V\r\nCurrent : {current} A\r\n\r\n"
            );
        }

        let average = voltage_sum.checked_div(answered).unwrap_or(0);
        let _ = write!(
            out,
            "Total   : Average voltage / Sum of current\r\n\
             Voltage : {} V\r\n\
             Current : {} A\r\n\r\n",
            saturate(average),
            saturate(current_sum)
        );
        true
    }

    /// Compose the next display frame from the PSUs. Runs from the display
    /// refresh timer; the frame is handed to the driver by the idle loop.
    pub fn refresh_display(&mut self) {
        let frame = if self.devices.is_empty() {
            DisplayFrame::no_supplies()
        } else if !self.output_enabled() {
            DisplayFrame::output_off()
        } else {
            match self.sample_output() {
                Ok((voltage, current)) => DisplayFrame::reading(voltage, current),
                Err(address) => {
                    warn!("Display refresh: no reading from PSU @ {address:#04x}");
                    DisplayFrame::bus_error()
                }
            }
        };
        self.frame = Some(frame);
    }

    /// Voltage to display and total current. Fails with the address of the
    /// first PSU that does not answer.
    fn sample_output(&mut self) -> Result<(Centi, Centi), u8> {
        let show_measured = self.config.show_measured_voltage;
        let mut voltage_sum = 0u32;
        let mut current_sum = 0u32;

        for &address in self.devices.iter() {
            let mut psu = FnpPsu::new(&mut self.bus, address);
            if show_measured {
                voltage_sum += u32::from(psu.read_voltage().map_err(|_| address)?.0);
            }
            current_sum += u32::from(psu.read_current().map_err(|_| address)?.0);
        }

        let voltage = if show_measured {
            saturate(voltage_sum / self.devices.len() as u32)
        } else {
            self.config.output_voltage
        };
        Ok((voltage, saturate(current_sum)))
    }

    /// Persist `config` and make it current. On failure the current
    /// configuration is kept and the error reported on `out`.
    pub fn commit_config(&mut self, config: Config, out: &mut dyn Write) -> bool {
        match config.save(&mut self.store) {
            Ok(()) => {
                self.config = config;
                true
            }
            Err(e) => {
                error!("Failed to save configuration: {e:?}");
                let _ = write!(out, "Error: Failed to save configuration\r\n");
                false
            }
        }
    }
}

fn saturate(value: u32) -> Centi {
    Centi(u16::try_from(value).unwrap_or(u16::MAX))
}

impl<B, P, D, E, W> Dispatch for Board<B, P, D, E, W>
where
    B: I2c,
    P: StatefulOutputPin,
    D: DelayNs,
    E: PersistentStore,
    W: Watchdog,
{
    fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> bool {
        self.execute(line, out)
    }

    fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    fn set_output(&mut self, on: bool, out: &mut dyn Write) -> bool {
        self.change_output(on, out)
    }

    fn measure(&mut self, out: &mut dyn Write) -> bool {
        Board::measure(self, out)
    }
}

impl<B, P, D, E, W> IdleTasks for Board<B, P, D, E, W>
where
    B: I2c,
    P: StatefulOutputPin,
    D: DelayNs,
    E: PersistentStore,
    W: Watchdog,
{
    fn boot(&mut self, out: &mut dyn Write) {
        Board::boot(self, out)
    }

    fn refresh_display(&mut self) {
        Board::refresh_display(self)
    }

    fn take_frame(&mut self) -> Option<DisplayFrame> {
        self.frame.take()
    }

    fn feed_watchdog(&mut self) {
        self.watchdog.feed();
    }
}
