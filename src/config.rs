//! Persisted board configuration.
//!
//! Stored as a fixed 7-byte little-endian record at offset 0 of the
//! [PersistentStore]:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0-1   | magic (`0x4650`) |
//! | 2-3   | output voltage, centivolts |
//! | 4     | start mode |
//! | 5     | expected PSU count |
//! | 6     | show measured voltage |

use modular_bitfield::prelude::*;

use crate::types::Centi;

pub const CONFIG_MAGIC: u16 = 0x4650;
pub const CONFIG_ADDRESS: u16 = 0;

pub const OUTPUT_VOLTAGE_DEFAULT: Centi = Centi(1200);
pub const OUTPUT_VOLTAGE_MIN: Centi = Centi(100);
pub const OUTPUT_VOLTAGE_MAX: Centi = Centi(1245);

/// Most PSUs a single board will manage.
pub const MAX_PSU: u8 = 8;

/// Byte-addressed non-volatile storage, e.g. the MCU's EEPROM.
pub trait PersistentStore {
    type Error: core::fmt::Debug;

    fn read(&mut self, address: u16, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Self::Error>;
}

/// On-store layout.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub struct ConfigRecord {
    pub magic: B16,
    pub output_voltage: B16,
    pub start_mode: B8,
    pub expected_psus: B8,
    pub show_measured_voltage: B8,
}

/// Runtime view of the persisted settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub output_voltage: Centi,
    /// Power the output on and probe for PSUs at boot.
    pub start_mode: bool,
    /// Refuse to power up with fewer PSUs than this. `0` disables the check.
    pub expected_psus: u8,
    /// Show the measured rather than the configured voltage on the display.
    pub show_measured_voltage: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_voltage: OUTPUT_VOLTAGE_DEFAULT,
            start_mode: true,
            expected_psus: 0,
            show_measured_voltage: false,
        }
    }
}

/// Where [Config::load] got its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Stored,
    Defaults,
}

impl From<ConfigRecord> for Config {
    fn from(record: ConfigRecord) -> Self {
        Self {
            output_voltage: Centi(record.output_voltage()),
            start_mode: record.start_mode() != 0,
            expected_psus: record.expected_psus(),
            show_measured_voltage: record.show_measured_voltage() != 0,
        }
    }
}

impl From<&Config> for ConfigRecord {
    fn from(config: &Config) -> Self {
        ConfigRecord::new()
            .with_magic(CONFIG_MAGIC)
            .with_output_voltage(config.output_voltage.0)
            .with_start_mode(config.start_mode as u8)
            .with_expected_psus(config.expected_psus)
            .with_show_measured_voltage(config.show_measured_voltage as u8)
    }
}

impl Config {
    /// Read the stored record, replacing it with defaults when the magic
    /// does not match.
    pub fn load<P: PersistentStore>(store: &mut P) -> Result<(Self, ConfigSource), P::Error> {
        let mut bytes = [0u8; 7];
        store.read(CONFIG_ADDRESS, &mut bytes)?;
        let record = ConfigRecord::from_bytes(bytes);

        if record.magic() == CONFIG_MAGIC {
            return Ok((Self::from(record), ConfigSource::Stored));
        }

        log::warn!(
            "Config magic {:#06x} invalid, storing defaults",
            record.magic()
        );
        let config = Self::default();
        config.save(store)?;
        Ok((config, ConfigSource::Defaults))
    }

    pub fn save<P: PersistentStore>(&self, store: &mut P) -> Result<(), P::Error> {
        let record = ConfigRecord::from(self);
        store.write(CONFIG_ADDRESS, &record.into_bytes())
    }
}
