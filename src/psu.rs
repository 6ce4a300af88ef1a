use core::fmt;

use embedded_hal::{delay::DelayNs, i2c::I2c};
use heapless::String;

use crate::{
    error::{Error, Result},
    register::{FnpRegister, MEASURED_CURRENT, MEASURED_VOLTAGE, SET_VOLTAGE, ScaledReading},
    types::Centi,
};

/// Settling time the PSU needs after each set-voltage register write.
const WRITE_SETTLE_MS: u32 = 8;

/// Identification data reported by a PSU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: String<9>,
    pub model: String<17>,
    pub serial: String<12>,
    pub revision: String<4>,
    pub manufactured: MfgDate,
    pub hours_in_service: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MfgDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for MfgDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.year, self.month, self.day)
    }
}

/// One FNP PSU on the shared bus.
///
/// The handle borrows the bus for as long as it lives, so create it per
/// operation: `FnpPsu::new(&mut bus, 0x41).get_set_voltage()`.
///
/// "read" returns a measurement, "set" is the configured target.
pub struct FnpPsu<'a, B: I2c> {
    bus: &'a mut B,
    address: u8,
}

impl<'a, B: I2c> FnpPsu<'a, B> {
    pub fn new(bus: &'a mut B, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read the identification block. Fails on the first register that does
    /// not answer, so this doubles as the presence probe.
    pub fn device_info(&mut self) -> Result<DeviceInfo, B::Error> {
        let model = self.read_text(FnpRegister::ModelLen, FnpRegister::Model)?;
        let serial = self.read_text(FnpRegister::SerialLen, FnpRegister::Serial)?;
        let revision = self.read_text(FnpRegister::RevLen, FnpRegister::Rev)?;
        let manufacturer = self.read_text(FnpRegister::MfgNameLen, FnpRegister::MfgName)?;

        let manufactured = MfgDate {
            year: 2000 + u16::from(self.read_u8(FnpRegister::MfgYear)?),
            month: self.read_u8(FnpRegister::MfgMonth)?,
            day: self.read_u8(FnpRegister::MfgDay)?,
        };

        let mut hours = [0u8; 4];
        self.bus
            .write_read(self.address, &[u8::from(FnpRegister::HoursInService)], &mut hours)
            .map_err(Error::Bus)?;

        Ok(DeviceInfo {
            manufacturer,
            model,
            serial,
            revision,
            manufactured,
            hours_in_service: u32::from_be_bytes(hours),
        })
    }

    /// Measured output voltage.
    pub fn read_voltage(&mut self) -> Result<Centi, B::Error> {
        self.read_scaled(MEASURED_VOLTAGE)
    }

    /// Measured output current.
    pub fn read_current(&mut self) -> Result<Centi, B::Error> {
        self.read_scaled(MEASURED_CURRENT)
    }

    /// Currently configured output voltage.
    pub fn get_set_voltage(&mut self) -> Result<Centi, B::Error> {
        self.read_scaled(SET_VOLTAGE)
    }

    /// Program a new output voltage. Takes effect after the output is
    /// power cycled.
    pub fn set_set_voltage(
        &mut self,
        delay: &mut impl DelayNs,
        voltage: Centi,
    ) -> Result<(), B::Error> {
        let scale = self.read_u8(SET_VOLTAGE.scale)?;
        if scale != 0 {
            return Err(Error::UnsupportedScale(scale));
        }

        let [msb, lsb] = voltage.0.saturating_mul(10).to_be_bytes();

        self.write_u8(SET_VOLTAGE.msb, msb)?;
        delay.delay_ms(WRITE_SETTLE_MS);
        self.write_u8(SET_VOLTAGE.lsb, lsb)?;
        delay.delay_ms(WRITE_SETTLE_MS);
        Ok(())
    }

    fn read_scaled(&mut self, reading: ScaledReading) -> Result<Centi, B::Error> {
        let msb = self.read_u8(reading.msb)?;
        let lsb = self.read_u8(reading.lsb)?;
        let scale = self.read_u8(reading.scale)?;
        Ok(apply_scale(u16::from_be_bytes([msb, lsb]), scale))
    }

    fn read_text<const N: usize>(
        &mut self,
        len_register: FnpRegister,
        first: FnpRegister,
    ) -> Result<String<N>, B::Error> {
        let len = usize::from(self.read_u8(len_register)?).min(N);
        let mut text = String::new();

        for offset in 0..len as u8 {
            let byte = self.read_at(u8::from(first) + offset)?;
            let ch = if byte.is_ascii_graphic() || byte == b' ' {
                char::from(byte)
            } else {
                '?'
            };
            // Cannot overflow, len <= N.
            let _ = text.push(ch);
        }
        Ok(text)
    }

    fn read_u8(&mut self, register: FnpRegister) -> Result<u8, B::Error> {
        self.read_at(register.into())
    }

    fn read_at(&mut self, register: u8) -> Result<u8, B::Error> {
        let mut value = [0u8; 1];
        self.bus
            .write_read(self.address, &[register], &mut value)
            .map_err(Error::Bus)?;
        Ok(value[0])
    }

    fn write_u8(&mut self, register: FnpRegister, value: u8) -> Result<(), B::Error> {
        self.bus
            .write(self.address, &[register.into(), value])
            .map_err(Error::Bus)
    }
}

/// Convert a raw reading to hundredths using the PSU's decimal exponent.
///
/// Exponent 0 means the raw value is in thousandths, 1 hundredths,
/// 2 tenths and anything higher whole units.
pub fn apply_scale(raw: u16, exponent: u8) -> Centi {
    Centi(match exponent {
        0 => raw / 10,
        1 => raw,
        2 => raw.saturating_mul(10),
        _ => raw.saturating_mul(100),
    })
}
