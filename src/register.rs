//! This module is used to define the registers on the FNP PSUs.
//!
//! String fields are stored as a length register followed by the text.
//! Measurements are a big-endian 16-bit value plus a decimal scale exponent.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum FnpRegister {
    /// __R__ - Length of the model string.
    ModelLen = 0x00,
    /// __R__ - Model string, up to 17 characters.
    Model = 0x01,
    /// __R__ - Length of the serial number string.
    SerialLen = 0x12,
    /// __R__ - Serial number string, up to 12 characters.
    Serial = 0x13,
    /// __R__ - Length of the revision string.
    RevLen = 0x19,
    /// __R__ - Revision string, up to 4 characters.
    Rev = 0x20,
    /// __R__ - Year of manufacture, offset from 2000.
    MfgYear = 0x24,
    /// __R__ - Month of manufacture.
    MfgMonth = 0x25,
    /// __R__ - Day of manufacture.
    MfgDay = 0x26,
    /// __R__ - Length of the manufacturer name.
    MfgNameLen = 0x27,
    /// __R__ - Manufacturer name, up to 9 characters.
    MfgName = 0x28,
    /// __R__ - Hours in service, 4 bytes big-endian.
    HoursInService = 0x86,
    /// __R__ - Output 1 measured voltage, high byte.
    MeasVoltageMsb = 0x8A,
    /// __R__ - Output 1 measured voltage, low byte.
    MeasVoltageLsb = 0x8B,
    /// __R__ - Output 1 measured voltage scale exponent.
    MeasVoltageScale = 0x8C,
    /// __R__ - Output 1 measured current, high byte.
    MeasCurrentMsb = 0x96,
    /// __R__ - Output 1 measured current, low byte.
    MeasCurrentLsb = 0x97,
    /// __R__ - Output 1 measured current scale exponent.
    MeasCurrentScale = 0x98,
    /// __R/W__ - Output 1 set voltage, high byte.
    SetVoltageMsb = 0xA3,
    /// __R/W__ - Output 1 set voltage, low byte.
    SetVoltageLsb = 0xA4,
    /// __R__ - Output 1 set voltage scale exponent.
    ///
    /// Only exponent `0` (tenths of a unit per LSB) is writable.
    SetVoltageScale = 0xA5,
}

impl From<FnpRegister> for u8 {
    fn from(value: FnpRegister) -> Self {
        value as u8
    }
}

/// A 16-bit reading split across MSB/LSB registers with its scale register.
#[derive(Debug, Copy, Clone)]
pub struct ScaledReading {
    pub msb: FnpRegister,
    pub lsb: FnpRegister,
    pub scale: FnpRegister,
}

pub const MEASURED_VOLTAGE: ScaledReading = ScaledReading {
    msb: FnpRegister::MeasVoltageMsb,
    lsb: FnpRegister::MeasVoltageLsb,
    scale: FnpRegister::MeasVoltageScale,
};

pub const MEASURED_CURRENT: ScaledReading = ScaledReading {
    msb: FnpRegister::MeasCurrentMsb,
    lsb: FnpRegister::MeasCurrentLsb,
    scale: FnpRegister::MeasCurrentScale,
};

pub const SET_VOLTAGE: ScaledReading = ScaledReading {
    msb: FnpRegister::SetVoltageMsb,
    lsb: FnpRegister::SetVoltageLsb,
    scale: FnpRegister::SetVoltageScale,
};

/// First and last bus address a PSU may answer on.
pub const FIRST_ADDRESS: u8 = 0x41;
pub const LAST_ADDRESS: u8 = 0x60;
