//! Typed parsing of console command arguments.

use crate::error::ParamError;

fn required(arg: Option<&str>) -> Result<&str, ParamError> {
    match arg.map(str::trim) {
        Some(arg) if !arg.is_empty() => Ok(arg),
        _ => Err(ParamError::Missing),
    }
}

fn digits(text: &str) -> Result<u32, ParamError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParamError::Malformed);
    }
    text.parse().map_err(|_| ParamError::OutOfRange)
}

/// Unsigned byte, `0..=255`.
pub fn parse_byte(arg: Option<&str>) -> Result<u8, ParamError> {
    let value = digits(required(arg)?)?;
    u8::try_from(value).map_err(|_| ParamError::OutOfRange)
}

/// `0` or `1`.
pub fn parse_flag(arg: Option<&str>) -> Result<bool, ParamError> {
    match parse_byte(arg)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ParamError::OutOfRange),
    }
}

/// Byte bounded by `max`, inclusive.
pub fn parse_bounded(arg: Option<&str>, max: u8) -> Result<u8, ParamError> {
    let value = parse_byte(arg)?;
    if value > max {
        return Err(ParamError::OutOfRange);
    }
    Ok(value)
}

/// Fixed-point value with two implied decimals, e.g. `"12.3"` => `1230`.
///
/// The whole part alone must already lie within `[min, max]`, otherwise the
/// argument is rejected. The fraction (one or two digits) is then added and
/// the sum clamped into `[min, max]`, so `"12.5"` under a 12.45 ceiling
/// yields `1245`.
pub fn parse_centi(arg: Option<&str>, min: u16, max: u16) -> Result<u16, ParamError> {
    let arg = required(arg)?;
    let (whole, fraction) = match arg.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (arg, ""),
    };

    let value = digits(whole)?
        .checked_mul(100)
        .ok_or(ParamError::OutOfRange)?;
    if value < u32::from(min) || value > u32::from(max) {
        return Err(ParamError::OutOfRange);
    }

    let fraction = match fraction.len() {
        0 => 0,
        1 => digits(fraction)? * 10,
        2 => digits(fraction)?,
        _ => return Err(ParamError::Malformed),
    };

    let value = (value + fraction).clamp(u32::from(min), u32::from(max));
    Ok(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u16 = 100;
    const MAX: u16 = 1245;

    #[test]
    fn missing_argument() {
        assert_eq!(parse_byte(None), Err(ParamError::Missing));
        assert_eq!(parse_flag(Some("  ")), Err(ParamError::Missing));
        assert_eq!(parse_centi(Some(""), MIN, MAX), Err(ParamError::Missing));
    }

    #[test]
    fn flag_accepts_only_zero_or_one() {
        assert_eq!(parse_flag(Some("1")), Ok(true));
        assert_eq!(parse_flag(Some("0")), Ok(false));
        assert_eq!(parse_flag(Some("2")), Err(ParamError::OutOfRange));
        assert_eq!(parse_flag(Some("-1")), Err(ParamError::Malformed));
        assert_eq!(parse_flag(Some("yes")), Err(ParamError::Malformed));
    }

    #[test]
    fn bounded_byte() {
        assert_eq!(parse_bounded(Some("8"), 8), Ok(8));
        assert_eq!(parse_bounded(Some("9"), 8), Err(ParamError::OutOfRange));
        assert_eq!(parse_byte(Some("300")), Err(ParamError::OutOfRange));
    }

    #[test]
    fn voltage_fraction_is_clamped() {
        assert_eq!(parse_centi(Some("12.5"), MIN, MAX), Ok(1245));
        assert_eq!(parse_centi(Some("12.45"), MIN, MAX), Ok(1245));
        assert_eq!(parse_centi(Some("12.3"), MIN, MAX), Ok(1230));
        assert_eq!(parse_centi(Some("5.05"), MIN, MAX), Ok(505));
        assert_eq!(parse_centi(Some("1"), MIN, MAX), Ok(100));
        assert_eq!(parse_centi(Some("12."), MIN, MAX), Ok(1200));
    }

    #[test]
    fn voltage_whole_part_is_rejected() {
        assert_eq!(parse_centi(Some("13"), MIN, MAX), Err(ParamError::OutOfRange));
        assert_eq!(parse_centi(Some("0.5"), MIN, MAX), Err(ParamError::OutOfRange));
        assert_eq!(
            parse_centi(Some("99999999999"), MIN, MAX),
            Err(ParamError::OutOfRange)
        );
    }

    #[test]
    fn voltage_malformed() {
        assert_eq!(parse_centi(Some(".5"), MIN, MAX), Err(ParamError::Malformed));
        assert_eq!(parse_centi(Some("-5"), MIN, MAX), Err(ParamError::Malformed));
        assert_eq!(parse_centi(Some("5.123"), MIN, MAX), Err(ParamError::Malformed));
        assert_eq!(parse_centi(Some("5.x"), MIN, MAX), Err(ParamError::Malformed));
        assert_eq!(parse_centi(Some("5.0.1"), MIN, MAX), Err(ParamError::Malformed));
    }
}
