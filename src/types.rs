//! Small value types shared across the board logic.

use core::fmt;

/// Fixed-point quantity with two implied decimals. `1245` => `12.45`.
///
/// Used for volts and amps alike, matching how the PSUs and the persisted
/// configuration encode them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Centi(pub u16);

impl Centi {
    pub const fn whole(self) -> u16 {
        self.0 / 100
    }

    pub const fn fraction(self) -> u16 {
        self.0 % 100
    }
}

impl From<u16> for Centi {
    fn from(value: u16) -> Self {
        Centi(value)
    }
}

impl fmt::Display for Centi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.whole(), self.fraction())
    }
}

/// Used to be less ambiguous about whether something is on or off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Disabled.
    #[default]
    Off,
    /// Enabled.
    On,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centi_formats_two_decimals() {
        assert_eq!(format!("{}", Centi(1200)), "12.00");
        assert_eq!(format!("{}", Centi(1245)), "12.45");
        assert_eq!(format!("{}", Centi(105)), "1.05");
        assert_eq!(format!("{}", Centi(7)), "0.07");
    }

    #[test]
    fn state_bool_conversions() {
        assert_eq!(State::from(true), State::On);
        assert!(!bool::from(State::Off));
        assert_eq!(State::default(), State::Off);
    }
}
