//! The 2x8 character status display.

use core::fmt::Write;

use crate::types::Centi;

pub const DISPLAY_COLS: usize = 8;

pub type Row = heapless::String<DISPLAY_COLS>;

/// Contents of both display rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFrame {
    pub top: Row,
    pub bottom: Row,
}

impl DisplayFrame {
    /// Output voltage over total current, units in the last column.
    pub fn reading(voltage: Centi, current: Centi) -> Self {
        Self {
            top: with_unit(voltage, 'V'),
            bottom: with_unit(current, 'A'),
        }
    }

    pub fn output_off() -> Self {
        Self::text("OUTPUT", "OFF")
    }

    pub fn no_supplies() -> Self {
        Self::text("NO PSUS", "")
    }

    pub fn bus_error() -> Self {
        Self::text("I2C", "ERROR")
    }

    fn text(top: &str, bottom: &str) -> Self {
        let mut frame = Self::default();
        let _ = frame.top.push_str(top);
        let _ = frame.bottom.push_str(bottom);
        frame
    }
}

fn with_unit(value: Centi, unit: char) -> Row {
    let mut row = Row::new();
    // At most "655.35", always leaves room for the unit.
    let _ = write!(row, "{value}");
    while row.len() < DISPLAY_COLS - 1 {
        let _ = row.push(' ');
    }
    let _ = row.push(unit);
    row
}

/// Interrupt- or step-driven character display driver.
pub trait StatusDisplay {
    /// Begin transferring a new frame. Any transfer in progress is replaced.
    fn start_update(&mut self, frame: &DisplayFrame);

    /// Advance the transfer. Called once per idle loop pass.
    fn process(&mut self);
}
