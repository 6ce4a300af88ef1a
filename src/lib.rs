//! Firmware logic for the FNP600/850/1000 PSU adapter board.
//!
//! The board drives up to eight FNP-series server power supplies sharing an
//! I2C bus, switches their common PS_ON line, shows output voltage and
//! current on a 2x8 character display, and offers a serial command console.
//!
//! There is no preemptive tasking. A single idle loop ([system::System])
//! services, in order:
//! * the soft timer [timer::Scheduler], which refreshes the display,
//! * each [console::Console], which edits input lines and runs commands,
//! * the display driver and the watchdog.
//!
//! Hardware is reached only through traits: [embedded_hal] for the bus,
//! PS_ON pin and delays, [embedded_io] streams for the console
//! ([serial::ByteSource]), plus [config::PersistentStore],
//! [display::StatusDisplay] and [board::Watchdog]. Everything runs unchanged
//! in host tests.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! Console commands (case-insensitive):
//! * `measure` - per-PSU and total readings
//! * `outvoltage|o <1.00..12.45>` - set the output voltage
//! * `on`, `off` - switch the output
//! * `startmode <0|1>` - output on after AC power on
//! * `expectedpsus <0..8>` - refuse to power up with fewer PSUs
//! * `measuredvoltage <0|1>` - display measured rather than set voltage
//! * `show`, `default`, `reset`, `help|?`
//!
//! Ctrl+E measures, PgUp/PgDn switch the output, Up/Down recall history.

#![cfg_attr(feature = "no_std", no_std)]

pub mod board;
pub mod command;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod history;
pub mod param;
pub mod psu;
pub mod register;
pub mod serial;
pub mod system;
pub mod timer;
pub mod types;

#[cfg(test)]
mod mock;
