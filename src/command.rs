//! Console command verbs and their handlers.

use core::fmt::Write;

use embedded_hal::{delay::DelayNs, digital::StatefulOutputPin, i2c::I2c};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};

use crate::{
    board::{Board, Watchdog},
    config::{Config, MAX_PSU, OUTPUT_VOLTAGE_MAX, OUTPUT_VOLTAGE_MIN, PersistentStore},
    error::ParamError,
    param::{parse_bounded, parse_centi, parse_flag},
    types::{Centi, State},
};

/// Command words understood by the console. Matching ignores ASCII case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Verb {
    #[strum(serialize = "measure")]
    Measure,
    #[strum(serialize = "outvoltage", serialize = "o")]
    OutVoltage,
    #[strum(serialize = "on")]
    On,
    #[strum(serialize = "off")]
    Off,
    #[strum(serialize = "startmode")]
    StartMode,
    #[strum(serialize = "expectedpsus")]
    ExpectedPsus,
    #[strum(serialize = "measuredvoltage")]
    MeasuredVoltage,
    #[strum(serialize = "show")]
    Show,
    #[strum(serialize = "default")]
    Default,
    #[strum(serialize = "reset")]
    Reset,
    #[strum(serialize = "help", serialize = "?")]
    Help,
}

impl Verb {
    fn write_usage(self, out: &mut dyn Write) -> core::fmt::Result {
        match self {
            Verb::Measure => write!(
                out,
                "\tmeasure|ctrl+e\r\n\
                 \t\tShow the measured output voltage/current readings\r\n"
            ),
            Verb::OutVoltage => write!(
                out,
                "\toutvoltage|o [{OUTPUT_VOLTAGE_MIN} to {OUTPUT_VOLTAGE_MAX}]\r\n\
                 \t\tSets the output voltage of the attached power supplies\r\n"
            ),
            Verb::On => write!(out, "\ton|<pgup>\r\n\t\tEnable the main power output\r\n"),
            Verb::Off => write!(out, "\toff|<pgdn>\r\n\t\tDisable the main power output\r\n"),
            Verb::StartMode => write!(
                out,
                "\tstartmode [0 or 1]\r\n\
                 \t\tSet to '1' if the power output is to be ON after AC power on\r\n"
            ),
            Verb::ExpectedPsus => write!(
                out,
                "\texpectedpsus [0 to {MAX_PSU}]\r\n\
                 \t\tDo not power up unless N number of power supplies are detected\r\n\
                 \t\tSet to 0 to disable this check\r\n"
            ),
            Verb::MeasuredVoltage => write!(
                out,
                "\tmeasuredvoltage [0 or 1]\r\n\
                 \t\tSet to '1' to show the measured voltage on the LCD instead of\r\n\
                 \t\tconfigured voltage\r\n"
            ),
            Verb::Show => write!(out, "\tshow\r\n\t\tShow the persisted configuration\r\n"),
            Verb::Default => write!(out, "\tdefault\r\n\t\tLoad the default configuration\r\n"),
            Verb::Reset => write!(out, "\treset\r\n\t\tReset this board\r\n"),
            Verb::Help => write!(out, "\thelp|?\r\n\t\tShow this list\r\n"),
        }?;
        write!(out, "\r\n")
    }
}

fn report(error: ParamError, out: &mut dyn Write) -> bool {
    let _ = write!(out, "Error: {error}\r\n");
    false
}

impl<B, P, D, E, W> Board<B, P, D, E, W>
where
    B: I2c,
    P: StatefulOutputPin,
    D: DelayNs,
    E: PersistentStore,
    W: Watchdog,
{
    /// Run one console line. Returns false if the command failed.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> bool {
        let line = line.trim_start();
        let (word, arg) = match line.split_once(' ') {
            Some((word, arg)) => (word, Some(arg)),
            None => (line, None),
        };

        let Ok(verb) = word.parse::<Verb>() else {
            let _ = write!(out, "Error: No such command ({word})\r\n");
            return false;
        };

        match verb {
            Verb::Measure => self.measure(out),
            Verb::OutVoltage => self.set_output_voltage(arg, out),
            Verb::On => self.change_output(State::On, out),
            Verb::Off => self.change_output(State::Off, out),
            Verb::StartMode => {
                self.update_config(parse_flag(arg), out, |c, v| c.start_mode = v)
            }
            Verb::ExpectedPsus => self.update_config(parse_bounded(arg, MAX_PSU), out, |c, v| {
                c.expected_psus = v
            }),
            Verb::MeasuredVoltage => self.update_config(parse_flag(arg), out, |c, v| {
                c.show_measured_voltage = v
            }),
            Verb::Show => {
                self.show(out);
                true
            }
            Verb::Default => self.load_defaults(out),
            Verb::Reset => {
                let _ = write!(out, "\r\n");
                self.watchdog.reset();
                true
            }
            Verb::Help => {
                let _ = write!(out, "\r\nCommands:\r\n\r\n");
                for verb in Verb::iter() {
                    let _ = verb.write_usage(out);
                }
                true
            }
        }
    }

    fn update_config<T>(
        &mut self,
        parsed: Result<T, ParamError>,
        out: &mut dyn Write,
        apply: impl FnOnce(&mut Config, T),
    ) -> bool {
        match parsed {
            Ok(value) => {
                let mut next = self.config;
                apply(&mut next, value);
                self.commit_config(next, out)
            }
            Err(e) => report(e, out),
        }
    }

    fn set_output_voltage(&mut self, arg: Option<&str>, out: &mut dyn Write) -> bool {
        let parsed = parse_centi(arg, OUTPUT_VOLTAGE_MIN.0, OUTPUT_VOLTAGE_MAX.0).map(Centi);
        if !self.update_config(parsed, out, |c, v| c.output_voltage = v) {
            return false;
        }

        if self.output_enabled() && !self.devices.is_empty() {
            return self.adjust_voltages(out);
        }

        let _ = write!(
            out,
            "Configuration saved but no supplies were updated\r\n\
             Either none were present or output disabled\r\n"
        );
        self.output_voltage_stale = true;
        true
    }

    fn load_defaults(&mut self, out: &mut dyn Write) -> bool {
        if !self.commit_config(Config::default(), out) {
            return false;
        }

        if self.output_enabled() && !self.devices.is_empty() {
            self.adjust_voltages(out);
        } else {
            self.output_voltage_stale = true;
        }

        let _ = write!(out, "Default configuration loaded\r\n");
        true
    }

    fn show(&self, out: &mut dyn Write) {
        let config = &self.config;
        let _ = write!(
            out,
            "\r\nCurrent configuration:\r\n\r\n\
             \toutvoltage ...........: {}\r\n\
             \tstartmode ............: {}\r\n\
             \texpectedpsus .........: {}\r\n\
             \tmeasuredvoltage ......: {}\r\n\r\n",
            config.output_voltage,
            u8::from(config.start_mode),
            config.expected_psus,
            u8::from(config.show_measured_voltage)
        );
    }
}
