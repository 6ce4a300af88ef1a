//! Interactive serial console: line editing, history recall and shortcut
//! keys on top of a [ByteSource].
//!
//! Each call to [Console::process] first drains input bytes until the
//! console has an action to perform, then performs at most one action.
//! Bytes that arrive behind an action stay in the source for the next pass.

use core::fmt::Write;

use crate::{
    history::{History, Line},
    serial::{ByteSource, Echo},
};

pub const PROMPT: &str = "cmd>";

const CTRL_C: u8 = 0x03;
const CTRL_E: u8 = 0x05;
const CTRL_U: u8 = 0x15;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;
const ESC: u8 = 0x1B;
const CSI: u8 = b'[';

const NAV_UP: u8 = b'A';
const NAV_DOWN: u8 = b'B';
const NAV_DELETE: u8 = b'3';
const NAV_PAGE_UP: u8 = b'5';
const NAV_PAGE_DOWN: u8 = b'6';
const NAV_END: u8 = b'~';

/// What a console does with its next byte, or the action it owes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    /// Print the prompt.
    Prompting,
    /// Editing a line.
    ReadLine,
    /// Got ESC.
    Escape,
    /// Got ESC [.
    AwaitNav,
    /// Got ESC [ 3, waiting for the `~`.
    PendingDelete,
    /// Swallow the `~` of a navigation key we ignore.
    DropNav,
    /// CR, LF or a full buffer ended the line. Dispatch it.
    LineComplete,
    /// Ctrl+C. Discard the line.
    LineCancelled,
    /// Up arrow. Recall the next older history entry.
    HistoryPrev,
    /// Down arrow. Recall the next newer history entry.
    HistoryNext,
    /// PgUp. Switch the output on.
    PowerOnPending,
    /// PgDn. Switch the output off.
    PowerOffPending,
    /// Ctrl+E. Print the readings.
    MeasurePending,
}

impl ConsoleState {
    fn accepts_input(self) -> bool {
        matches!(
            self,
            ConsoleState::ReadLine
                | ConsoleState::Escape
                | ConsoleState::AwaitNav
                | ConsoleState::PendingDelete
                | ConsoleState::DropNav
        )
    }
}

/// What a console drives once a line or shortcut key is complete.
pub trait Dispatch {
    /// Run a command line. Returns false if it failed.
    fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> bool;

    /// At least one PSU is known. Power shortcuts are ignored otherwise.
    fn has_devices(&self) -> bool;

    /// Switch the output. Returns false if it failed.
    fn set_output(&mut self, on: bool, out: &mut dyn Write) -> bool;

    /// Print the readings. Returns false if there were none to print.
    fn measure(&mut self, out: &mut dyn Write) -> bool;
}

/// One console session.
pub struct Console<S> {
    port: S,
    line: Line,
    state: ConsoleState,
    history: History,
    /// A CR completed the last line; swallow one following LF or NUL.
    suppress_linefeed: bool,
}

impl<S: ByteSource> Console<S> {
    /// A fresh session. Its first [process](Self::process) shows the prompt.
    pub fn new(port: S) -> Self {
        Self {
            port,
            line: Line::new(),
            state: ConsoleState::Prompting,
            history: History::new(),
            suppress_linefeed: false,
        }
    }

    /// Current editor state.
    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// The line being edited.
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    /// The byte source this console reads from and echoes to.
    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    /// Writer that echoes to this console.
    pub fn output(&mut self) -> Echo<'_, S> {
        Echo::new(&mut self.port)
    }

    /// One idle loop pass: consume input, then act on it.
    pub fn process<D: Dispatch + ?Sized>(&mut self, target: &mut D) {
        while self.state.accepts_input() && self.port.data_ready() {
            let Some(byte) = self.port.get() else {
                break;
            };
            self.feed(byte);
        }
        self.act(target);
    }

    fn feed(&mut self, byte: u8) {
        match self.state {
            ConsoleState::Escape => {
                self.state = if byte == CSI {
                    ConsoleState::AwaitNav
                } else {
                    ConsoleState::ReadLine
                };
            }
            ConsoleState::AwaitNav => {
                self.state = match byte {
                    NAV_UP => ConsoleState::HistoryPrev,
                    NAV_DOWN => ConsoleState::HistoryNext,
                    NAV_DELETE => ConsoleState::PendingDelete,
                    NAV_PAGE_UP => ConsoleState::PowerOnPending,
                    NAV_PAGE_DOWN => ConsoleState::PowerOffPending,
                    _ => ConsoleState::DropNav,
                };
            }
            ConsoleState::PendingDelete => {
                self.state = ConsoleState::ReadLine;
                if byte == NAV_END {
                    self.erase_char();
                } else {
                    self.edit(byte);
                }
            }
            ConsoleState::DropNav => {
                self.state = ConsoleState::ReadLine;
                if byte != NAV_END {
                    self.edit(byte);
                }
            }
            _ => self.edit(byte),
        }
    }

    fn edit(&mut self, byte: u8) {
        if core::mem::take(&mut self.suppress_linefeed) && matches!(byte, b'\n' | 0x00) {
            return;
        }

        match byte {
            CTRL_C => self.state = ConsoleState::LineCancelled,
            CTRL_E => self.state = ConsoleState::MeasurePending,
            CTRL_U => self.erase_line(),
            ESC => self.state = ConsoleState::Escape,
            b'\r' => {
                self.suppress_linefeed = true;
                self.state = ConsoleState::LineComplete;
            }
            b'\n' => self.state = ConsoleState::LineComplete,
            BACKSPACE | DELETE => self.erase_char(),
            0x20..=0x7E => {
                if self.line.push(byte).is_err() {
                    // Full: complete with what we have, drop the byte.
                    self.state = ConsoleState::LineComplete;
                } else {
                    self.port.put(byte);
                }
            }
            // XOFF and other control bytes.
            _ => {}
        }
    }

    fn act<D: Dispatch + ?Sized>(&mut self, target: &mut D) {
        match self.state {
            ConsoleState::Prompting | ConsoleState::LineCancelled => {
                let _ = self.output().write_str("\r\n");
                self.prompt();
            }
            ConsoleState::HistoryPrev | ConsoleState::HistoryNext => self.recall(),
            ConsoleState::LineComplete => {
                let _ = self.output().write_str("\r\n");
                if !self.line.is_empty() {
                    self.history.record(&self.line);

                    let mut out = Echo::new(&mut self.port);
                    let ok = match core::str::from_utf8(&self.line) {
                        Ok(text) => target.dispatch(text, &mut out),
                        Err(_) => false,
                    };
                    if !ok {
                        let _ = out.write_str("Error: Command failed\r\n");
                    }
                }
                self.prompt();
            }
            ConsoleState::PowerOnPending | ConsoleState::PowerOffPending => {
                if target.has_devices() {
                    let on = self.state == ConsoleState::PowerOnPending;
                    let mut out = self.output();
                    let _ = out.write_str("\r\n");
                    target.set_output(on, &mut out);
                    self.prompt();
                }
                // The key's trailing `~` is still to come.
                self.state = ConsoleState::DropNav;
            }
            ConsoleState::MeasurePending => {
                let mut out = self.output();
                let _ = out.write_str("\r\n");
                target.measure(&mut out);
                self.prompt();
            }
            _ => {}
        }
    }

    fn prompt(&mut self) {
        self.line.clear();
        self.state = ConsoleState::ReadLine;
        let _ = self.output().write_str(PROMPT);
    }

    fn recall(&mut self) {
        let previous = self.state == ConsoleState::HistoryPrev;
        self.state = ConsoleState::ReadLine;
        if self.history.is_empty() {
            return;
        }

        self.erase_line();
        let entry = if previous {
            self.history.older()
        } else {
            self.history.newer()
        };
        if let Some(entry) = entry {
            let _ = self.line.extend_from_slice(entry);
            for &byte in entry {
                self.port.put(byte);
            }
        }
    }

    fn erase_char(&mut self) {
        if self.line.pop().is_some() {
            let _ = self.output().write_str("\x08 \x08");
        }
    }

    fn erase_line(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let len = self.line.len();
        let _ = write!(self.output(), "\x1b[{len}D\x1b[K");
        self.line.clear();
    }
}
