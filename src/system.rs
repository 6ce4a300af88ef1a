//! The idle loop.

use core::fmt::Write;

use fugit::MillisDurationU32;

use crate::{
    console::{Console, Dispatch},
    display::{DisplayFrame, StatusDisplay},
    error::TimerError,
    serial::ByteSource,
    timer::{Scheduler, Ticks},
};

/// How often the display content is recomposed.
pub const DISPLAY_REFRESH: MillisDurationU32 = MillisDurationU32::from_ticks(500);

/// Work the idle loop does on the board besides running commands.
pub trait IdleTasks: Dispatch {
    /// Startup sequence, reporting to the first console.
    fn boot(&mut self, out: &mut dyn Write);

    fn refresh_display(&mut self);

    /// The frame composed by the last refresh, if not yet shown.
    fn take_frame(&mut self) -> Option<DisplayFrame>;

    fn feed_watchdog(&mut self);
}

/// Scheduler, board, consoles and display, serviced in turn by [Self::poll].
pub struct System<'t, T, S, L, const CONSOLES: usize = 1> {
    scheduler: Scheduler<'t, T>,
    board: T,
    consoles: [Console<S>; CONSOLES],
    display: L,
}

impl<'t, T, S, L, const CONSOLES: usize> System<'t, T, S, L, CONSOLES>
where
    T: IdleTasks,
    S: ByteSource,
    L: StatusDisplay,
{
    /// Assemble the system and start the display refresh timer.
    pub fn new(
        ticks: &'t Ticks,
        board: T,
        consoles: [Console<S>; CONSOLES],
        display: L,
    ) -> Result<Self, TimerError> {
        let mut scheduler = Scheduler::new(ticks);
        scheduler.create(DISPLAY_REFRESH, true, true, T::refresh_display)?;

        Ok(Self {
            scheduler,
            board,
            consoles,
            display,
        })
    }

    pub fn board(&self) -> &T {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut T {
        &mut self.board
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<'t, T> {
        &mut self.scheduler
    }

    pub fn console(&self, index: usize) -> Option<&Console<S>> {
        self.consoles.get(index)
    }

    pub fn console_mut(&mut self, index: usize) -> Option<&mut Console<S>> {
        self.consoles.get_mut(index)
    }

    pub fn display(&self) -> &L {
        &self.display
    }

    /// Run the board's startup sequence.
    pub fn boot(&mut self) {
        match self.consoles.first_mut() {
            Some(console) => self.board.boot(&mut console.output()),
            None => self.board.boot(&mut Discard),
        }
    }

    /// One pass of the idle loop.
    pub fn poll(&mut self) {
        self.scheduler.check(&mut self.board);

        for console in self.consoles.iter_mut() {
            console.process(&mut self.board);
        }

        if let Some(frame) = self.board.take_frame() {
            self.display.start_update(&frame);
        }
        self.display.process();

        self.board.feed_watchdog();
    }

    /// Boot, then poll forever.
    pub fn run(&mut self) -> ! {
        self.boot();
        loop {
            self.poll();
        }
    }
}

struct Discard;

impl Write for Discard {
    fn write_str(&mut self, _: &str) -> core::fmt::Result {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockDisplay, MockSerial, TestBoard, test_board};

    fn system(ticks: &Ticks, bus: MockBus) -> System<'_, TestBoard, MockSerial, MockDisplay> {
        System::new(
            ticks,
            test_board(bus),
            [Console::new(MockSerial::new())],
            MockDisplay::default(),
        )
        .unwrap()
    }

    fn output(system: &System<'_, TestBoard, MockSerial, MockDisplay>) -> String {
        let port = system.console(0).unwrap().port();
        String::from_utf8_lossy(port.written_data()).into_owned()
    }

    #[test]
    fn boot_reports_on_first_console() {
        let ticks = Ticks::new();
        let mut system = system(&ticks, MockBus::new().with_psu(0x41));
        system.boot();

        let out = output(&system);
        assert!(out.starts_with("\r\nStarting up...\r\n"));
        assert!(out.ends_with("Found 1 of max 8 attached power supplies\r\n"));
    }

    #[test]
    fn display_refreshes_every_half_second() {
        let ticks = Ticks::new();
        let mut system = system(&ticks, MockBus::new());

        for _ in 0..4 {
            ticks.advance();
            system.poll();
        }
        assert!(system.display().frames().is_empty());

        ticks.advance();
        system.poll();
        assert_eq!(system.display().frames(), &[DisplayFrame::no_supplies()]);

        for _ in 0..5 {
            ticks.advance();
            system.poll();
        }
        assert_eq!(system.display().frames().len(), 2);
        assert_eq!(system.display().steps(), 10);
    }

    #[test]
    fn console_commands_reach_the_board() {
        let ticks = Ticks::new();
        let mut system = system(&ticks, MockBus::new().with_psu(0x41));

        system.poll();
        system
            .console_mut(0)
            .unwrap()
            .port_mut()
            .push_input(b"expectedpsus 1\r");
        system.poll();

        assert_eq!(system.board().config().expected_psus, 1);
        assert!(output(&system).ends_with("expectedpsus 1\r\ncmd>"));
    }

    #[test]
    fn watchdog_fed_every_pass() {
        let ticks = Ticks::new();
        let mut system = system(&ticks, MockBus::new());
        for _ in 0..3 {
            system.poll();
        }
        assert_eq!(system.board().watchdog.feeds(), 3);
    }

    #[test]
    fn extra_timers_share_the_pool() {
        fn noop(_: &mut TestBoard) {}

        let ticks = Ticks::new();
        let mut system = system(&ticks, MockBus::new());
        let interval = MillisDurationU32::from_ticks(100);

        for _ in 1..crate::timer::MAX_SOFT_TIMERS {
            system
                .scheduler_mut()
                .create(interval, false, false, noop)
                .unwrap();
        }
        assert_eq!(
            system.scheduler_mut().create(interval, false, false, noop),
            Err(TimerError::PoolExhausted)
        );
    }
}
