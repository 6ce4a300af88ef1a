//! Cooperative software timers driven from the idle loop.
//!
//! A periodic interrupt calls [Ticks::advance]. The idle loop calls
//! [Scheduler::check], which runs every due callback synchronously. Intervals
//! are rounded down to whole ticks and repeating timers re-arm from the tick
//! at which they actually fired, so a late `check()` shifts every later fire.

use core::sync::atomic::{AtomicI32, Ordering};

use fugit::MillisDurationU32;

use crate::error::TimerError;

/// Period of the tick interrupt.
pub const TICK_PERIOD: MillisDurationU32 = MillisDurationU32::from_ticks(100);

/// Number of timer slots in a default [Scheduler].
pub const MAX_SOFT_TIMERS: usize = 10;

/// Monotonic tick counter shared with the tick interrupt.
///
/// Wraps on overflow. Comparisons against it always use the signed wrapping
/// difference.
#[derive(Debug, Default)]
pub struct Ticks(AtomicI32);

impl Ticks {
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Called from the tick interrupt.
    pub fn advance(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn now(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Index of a slot in a [Scheduler].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Stopped,
    Armed { next_fire: i32 },
}

struct TimerSlot<C> {
    state: SlotState,
    repeat: bool,
    interval: MillisDurationU32,
    callback: fn(&mut C),
}

impl<C> TimerSlot<C> {
    fn arm(&mut self, now: i32) {
        let ticks = self.interval.ticks() / TICK_PERIOD.ticks();
        self.state = SlotState::Armed {
            next_fire: now.wrapping_add(ticks as i32),
        };
    }
}

/// Fixed pool of software timers whose callbacks receive a `&mut C` context.
pub struct Scheduler<'t, C, const N: usize = MAX_SOFT_TIMERS> {
    ticks: &'t Ticks,
    slots: [Option<TimerSlot<C>>; N],
}

impl<'t, C, const N: usize> Scheduler<'t, C, N> {
    pub fn new(ticks: &'t Ticks) -> Self {
        const { assert!(N <= 256, "timer handles are a single byte") };
        Self {
            ticks,
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Claim a free slot.
    pub fn create(
        &mut self,
        interval: MillisDurationU32,
        start_now: bool,
        repeat: bool,
        callback: fn(&mut C),
    ) -> Result<TimerHandle, TimerError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(TimerError::PoolExhausted)?;
        let handle = TimerHandle(u8::try_from(index).map_err(|_| TimerError::PoolExhausted)?);

        self.slots[index] = Some(TimerSlot {
            state: SlotState::Stopped,
            repeat,
            interval,
            callback,
        });

        if start_now {
            self.start(handle);
        }
        Ok(handle)
    }

    /// Arm the timer to fire one interval from now.
    pub fn start(&mut self, handle: TimerHandle) {
        let now = self.ticks.now();
        if let Some(slot) = self.slot_mut(handle) {
            slot.arm(now);
        }
    }

    /// Disarm the timer, keeping its configuration.
    pub fn stop(&mut self, handle: TimerHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.state = SlotState::Stopped;
        }
    }

    /// Release the slot for reuse.
    pub fn destroy(&mut self, handle: TimerHandle) {
        if let Some(entry) = self.slots.get_mut(handle.0 as usize) {
            *entry = None;
        }
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        matches!(
            self.slots.get(handle.0 as usize),
            Some(Some(TimerSlot {
                state: SlotState::Armed { .. },
                ..
            }))
        )
    }

    pub fn active(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Run every due callback. Call once per idle loop pass.
    pub fn check(&mut self, ctx: &mut C) {
        let ticks = self.ticks;
        let now = ticks.now();

        for slot in self.slots.iter_mut().flatten() {
            let SlotState::Armed { next_fire } = slot.state else {
                continue;
            };
            if now.wrapping_sub(next_fire) < 0 {
                continue;
            }

            slot.state = SlotState::Stopped;
            (slot.callback)(ctx);

            if slot.repeat {
                slot.arm(ticks.now());
            }
        }
    }

    fn slot_mut(&mut self, handle: TimerHandle) -> Option<&mut TimerSlot<C>> {
        self.slots.get_mut(handle.0 as usize)?.as_mut()
    }
}
