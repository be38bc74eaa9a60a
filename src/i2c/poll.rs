// Licensed under the Apache-2.0 license

//! Bounded busy-wait policies.
//!
//! Every wait in the protocol engine is expressed as a number of attempts.
//! A [`PollPolicy`] decides what one attempt costs: [`IterationBudget`] spins
//! (the attempt count is the whole budget), [`DelayedPoll`] sleeps a fixed
//! interval between attempts so that budgets become time-based. Tests can plug
//! in a simulated clock without changing the engine.

use embedded_hal::delay::DelayNs;

pub trait PollPolicy {
    /// Start a new wait of at most `attempts` checks.
    fn arm(&mut self, attempts: u32);

    /// Account for one check. Returns `false` once the wait is over.
    fn tick(&mut self) -> bool;
}

impl<P: PollPolicy + ?Sized> PollPolicy for &mut P {
    fn arm(&mut self, attempts: u32) {
        (**self).arm(attempts);
    }

    fn tick(&mut self) -> bool {
        (**self).tick()
    }
}

/// Pure iteration count. A slower core needs larger budgets.
#[derive(Copy, Clone, Debug, Default)]
pub struct IterationBudget {
    remaining: u32,
}

impl IterationBudget {
    #[must_use]
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }
}

impl PollPolicy for IterationBudget {
    fn arm(&mut self, attempts: u32) {
        self.remaining = attempts;
    }

    fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Sleeps `interval_ns` before every check after the first one.
pub struct DelayedPoll<D: DelayNs> {
    delay: D,
    interval_ns: u32,
    remaining: u32,
    first: bool,
}

impl<D: DelayNs> DelayedPoll<D> {
    pub fn new(delay: D, interval_ns: u32) -> Self {
        Self {
            delay,
            interval_ns,
            remaining: 0,
            first: true,
        }
    }
}

impl<D: DelayNs> PollPolicy for DelayedPoll<D> {
    fn arm(&mut self, attempts: u32) {
        self.remaining = attempts;
        self.first = true;
    }

    fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.first {
            self.first = false;
        } else {
            self.delay.delay_ns(self.interval_ns);
        }
        true
    }
}
