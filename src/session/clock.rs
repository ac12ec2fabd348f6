//! Injected clock for the cooperative scheduling loop.
//!
//! Every wait in the engine samples a [`Clock`] rather than calling into the
//! OS directly, so a [`ManualClock`] advanced by the test surface makes the
//! whole session deterministic. Comparisons against sampled time are always
//! ordering or tolerance checks, never equality: polling runs at display
//! refresh cadence, which is far coarser than trigger granularity.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic session time in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Hand-advanced clock for tests and dry runs. Shared between the engine
/// (which reads it) and the scripted surface (which advances it on draw).
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }

    pub fn set(&self, t: f64) {
        self.now.set(t);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// A deadline expressed against a [`Clock`]; the trial countdown.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: f64,
}

impl Countdown {
    pub fn start(clock: &dyn Clock, secs: f64) -> Self {
        Self {
            deadline: clock.now() + secs,
        }
    }

    /// Seconds until the deadline, clamped at zero.
    pub fn remaining(&self, clock: &dyn Clock) -> f64 {
        (self.deadline - clock.now()).max(0.0)
    }

    pub fn expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0.0);
        clock.advance(0.5);
        clock.advance(0.25);
        assert!((clock.now() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn countdown_counts_down_and_clamps() {
        let clock = ManualClock::new();
        let cd = Countdown::start(&clock, 10.0);
        assert!((cd.remaining(&clock) - 10.0).abs() < 1e-12);
        clock.advance(3.0);
        assert!((cd.remaining(&clock) - 7.0).abs() < 1e-12);
        assert!(!cd.expired(&clock));
        clock.advance(8.0);
        assert_eq!(cd.remaining(&clock), 0.0);
        assert!(cd.expired(&clock));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
