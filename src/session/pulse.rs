//! Pulse patterns and the scheduler that binds them to the countdown.
//!
//! A [`PulsePattern`] is a declarative list of `(offset, trigger byte)`
//! boundaries inside a repeating 1 s cycle. The [`PulseScheduler`] is fed
//! the raw countdown sample on every display refresh and decides which
//! boundary, if any, is active now.
//!
//! Known limitation, carried over from the lab protocol: the cycle phase is
//! derived from each frame's countdown sample rather than a resynchronized
//! reference time, so irregular frame timing can shift which sample first
//! lands inside a boundary's tolerance window. The effect is bounded by the
//! 10 ms tolerance and left as-is.

use crate::consts::{PULSE_CYCLE_SECS, PULSE_TOLERANCE_SECS, TENS_TRIG};
use crate::port::OutputPort;

/// Which of the two built-in TENS pulse trains a condition receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Three rapid pulses followed by a rest.
    Pause,
    /// Three evenly spaced pulses.
    Constant,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Pause => "pause",
            PatternKind::Constant => "constant",
        }
    }
}

/// Named, immutable pulse train within a repeating 1 s cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PulsePattern {
    name: &'static str,
    steps: Vec<(f64, u8)>,
}

impl PulsePattern {
    /// Offsets must be ascending and inside `[0, 1)`; violating that is a
    /// programmer error in the pattern table, not a runtime condition.
    pub fn new(name: &'static str, steps: Vec<(f64, u8)>) -> Self {
        assert!(!steps.is_empty(), "pulse pattern {name} has no steps");
        assert!(
            steps
                .windows(2)
                .all(|w| w[0].0 < w[1].0),
            "pulse pattern {name} offsets must be strictly ascending"
        );
        assert!(
            steps
                .iter()
                .all(|(t, _)| (0.0..PULSE_CYCLE_SECS).contains(t)),
            "pulse pattern {name} offsets must lie within one cycle"
        );
        Self { name, steps }
    }

    pub fn of(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Pause => Self::pause(),
            PatternKind::Constant => Self::constant(),
        }
    }

    /// 3 rapid pulses then rest for the remainder of the cycle.
    pub fn pause() -> Self {
        Self::new(
            "pause",
            vec![
                (0.0, TENS_TRIG),
                (0.1, 0),
                (0.2, TENS_TRIG),
                (0.3, 0),
                (0.4, TENS_TRIG),
                (0.5, 0),
            ],
        )
    }

    /// 3 equally spaced pulses across the cycle.
    pub fn constant() -> Self {
        Self::new(
            "constant",
            vec![
                (0.0, TENS_TRIG),
                (0.10, 0),
                (0.333, TENS_TRIG),
                (0.433, 0),
                (0.666, TENS_TRIG),
                (0.766, 0),
            ],
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn steps(&self) -> &[(f64, u8)] {
        &self.steps
    }
}

/// Result of sampling the scheduler at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseSample {
    /// A boundary is within tolerance; this byte should be active now.
    Emit(u8),
    /// No boundary near the current phase; the last emitted value stands.
    NoChange,
}

/// Decides, from a raw countdown sample, which trigger byte should be on
/// the port. Stateless to sample; `drive` additionally tracks the last
/// boundary crossed so repeated refreshes inside one tolerance window write
/// the port exactly once.
#[derive(Debug, Clone)]
pub struct PulseScheduler {
    pattern: PulsePattern,
    tolerance: f64,
    last_cycle: Option<i64>,
    emitted: Option<usize>,
}

impl PulseScheduler {
    pub fn new(pattern: PulsePattern) -> Self {
        Self::with_tolerance(pattern, PULSE_TOLERANCE_SECS)
    }

    pub fn with_tolerance(pattern: PulsePattern, tolerance: f64) -> Self {
        assert!(tolerance > 0.0, "pulse tolerance must be positive");
        Self {
            pattern,
            tolerance,
            last_cycle: None,
            emitted: None,
        }
    }

    /// Which byte should be active at `elapsed` seconds, or `NoChange` if no
    /// boundary falls within tolerance of the current phase. Idempotent:
    /// the same `elapsed` always yields the same answer.
    pub fn sample(&self, elapsed: f64) -> PulseSample {
        let phase = elapsed.rem_euclid(PULSE_CYCLE_SECS);
        match self.boundary_at(phase) {
            Some(i) => PulseSample::Emit(self.pattern.steps()[i].1),
            None => PulseSample::NoChange,
        }
    }

    /// Sample at `elapsed` and write to the port if a boundary was newly
    /// crossed. Crossing memory resets when the cycle wraps, so a boundary
    /// fires again on every pass through the cycle.
    pub fn drive(&mut self, port: &mut dyn OutputPort, elapsed: f64) -> PulseSample {
        let cycle = elapsed.div_euclid(PULSE_CYCLE_SECS) as i64;
        if self.last_cycle != Some(cycle) {
            self.last_cycle = Some(cycle);
            self.emitted = None;
        }
        let phase = elapsed.rem_euclid(PULSE_CYCLE_SECS);
        match self.boundary_at(phase) {
            Some(i) => {
                let value = self.pattern.steps()[i].1;
                if self.emitted != Some(i) {
                    self.emitted = Some(i);
                    port.write(value);
                    tracing::trace!(
                        target: "painrig::pulse",
                        pattern = self.pattern.name(),
                        boundary = i,
                        value,
                        "pulse boundary"
                    );
                }
                PulseSample::Emit(value)
            }
            None => PulseSample::NoChange,
        }
    }

    fn boundary_at(&self, phase: f64) -> Option<usize> {
        self.pattern
            .steps()
            .iter()
            .position(|(t, _)| (phase - t).abs() < self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RecordingPort;

    fn constant_scheduler() -> PulseScheduler {
        PulseScheduler::with_tolerance(PulsePattern::constant(), 0.01)
    }

    #[test]
    fn boundary_within_tolerance_emits() {
        let sched = constant_scheduler();
        assert_eq!(sched.sample(0.334), PulseSample::Emit(128));
        assert_eq!(sched.sample(0.433), PulseSample::Emit(0));
    }

    #[test]
    fn off_boundary_is_no_change() {
        let sched = constant_scheduler();
        assert_eq!(sched.sample(0.2), PulseSample::NoChange);
        assert_eq!(sched.sample(0.55), PulseSample::NoChange);
    }

    #[test]
    fn cycle_wraps_and_restarts() {
        let sched = constant_scheduler();
        assert_eq!(sched.sample(0.999), PulseSample::NoChange);
        // 0.999 wraps to 0.0 on the next cycle: the first boundary fires again.
        assert_eq!(sched.sample(1.0005), PulseSample::Emit(128));
    }

    #[test]
    fn drive_writes_once_per_crossing() {
        let mut sched = constant_scheduler();
        let mut port = RecordingPort::new();
        // Three refreshes inside the same tolerance window.
        sched.drive(&mut port, 0.327);
        sched.drive(&mut port, 0.333);
        sched.drive(&mut port, 0.339);
        assert_eq!(port.writes, vec![128]);
        // Next boundary.
        sched.drive(&mut port, 0.433);
        assert_eq!(port.writes, vec![128, 0]);
    }

    #[test]
    fn drive_fires_again_after_wrap() {
        let mut sched = constant_scheduler();
        let mut port = RecordingPort::new();
        sched.drive(&mut port, 0.001);
        sched.drive(&mut port, 1.002);
        sched.drive(&mut port, 2.003);
        assert_eq!(port.writes, vec![128, 128, 128]);
    }

    #[test]
    fn decreasing_countdown_samples_work() {
        // The driving clock is a countdown; phase is the fractional part of
        // the remaining time, so samples arrive in decreasing phase order.
        let mut sched = constant_scheduler();
        let mut port = RecordingPort::new();
        for i in 0..200 {
            let remaining = 8.0 - i as f64 * 0.016;
            sched.drive(&mut port, remaining);
        }
        assert!(!port.writes.is_empty());
        // Only pattern bytes ever reach the port.
        assert!(port.writes.iter().all(|&v| v == 128 || v == 0));
    }

    #[test]
    #[should_panic(expected = "ascending")]
    fn unsorted_pattern_is_rejected() {
        PulsePattern::new("bad", vec![(0.5, 1), (0.1, 0)]);
    }
}
