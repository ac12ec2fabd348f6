//! Shared constants for the session engine.
//!
//! Trigger bytes and durations come straight from the lab protocol; timing
//! defaults can be overridden per session via [`crate::session::TimingConfig`].

/// Trigger byte for the TENS line (pin 8 on the AD instrument).
pub const TENS_TRIG: u8 = 128;

/// Number of discrete shock intensity levels available on the stimulator.
pub const SHOCK_LEVELS: u32 = 10;

/// Initial trigger byte for the `high` shock outcome (lowest intensity level).
pub const INITIAL_HIGH_TRIG: u8 = 1;
/// Initial trigger byte for the `low` shock outcome.
pub const INITIAL_LOW_TRIG: u8 = 11;
/// Initial trigger byte for the `medium` shock outcome.
pub const INITIAL_MEDIUM_TRIG: u8 = 21;

/// Seconds a non-zero trigger is held before the port is returned to zero.
/// The port needs roughly 0.5 s to settle, so 1 s leaves headroom.
pub const PORT_BUFFER_SECS: f64 = 1.0;

/// Inter-trial interval in seconds.
pub const ITI_SECS: f64 = 3.0;

/// Seconds a rating screen stays up after the participant responds, so the
/// slider can still be adjusted before the value is recorded.
pub const RESPONSE_HOLD_SECS: f64 = 1.0;

/// Length of the pre-shock countdown in seconds.
pub const COUNTDOWN_SECS: f64 = 10.0;

/// Countdown time (seconds remaining) at which TENS pulsing begins.
pub const TENS_ONSET_SECS: f64 = 8.0;

/// Countdown time (seconds remaining) at which the expectancy probe appears.
pub const EXPECTANCY_ONSET_SECS: f64 = 7.0;

/// Pulse boundaries must land within this many seconds of their nominal
/// offset. Polling runs at display-refresh cadence, so comparisons are
/// always absolute-difference against this tolerance, never equality.
pub const PULSE_TOLERANCE_SECS: f64 = 0.010;

/// Length of one repeating pulse cycle in seconds.
pub const PULSE_CYCLE_SECS: f64 = 1.0;

/// Nominal display refresh interval used by the cooperative wait loops.
pub const FRAME_INTERVAL_SECS: f64 = 1.0 / 60.0;
