//! Session configuration.
//!
//! Everything the engine used to reach for ambiently (trigger tables, pulse
//! assignments, timing constants) is collected into one [`SessionConfig`]
//! value built at startup and passed by reference into each component.

use serde::{Deserialize, Serialize};

use crate::consts;

use super::plan::{Counterbalance, SessionDesign, TensCondition};
use super::pulse::{PatternKind, PulsePattern};

/// All tunable durations and tolerances, in seconds. Loadable from the
/// session TOML file; defaults match the lab protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a non-zero trigger is held before the port is re-zeroed.
    pub port_buffer: f64,
    /// Inter-trial interval.
    pub iti: f64,
    /// How long a rating screen holds after the response before recording.
    pub response_hold: f64,
    /// Pre-shock countdown length.
    pub countdown: f64,
    /// Countdown time remaining at which TENS pulsing begins.
    pub tens_onset: f64,
    /// Countdown time remaining at which the expectancy probe appears.
    pub expectancy_onset: f64,
    /// Pulse boundary tolerance.
    pub pulse_tolerance: f64,
    /// Nominal refresh interval for the cooperative wait loops.
    pub frame_interval: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            port_buffer: consts::PORT_BUFFER_SECS,
            iti: consts::ITI_SECS,
            response_hold: consts::RESPONSE_HOLD_SECS,
            countdown: consts::COUNTDOWN_SECS,
            tens_onset: consts::TENS_ONSET_SECS,
            expectancy_onset: consts::EXPECTANCY_ONSET_SECS,
            pulse_tolerance: consts::PULSE_TOLERANCE_SECS,
            frame_interval: consts::FRAME_INTERVAL_SECS,
        }
    }
}

impl TimingConfig {
    /// Windows must nest inside the countdown; a config that violates this
    /// is rejected up front rather than mid-trial.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.countdown > self.tens_onset && self.tens_onset > self.expectancy_onset) {
            return Err(format!(
                "countdown windows must satisfy countdown > tens_onset > expectancy_onset \
                 (got {} > {} > {})",
                self.countdown, self.tens_onset, self.expectancy_onset
            ));
        }
        if self.pulse_tolerance <= 0.0 || self.frame_interval <= 0.0 {
            return Err("pulse_tolerance and frame_interval must be positive".into());
        }
        Ok(())
    }
}

/// Which experiment variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignVariant {
    /// Binary-choice variant, single context.
    Choice,
    /// Context-renewal variant (A / B / A).
    ContextRenewal,
}

/// Counterbalanced pulse pattern assignment for the two TENS conditions.
#[derive(Debug, Clone)]
pub struct PatternSet {
    monopolar: PulsePattern,
    bipolar: PulsePattern,
}

impl PatternSet {
    pub fn assign(cb: &Counterbalance) -> Self {
        Self {
            monopolar: PulsePattern::of(cb.pattern_kind(TensCondition::Monopolar)),
            bipolar: PulsePattern::of(cb.pattern_kind(TensCondition::Bipolar)),
        }
    }

    pub fn for_condition(&self, condition: TensCondition) -> &PulsePattern {
        match condition {
            TensCondition::Monopolar => &self.monopolar,
            TensCondition::Bipolar => &self.bipolar,
        }
    }
}

/// Everything a session needs, built once at startup.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub participant_id: u32,
    pub counterbalance: Counterbalance,
    pub timing: TimingConfig,
    pub design: SessionDesign,
    pub patterns: PatternSet,
    /// Session start timestamp, recorded in every persisted row.
    pub started_at: String,
}

impl SessionConfig {
    pub fn new(participant_id: u32, variant: DesignVariant, timing: TimingConfig) -> Self {
        let counterbalance = Counterbalance::from_participant(participant_id);
        let design = match variant {
            DesignVariant::Choice => SessionDesign::choice_variant(&counterbalance),
            DesignVariant::ContextRenewal => SessionDesign::context_renewal(&counterbalance),
        };
        let patterns = PatternSet::assign(&counterbalance);
        let started_at = chrono::Local::now().format("%Y-%m-%d_%H.%M.%S").to_string();
        Self {
            participant_id,
            counterbalance,
            timing,
            design,
            patterns,
            started_at,
        }
    }

    /// Name of the pattern assigned to the optimal condition (persisted as
    /// session metadata).
    pub fn optimal_pattern(&self) -> PatternKind {
        self.counterbalance.pattern_kind(self.counterbalance.optimal)
    }
}
