//! Adaptive staircase calibration of the participant's shock intensity.
//!
//! The stimulator exposes discrete intensity levels; the staircase walks
//! the trigger table up and down in lockstep (the 10-unit spacing between
//! the high/low/medium bytes never changes) until the participant settles
//! on a tolerable-but-painful level. The resulting [`ShockTable`] becomes
//! the fixed intensity table for the main experiment phase.
//!
//! The procedure is exactly reproducible: the same sequence of decisions
//! from the same starting state yields the same final table.

use crate::text;
use crate::ui::{ButtonId, Element, Frame, Key, SliderId};

use super::config::TimingConfig;
use super::io::{Aborted, SessionIo};
use super::plan::{Outcome, Trial};

/// Trigger bytes for the three shock outcomes at the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShockTable {
    pub high: u8,
    pub low: u8,
    pub medium: u8,
}

impl ShockTable {
    /// Byte values start on the lowest intensity level.
    pub fn initial() -> Self {
        Self {
            high: crate::consts::INITIAL_HIGH_TRIG,
            low: crate::consts::INITIAL_LOW_TRIG,
            medium: crate::consts::INITIAL_MEDIUM_TRIG,
        }
    }

    pub fn byte_for(&self, outcome: Outcome) -> u8 {
        match outcome {
            Outcome::High => self.high,
            Outcome::Medium => self.medium,
            Outcome::Low => self.low,
        }
    }

    fn step(&mut self, delta: i16) {
        self.high = (i16::from(self.high) + delta) as u8;
        self.low = (i16::from(self.low) + delta) as u8;
        self.medium = (i16::from(self.medium) + delta) as u8;
    }
}

impl Default for ShockTable {
    fn default() -> Self {
        Self::initial()
    }
}

/// Participant decision after each calibration shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibDecision {
    Increase,
    Stay,
    Decrease,
}

/// Where the staircase currently is in its cycle. Mostly for logging; the
/// transitions are driven by the wait loop in [`CalibrationController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibPhase {
    Ready,
    AwaitingShockTrigger,
    Stimulating,
    AwaitingRating,
    AwaitingDecision,
    ConfirmingPrevious,
    Finished,
}

/// Mutable staircase state: the trigger table, the level counter, and the
/// finished flag. Owned exclusively by [`CalibrationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationState {
    pub table: ShockTable,
    pub level: u32,
    pub finished: bool,
    shock_levels: u32,
}

impl CalibrationState {
    pub fn new(shock_levels: u32) -> Self {
        assert!(shock_levels >= 1, "need at least one shock level");
        Self {
            table: ShockTable::initial(),
            level: 1,
            finished: false,
            shock_levels,
        }
    }

    /// Terminal when `Stay` (or a declined confirmation) set the flag, or
    /// the level counter left the valid range.
    pub fn is_terminal(&self) -> bool {
        self.finished || !(1..=self.shock_levels).contains(&self.level)
    }

    /// Decisions offered at the current level: no `Increase` at the
    /// ceiling, no `Decrease` at the floor.
    pub fn decisions(&self) -> &'static [CalibDecision] {
        if self.level <= 1 {
            &[CalibDecision::Increase, CalibDecision::Stay]
        } else if self.level >= self.shock_levels {
            &[CalibDecision::Decrease, CalibDecision::Stay]
        } else {
            &[
                CalibDecision::Increase,
                CalibDecision::Stay,
                CalibDecision::Decrease,
            ]
        }
    }

    /// Prompt text matching the offered decision set.
    pub fn prompt(&self) -> &'static str {
        if self.level <= 1 {
            text::CHECK_LVL1
        } else if self.level >= self.shock_levels {
            text::CHECK_MAX
        } else {
            text::CHECK
        }
    }

    /// Apply one decision. All three byte offsets move in lockstep so the
    /// spacing between outcomes is preserved.
    pub fn apply(&mut self, decision: CalibDecision) {
        match decision {
            CalibDecision::Increase => {
                self.level += 1;
                self.table.step(1);
            }
            CalibDecision::Stay => self.finished = true,
            CalibDecision::Decrease => {
                self.level -= 1;
                self.table.step(-1);
            }
        }
        tracing::debug!(
            target: "painrig::calibration",
            level = self.level,
            high = self.table.high,
            finished = self.finished,
            ?decision,
            "staircase step"
        );
    }
}

/// Runs the interactive staircase over the calibration trial segment.
pub struct CalibrationController {
    state: CalibrationState,
    timing: TimingConfig,
    phase: CalibPhase,
}

impl CalibrationController {
    pub fn new(timing: TimingConfig, shock_levels: u32) -> Self {
        Self {
            state: CalibrationState::new(shock_levels),
            timing,
            phase: CalibPhase::Ready,
        }
    }

    /// The current trigger table; after [`run`](Self::run) returns this is
    /// the fixed intensity table for the main phase. On abort it holds the
    /// last state the staircase reached.
    pub fn table(&self) -> ShockTable {
        self.state.table
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    fn set_phase(&mut self, phase: CalibPhase) {
        tracing::trace!(target: "painrig::calibration", ?phase, "transition");
        self.phase = phase;
    }

    /// One pass through the staircase. Writes each trial's pain rating into
    /// the matching calibration trial record.
    pub fn run(&mut self, io: &mut SessionIo<'_>, trials: &mut [Trial]) -> Result<ShockTable, Aborted> {
        let mut index: isize = 0;
        let mut confirm_previous = false;
        let blank = Frame::blank();

        while index >= 0 && (index as usize) < trials.len() && !self.state.is_terminal() {
            if confirm_previous {
                self.set_phase(CalibPhase::ConfirmingPrevious);
                let frame = Frame::with(vec![
                    Element::Text(text::SHOCK_CHECK.into()),
                    Element::Button {
                        id: ButtonId::ConfirmYes,
                        label: text::YES.into(),
                    },
                    Element::Button {
                        id: ButtonId::ConfirmNo,
                        label: text::NO.into(),
                    },
                ]);
                match io.wait_for_button(&[ButtonId::ConfirmYes, ButtonId::ConfirmNo], &frame)? {
                    ButtonId::ConfirmYes => {
                        confirm_previous = false;
                        io.wait(self.timing.iti, &blank)?;
                    }
                    _ => {
                        self.state.finished = true;
                        io.wait(self.timing.iti, &blank)?;
                        break;
                    }
                }
            }

            self.set_phase(CalibPhase::AwaitingShockTrigger);
            io.wait_for_key(&[Key::Space], &Frame::text(text::SHOCK_READY))?;

            self.set_phase(CalibPhase::Stimulating);
            io.zero_port();
            let fixation = Frame::with(vec![Element::Fixation]);
            io.surface.draw(&fixation);
            io.port.write(self.state.table.high);
            io.wait(self.timing.port_buffer, &fixation)?;
            io.zero_port();

            self.set_phase(CalibPhase::AwaitingRating);
            let rating_frame = Frame::with(vec![Element::Slider {
                id: SliderId::Calibration,
                prompt: text::PAIN_PROMPT.into(),
            }]);
            let first = io.wait_for_slider(SliderId::Calibration, &rating_frame)?;
            io.wait(self.timing.response_hold, &rating_frame)?;
            let rating = io
                .surface
                .slider_value(SliderId::Calibration)
                .unwrap_or(first);
            trials[index as usize].pain_response = Some(rating);
            io.surface.reset_slider(SliderId::Calibration);
            io.wait(self.timing.iti, &blank)?;

            self.set_phase(CalibPhase::AwaitingDecision);
            let offered = self.state.decisions();
            let mut elements = vec![Element::Text(self.state.prompt().into())];
            let mut ids = Vec::new();
            for decision in offered {
                let (id, label) = match decision {
                    CalibDecision::Increase => (ButtonId::CalibNext, text::NEXT_LEVEL),
                    CalibDecision::Stay => (ButtonId::CalibStay, text::STAY_LEVEL),
                    CalibDecision::Decrease => (ButtonId::CalibPrevious, text::PREVIOUS_LEVEL),
                };
                ids.push(id);
                elements.push(Element::Button {
                    id,
                    label: label.into(),
                });
            }
            let frame = Frame::with(elements);
            match io.wait_for_button(&ids, &frame)? {
                ButtonId::CalibNext => {
                    self.state.apply(CalibDecision::Increase);
                    index += 1;
                }
                ButtonId::CalibStay => self.state.apply(CalibDecision::Stay),
                ButtonId::CalibPrevious => {
                    self.state.apply(CalibDecision::Decrease);
                    index -= 1;
                    confirm_previous = true;
                }
                other => unreachable!("unexpected calibration button {other:?}"),
            }
            io.wait(self.timing.iti, &blank)?;
        }

        self.state.finished = true;
        self.set_phase(CalibPhase::Finished);
        tracing::info!(
            target: "painrig::calibration",
            level = self.state.level,
            high = self.state.table.high,
            "calibration finished"
        );
        Ok(self.state.table)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::port::RecordingPort;
    use crate::session::plan::{Counterbalance, SessionDesign, Trial, TrialPlanGenerator};
    use crate::session::ManualClock;
    use crate::ui::{ScriptedEvent, ScriptedInput, ScriptedSurface};

    #[test]
    fn increase_increase_stay_advances_two_levels() {
        let mut state = CalibrationState::new(10);
        state.apply(CalibDecision::Increase);
        state.apply(CalibDecision::Increase);
        state.apply(CalibDecision::Stay);
        assert!(state.finished);
        assert_eq!(state.level, 3);
        assert_eq!(
            state.table,
            ShockTable {
                high: 3,
                low: 13,
                medium: 23
            }
        );
    }

    #[test]
    fn decision_sets_shrink_at_floor_and_ceiling() {
        let mut state = CalibrationState::new(3);
        assert_eq!(state.decisions(), &[CalibDecision::Increase, CalibDecision::Stay]);
        assert_eq!(state.prompt(), text::CHECK_LVL1);
        state.apply(CalibDecision::Increase);
        assert_eq!(state.decisions().len(), 3);
        assert_eq!(state.prompt(), text::CHECK);
        state.apply(CalibDecision::Increase);
        assert_eq!(state.decisions(), &[CalibDecision::Decrease, CalibDecision::Stay]);
        assert_eq!(state.prompt(), text::CHECK_MAX);
    }

    #[test]
    fn same_decision_sequence_reproduces_the_same_table() {
        let run = |seq: &[CalibDecision]| {
            let mut state = CalibrationState::new(10);
            for &d in seq {
                state.apply(d);
            }
            state
        };
        let seq = [
            CalibDecision::Increase,
            CalibDecision::Increase,
            CalibDecision::Increase,
            CalibDecision::Decrease,
            CalibDecision::Stay,
        ];
        assert_eq!(run(&seq), run(&seq));
        assert_eq!(run(&seq).table.high, 3);
    }

    #[test]
    fn spacing_between_outcomes_is_preserved() {
        let mut state = CalibrationState::new(10);
        for _ in 0..5 {
            state.apply(CalibDecision::Increase);
        }
        let t = state.table;
        assert_eq!(t.low - t.high, 10);
        assert_eq!(t.medium - t.low, 10);
    }

    fn calibration_trials() -> Vec<Trial> {
        let cb = Counterbalance::from_participant(0);
        let design = SessionDesign::choice_variant(&cb);
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        TrialPlanGenerator::new(&design).generate(&mut rng).calibration
    }

    #[test]
    fn interactive_staircase_records_ratings_and_brackets_the_port() {
        let timing = TimingConfig {
            port_buffer: 0.1,
            iti: 0.1,
            response_hold: 0.1,
            frame_interval: 0.05,
            ..Default::default()
        };
        let clock = Rc::new(ManualClock::new());
        let mut surface = ScriptedSurface::new(
            clock.clone(),
            timing.frame_interval,
            vec![
                ScriptedEvent { at: 0.1, input: ScriptedInput::Key(Key::Space) },
                ScriptedEvent { at: 0.5, input: ScriptedInput::Slider(SliderId::Calibration, 50.0) },
                ScriptedEvent { at: 1.0, input: ScriptedInput::Button(ButtonId::CalibNext) },
                ScriptedEvent { at: 1.5, input: ScriptedInput::Key(Key::Space) },
                ScriptedEvent { at: 2.0, input: ScriptedInput::Slider(SliderId::Calibration, 70.0) },
                ScriptedEvent { at: 2.5, input: ScriptedInput::Button(ButtonId::CalibStay) },
            ],
        );
        let mut port = RecordingPort::new();
        let mut trials = calibration_trials();

        let table = {
            let mut io = SessionIo::new(&*clock, &mut surface, &mut port);
            let mut controller = CalibrationController::new(timing, 10);
            controller.run(&mut io, &mut trials).unwrap()
        };

        // One Increase from the initial table.
        assert_eq!(table, ShockTable { high: 2, low: 12, medium: 22 });
        assert_eq!(trials[0].pain_response, Some(50.0));
        assert_eq!(trials[1].pain_response, Some(70.0));
        assert!(trials[2].pain_response.is_none());
        // Two stimulations, each zero-bracketed: 0,1,0 then 0,2,0.
        assert_eq!(port.writes, vec![0, 1, 0, 0, 2, 0]);
    }

    #[test]
    fn declining_the_previous_level_confirmation_finishes() {
        let timing = TimingConfig {
            port_buffer: 0.05,
            iti: 0.05,
            response_hold: 0.05,
            frame_interval: 0.05,
            ..Default::default()
        };
        let clock = Rc::new(ManualClock::new());
        let mut surface = ScriptedSurface::new(
            clock.clone(),
            timing.frame_interval,
            vec![
                // Level 1 trial, go up.
                ScriptedEvent { at: 0.1, input: ScriptedInput::Key(Key::Space) },
                ScriptedEvent { at: 0.3, input: ScriptedInput::Slider(SliderId::Calibration, 30.0) },
                ScriptedEvent { at: 0.6, input: ScriptedInput::Button(ButtonId::CalibNext) },
                // Level 2 trial, go back down.
                ScriptedEvent { at: 0.9, input: ScriptedInput::Key(Key::Space) },
                ScriptedEvent { at: 1.2, input: ScriptedInput::Slider(SliderId::Calibration, 80.0) },
                ScriptedEvent { at: 1.5, input: ScriptedInput::Button(ButtonId::CalibPrevious) },
                // Decline repeating the previous level.
                ScriptedEvent { at: 1.8, input: ScriptedInput::Button(ButtonId::ConfirmNo) },
            ],
        );
        let mut port = RecordingPort::new();
        let mut trials = calibration_trials();

        let mut controller = CalibrationController::new(timing, 10);
        let table = {
            let mut io = SessionIo::new(&*clock, &mut surface, &mut port);
            controller.run(&mut io, &mut trials).unwrap()
        };

        // Back at the initial level after the Decrease.
        assert_eq!(table, ShockTable::initial());
        assert!(controller.state().finished);
    }
}
