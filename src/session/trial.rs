//! Executes one scheduled trial against the countdown clock.
//!
//! The whole trial is driven by a single monotonically decreasing countdown:
//! choice (if any) before it starts, plain countdown from 10 s, TENS pulses
//! from 8 s, the expectancy probe from 7 s, shock at zero, then the
//! unbounded pain rating and the inter-trial interval. Every hardware write
//! is zero-baseline bracketed so no trigger can stay stuck across a trial
//! boundary.

use rand::Rng;

use crate::text;
use crate::ui::{ButtonId, Element, Frame, SliderId};

use super::calibration::ShockTable;
use super::clock::Countdown;
use super::config::{PatternSet, TimingConfig};
use super::io::{Aborted, SessionIo};
use super::plan::{resolve_choice, Counterbalance, Stimulus, TensCondition, Trial};
use super::pulse::PulseScheduler;

pub struct TrialRunner<'a> {
    cb: &'a Counterbalance,
    patterns: &'a PatternSet,
    table: ShockTable,
    timing: TimingConfig,
    show_context: bool,
}

impl<'a> TrialRunner<'a> {
    pub fn new(
        cb: &'a Counterbalance,
        patterns: &'a PatternSet,
        table: ShockTable,
        timing: TimingConfig,
        show_context: bool,
    ) -> Self {
        Self {
            cb,
            patterns,
            table,
            timing,
            show_context,
        }
    }

    /// Which pulse train this trial emits, if any: the chosen condition on
    /// choice trials, the trial-type's assigned condition on other TENS
    /// trials (extinction presents both conditions without a choice).
    fn pulse_condition(&self, trial: &Trial) -> Option<TensCondition> {
        if trial.stimulus != Stimulus::Tens {
            return None;
        }
        trial
            .choice_response
            .or_else(|| TensCondition::from_name(trial.trial_type))
    }

    fn countdown_frame(&self, trial: &Trial, remaining: f64) -> Frame {
        let mut elements = vec![Element::Countdown(remaining.ceil() as u32)];
        if self.show_context {
            elements.push(Element::Caption(format!("Context {}", trial.context)));
        }
        Frame::with(elements)
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        io: &mut SessionIo<'_>,
        trial: &mut Trial,
        rng: &mut R,
    ) -> Result<(), Aborted> {
        io.zero_port();
        let blank = Frame::blank();
        io.surface.draw(&blank);

        // 1. Optional binary choice; the outcome resolves the moment the
        //    selection is recorded.
        if trial.is_choice_trial {
            let left = trial.choice1.expect("choice trial has a first option");
            let right = trial.choice2.expect("choice trial has a second option");
            let frame = Frame::with(vec![
                Element::Text(text::CHOICE.into()),
                Element::Button {
                    id: ButtonId::ChoiceLeft,
                    label: left.name().into(),
                },
                Element::Button {
                    id: ButtonId::ChoiceRight,
                    label: right.name().into(),
                },
            ]);
            let chosen = match io.wait_for_button(&[ButtonId::ChoiceLeft, ButtonId::ChoiceRight], &frame)? {
                ButtonId::ChoiceLeft => left,
                _ => right,
            };
            resolve_choice(trial, chosen, self.cb, rng);
        }

        let mut scheduler = self.pulse_condition(trial).map(|c| {
            PulseScheduler::with_tolerance(
                self.patterns.for_condition(c).clone(),
                self.timing.pulse_tolerance,
            )
        });

        // 2-4. Countdown. Phase boundaries are compared by ordering on the
        //      sampled clock; the pulse scheduler handles its own tolerance.
        let countdown = Countdown::start(io.clock, self.timing.countdown);

        loop {
            let remaining = countdown.remaining(io.clock);
            if remaining <= self.timing.tens_onset {
                break;
            }
            io.checkpoint()?;
            io.surface.draw(&self.countdown_frame(trial, remaining));
        }

        loop {
            let remaining = countdown.remaining(io.clock);
            if remaining <= self.timing.expectancy_onset {
                break;
            }
            io.checkpoint()?;
            if let Some(s) = scheduler.as_mut() {
                s.drive(io.port, remaining);
            }
            io.surface.draw(&self.countdown_frame(trial, remaining));
        }

        loop {
            let remaining = countdown.remaining(io.clock);
            if remaining <= 0.0 {
                break;
            }
            io.checkpoint()?;
            if let Some(s) = scheduler.as_mut() {
                s.drive(io.port, remaining);
            }
            let mut frame = self.countdown_frame(trial, remaining);
            frame.elements.push(Element::Slider {
                id: SliderId::Expectancy,
                prompt: text::EXPECTANCY_PROMPT.into(),
            });
            io.surface.draw(&frame);
        }

        // Captured once, at the window boundary; never touched means no
        // response and is recorded as such.
        trial.expectancy_response = io.surface.slider_value(SliderId::Expectancy);
        io.surface.reset_slider(SliderId::Expectancy);

        // 5. Shock delivery, zero-bracketed.
        io.zero_port();
        let fixation = Frame::with(vec![Element::Fixation]);
        io.surface.draw(&fixation);
        let outcome = trial.outcome.expect("trial outcome resolved before delivery");
        io.port.write(self.table.byte_for(outcome));
        io.wait(self.timing.port_buffer, &fixation)?;
        io.zero_port();

        // 6. Pain rating: no timeout by design.
        let pain_frame = Frame::with(vec![Element::Slider {
            id: SliderId::Pain,
            prompt: text::PAIN_PROMPT.into(),
        }]);
        let first = io.wait_for_slider(SliderId::Pain, &pain_frame)?;
        io.wait(self.timing.response_hold, &pain_frame)?;
        trial.pain_response = Some(io.surface.slider_value(SliderId::Pain).unwrap_or(first));
        io.surface.reset_slider(SliderId::Pain);

        tracing::debug!(
            target: "painrig::trial",
            trial = trial.trial_number,
            trial_type = trial.trial_type,
            outcome = ?trial.outcome,
            pain = ?trial.pain_response,
            expectancy = ?trial.expectancy_response,
            "trial complete"
        );

        // 7. Inter-trial interval.
        io.surface.draw(&blank);
        io.wait(self.timing.iti, &blank)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::port::RecordingPort;
    use crate::session::plan::{BlockNumber, Context, Outcome, Phase};
    use crate::session::ManualClock;
    use crate::ui::{Key, ScriptedEvent, ScriptedInput, ScriptedSurface};

    fn fast_timing() -> TimingConfig {
        TimingConfig {
            port_buffer: 0.1,
            iti: 0.1,
            response_hold: 0.1,
            countdown: 1.0,
            tens_onset: 0.8,
            expectancy_onset: 0.7,
            pulse_tolerance: 0.01,
            frame_interval: 0.01,
        }
    }

    fn choice_trial(cb: &Counterbalance) -> Trial {
        Trial {
            phase: Phase::Conditioning,
            block: BlockNumber::Num(1),
            trial_type: "TENS",
            stimulus: Stimulus::Tens,
            context: Context::A,
            choice1: Some(cb.optimal),
            choice2: Some(cb.suboptimal),
            is_choice_trial: true,
            reinforcement_probability: Some(1.0),
            outcome: None,
            choice_response: None,
            expectancy_response: None,
            pain_response: None,
            trial_number: Some(1),
        }
    }

    fn control_trial() -> Trial {
        Trial {
            phase: Phase::Conditioning,
            block: BlockNumber::Num(1),
            trial_type: "control",
            stimulus: Stimulus::Control,
            context: Context::A,
            choice1: None,
            choice2: None,
            is_choice_trial: false,
            reinforcement_probability: Some(1.0),
            outcome: Some(Outcome::Low),
            choice_response: None,
            expectancy_response: None,
            pain_response: None,
            trial_number: Some(2),
        }
    }

    struct Rig {
        clock: Rc<ManualClock>,
        surface: ScriptedSurface,
        port: RecordingPort,
    }

    fn rig(events: Vec<ScriptedEvent>) -> Rig {
        let clock = Rc::new(ManualClock::new());
        let surface = ScriptedSurface::new(clock.clone(), 0.01, events);
        Rig {
            clock,
            surface,
            port: RecordingPort::new(),
        }
    }

    #[test]
    fn choice_trial_runs_to_completion() {
        let cb = Counterbalance::from_participant(0);
        let patterns = PatternSet::assign(&cb);
        let mut trial = choice_trial(&cb);
        let mut r = rig(vec![
            ScriptedEvent { at: 0.05, input: ScriptedInput::Button(ButtonId::ChoiceLeft) },
            ScriptedEvent { at: 0.60, input: ScriptedInput::Slider(SliderId::Expectancy, 55.0) },
            ScriptedEvent { at: 1.60, input: ScriptedInput::Slider(SliderId::Pain, 80.0) },
        ]);
        let mut rng = StdRng::seed_from_u64(1);

        let runner = TrialRunner::new(&cb, &patterns, ShockTable::initial(), fast_timing(), false);
        let mut io = SessionIo::new(&*r.clock, &mut r.surface, &mut r.port);
        runner.run(&mut io, &mut trial, &mut rng).unwrap();

        // Optimal choice resolves deterministically to medium.
        assert_eq!(trial.choice_response, Some(cb.optimal));
        assert_eq!(trial.outcome, Some(Outcome::Medium));
        assert_eq!(trial.expectancy_response, Some(55.0));
        assert_eq!(trial.pain_response, Some(80.0));

        // The medium trigger byte was delivered and the port ended at zero.
        assert!(r.port.writes.contains(&21));
        assert_eq!(r.port.last(), Some(0));
        // TENS pulses were emitted during the countdown.
        assert!(r.port.writes.contains(&128));
    }

    #[test]
    fn every_nonzero_write_is_followed_by_a_zero() {
        let cb = Counterbalance::from_participant(0);
        let patterns = PatternSet::assign(&cb);
        let mut trial = control_trial();
        let mut r = rig(vec![
            ScriptedEvent { at: 1.50, input: ScriptedInput::Slider(SliderId::Pain, 10.0) },
        ]);
        let mut rng = StdRng::seed_from_u64(1);

        let runner = TrialRunner::new(&cb, &patterns, ShockTable::initial(), fast_timing(), false);
        let mut io = SessionIo::new(&*r.clock, &mut r.surface, &mut r.port);
        runner.run(&mut io, &mut trial, &mut rng).unwrap();

        // Control trials never pulse; only the shock byte and its brackets.
        let nonzero: Vec<u8> = r.port.writes.iter().copied().filter(|&v| v != 0).collect();
        assert_eq!(nonzero, vec![11]);
        assert_eq!(r.port.last(), Some(0));
    }

    #[test]
    fn untouched_expectancy_slider_is_recorded_as_no_response() {
        let cb = Counterbalance::from_participant(0);
        let patterns = PatternSet::assign(&cb);
        let mut trial = control_trial();
        let mut r = rig(vec![
            ScriptedEvent { at: 1.50, input: ScriptedInput::Slider(SliderId::Pain, 42.0) },
        ]);
        let mut rng = StdRng::seed_from_u64(1);

        let runner = TrialRunner::new(&cb, &patterns, ShockTable::initial(), fast_timing(), false);
        let mut io = SessionIo::new(&*r.clock, &mut r.surface, &mut r.port);
        runner.run(&mut io, &mut trial, &mut rng).unwrap();

        assert_eq!(trial.expectancy_response, None);
        assert_eq!(trial.pain_response, Some(42.0));
    }

    #[test]
    fn extinction_tens_trial_pulses_without_a_choice() {
        let cb = Counterbalance::from_participant(0);
        let patterns = PatternSet::assign(&cb);
        let mut trial = Trial {
            phase: Phase::Extinction,
            trial_type: "monopolar",
            is_choice_trial: false,
            choice1: None,
            choice2: None,
            outcome: Some(Outcome::Low),
            ..control_trial()
        };
        trial.stimulus = Stimulus::Tens;
        let mut r = rig(vec![
            ScriptedEvent { at: 1.50, input: ScriptedInput::Slider(SliderId::Pain, 5.0) },
        ]);
        let mut rng = StdRng::seed_from_u64(1);

        let runner = TrialRunner::new(&cb, &patterns, ShockTable::initial(), fast_timing(), false);
        let mut io = SessionIo::new(&*r.clock, &mut r.surface, &mut r.port);
        runner.run(&mut io, &mut trial, &mut rng).unwrap();

        assert!(r.port.writes.contains(&128));
        assert_eq!(trial.outcome, Some(Outcome::Low));
        assert_eq!(r.port.last(), Some(0));
    }

    #[test]
    fn abort_during_expectancy_window_unwinds() {
        let cb = Counterbalance::from_participant(0);
        let patterns = PatternSet::assign(&cb);
        let mut trial = control_trial();
        // Escape lands inside the expectancy window (remaining < 0.7s).
        let mut r = rig(vec![
            ScriptedEvent { at: 0.50, input: ScriptedInput::Key(Key::Escape) },
        ]);
        let mut rng = StdRng::seed_from_u64(1);

        let runner = TrialRunner::new(&cb, &patterns, ShockTable::initial(), fast_timing(), false);
        let mut io = SessionIo::new(&*r.clock, &mut r.surface, &mut r.port);
        let result = runner.run(&mut io, &mut trial, &mut rng);

        assert_eq!(result, Err(Aborted));
        // Nothing past the abort point was captured.
        assert_eq!(trial.expectancy_response, None);
        assert_eq!(trial.pain_response, None);
    }
}
