//! Top-level session orchestration.
//!
//! Instruction screens, the calibration staircase, the main trial loop, the
//! forced port zeroing, persistence, and the exit screen. The abort signal
//! unwinds from any suspension point to [`ExperimentController::run`],
//! which is the single place that zeroes the hardware, persists everything
//! collected so far (including the in-progress partial trial), and shows
//! the termination screen.

use rand::Rng;

use crate::errors::Result;
use crate::persist::{SessionMeta, SessionRecord, TrialSink};
use crate::text;
use crate::ui::{Frame, Key};

use super::calibration::CalibrationController;
use super::config::SessionConfig;
use super::io::{Aborted, SessionIo};
use super::plan::TrialPlan;
use super::trial::TrialRunner;

/// How a session ended. Abort is a deliberate, clean termination path, not
/// an error: partial data is persisted and the process exits successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

pub struct ExperimentController<'a> {
    config: &'a SessionConfig,
    plan: TrialPlan,
    calibration: CalibrationController,
}

impl<'a> ExperimentController<'a> {
    pub fn new(config: &'a SessionConfig, plan: TrialPlan) -> Self {
        let calibration =
            CalibrationController::new(config.timing.clone(), config.design.shock_levels);
        Self {
            config,
            plan,
            calibration,
        }
    }

    /// Run the full session. Whatever happens inside (completion or abort),
    /// the port is force-zeroed and every trial row collected so far goes
    /// to the sink before the exit screen is shown.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        io: &mut SessionIo<'_>,
        rng: &mut R,
        sink: &mut dyn TrialSink,
    ) -> Result<RunOutcome> {
        io.zero_port();
        let flow = self.run_inner(io, rng);
        io.zero_port();

        let outcome = match flow {
            Ok(()) => RunOutcome::Completed,
            Err(Aborted) => RunOutcome::Aborted,
        };
        tracing::info!(target: "painrig::session", ?outcome, "session ended, persisting");

        let meta = self.meta();
        sink.save(&SessionRecord {
            meta: &meta,
            main: &self.plan.main,
            calibration: &self.plan.calibration,
        })?;

        let farewell = match outcome {
            RunOutcome::Completed => text::END,
            RunOutcome::Aborted => text::TERMINATION,
        };
        self.exit_screen(io, farewell);
        Ok(outcome)
    }

    fn run_inner<R: Rng + ?Sized>(
        &mut self,
        io: &mut SessionIo<'_>,
        rng: &mut R,
    ) -> std::result::Result<(), Aborted> {
        self.instruction(io, text::WELCOME, 3.0)?;
        self.instruction(io, text::TENS_INTRODUCTION, 3.0)?;
        self.instruction(io, text::CALIBRATION, 8.0)?;

        self.calibration.run(io, &mut self.plan.calibration)?;
        self.instruction(io, text::CALIBRATION_FINISH, 3.0)?;

        self.instruction(io, text::EXPERIMENT, 10.0)?;
        let runner = TrialRunner::new(
            &self.config.counterbalance,
            &self.config.patterns,
            self.calibration.table(),
            self.config.timing.clone(),
            self.config.design.uses_contexts,
        );
        for trial in &mut self.plan.main {
            runner.run(io, trial, rng)?;
        }
        Ok(())
    }

    /// Instruction screen: hold the text so it cannot be skipped unread,
    /// then wait for the spacebar.
    fn instruction(
        &self,
        io: &mut SessionIo<'_>,
        body: &str,
        hold: f64,
    ) -> std::result::Result<(), Aborted> {
        io.checkpoint()?;
        let frame = Frame::text(body);
        io.wait(hold, &frame)?;
        let mut prompt = frame.clone();
        prompt
            .elements
            .push(crate::ui::Element::Caption(text::CONTINUE.into()));
        io.wait_for_key(&[Key::Space], &prompt)?;
        io.wait(self.config.timing.iti, &Frame::blank())?;
        Ok(())
    }

    /// Final screen; dismissed by any key. The session is already over, so
    /// the abort key just dismisses it like any other.
    fn exit_screen(&self, io: &mut SessionIo<'_>, body: &str) {
        let frame = Frame::text(body);
        loop {
            let keys = io
                .surface
                .poll_keys(&[Key::Space, Key::Enter, Key::Escape]);
            if !keys.is_empty() {
                break;
            }
            io.surface.draw(&frame);
        }
    }

    fn meta(&self) -> SessionMeta {
        let cb = &self.config.counterbalance;
        SessionMeta {
            participant_id: self.config.participant_id,
            group: cb.group,
            group_name: cb.group_name,
            counterbalance: cb.index,
            started_at: self.config.started_at.clone(),
            optimal_name: cb.optimal.name(),
            optimal_pattern: self.config.optimal_pattern().name(),
            shock_level_high: self.calibration.table().high,
        }
    }
}
