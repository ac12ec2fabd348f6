//! Cooperative wait primitives.
//!
//! There is no true parallelism anywhere in the engine: every "blocking"
//! operation is a polling loop that checks the abort key, re-renders the
//! current frame (which yields until the surface's next refresh), and
//! samples the injected clock. Each helper here is a suspension point, and
//! every suspension point system-wide runs the abort check.

use crate::port::OutputPort;
use crate::ui::{ButtonId, Frame, Key, SliderId, Surface};

use super::clock::Clock;

/// The abort key was detected at a suspension point. Unwinds every nested
/// wait loop with `?` back to the experiment controller, which zeroes the
/// port, persists what was collected, and ends the session cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

/// The clock, display surface, and output port a session runs against.
pub struct SessionIo<'a> {
    pub clock: &'a dyn Clock,
    pub surface: &'a mut dyn Surface,
    pub port: &'a mut dyn OutputPort,
}

impl<'a> SessionIo<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        surface: &'a mut dyn Surface,
        port: &'a mut dyn OutputPort,
    ) -> Self {
        Self {
            clock,
            surface,
            port,
        }
    }

    /// The system-wide abort check. Escape pressed anywhere ends the run.
    pub fn checkpoint(&mut self) -> Result<(), Aborted> {
        if self.surface.poll_keys(&[Key::Escape]).contains(&Key::Escape) {
            tracing::info!(target: "painrig::session", "abort key detected");
            return Err(Aborted);
        }
        Ok(())
    }

    /// Force the output port to the zero baseline.
    pub fn zero_port(&mut self) {
        self.port.write(0);
    }

    /// Hold `frame` on screen for `secs`, polling for abort each refresh.
    pub fn wait(&mut self, secs: f64, frame: &Frame) -> Result<(), Aborted> {
        let deadline = self.clock.now() + secs;
        while self.clock.now() < deadline {
            self.checkpoint()?;
            self.surface.draw(frame);
        }
        Ok(())
    }

    /// Block until one of `keys` is pressed.
    pub fn wait_for_key(&mut self, keys: &[Key], frame: &Frame) -> Result<Key, Aborted> {
        loop {
            self.checkpoint()?;
            if let Some(&key) = self.surface.poll_keys(keys).first() {
                return Ok(key);
            }
            self.surface.draw(frame);
        }
    }

    /// Block until one of the listed button targets is clicked.
    pub fn wait_for_button(
        &mut self,
        ids: &[ButtonId],
        frame: &Frame,
    ) -> Result<ButtonId, Aborted> {
        loop {
            self.checkpoint()?;
            for &id in ids {
                if self.surface.button_pressed(id) {
                    return Ok(id);
                }
            }
            self.surface.draw(frame);
        }
    }

    /// Block until the slider has a value (the participant has responded).
    pub fn wait_for_slider(&mut self, id: SliderId, frame: &Frame) -> Result<f64, Aborted> {
        loop {
            self.checkpoint()?;
            if let Some(value) = self.surface.slider_value(id) {
                return Ok(value);
            }
            self.surface.draw(frame);
        }
    }
}
