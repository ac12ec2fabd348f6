//! Deterministic surface for tests and dry runs.
//!
//! Inputs are scripted against session time: each [`ScriptedEvent`] becomes
//! visible to the engine once the shared [`ManualClock`] reaches its
//! timestamp. `draw` advances the clock by one frame interval, which is what
//! makes every wait loop in the engine terminate deterministically.

use std::collections::HashMap;
use std::rc::Rc;

use crate::session::{Clock, ManualClock};

use super::{ButtonId, Frame, Key, SliderId, Surface};

/// One scripted input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedInput {
    Key(Key),
    Button(ButtonId),
    Slider(SliderId, f64),
}

/// An input that becomes visible at session time `at` (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedEvent {
    pub at: f64,
    pub input: ScriptedInput,
}

pub struct ScriptedSurface {
    clock: Rc<ManualClock>,
    frame_interval: f64,
    events: Vec<ScriptedEvent>,
    next_event: usize,
    pending_keys: Vec<Key>,
    pending_button: Option<ButtonId>,
    sliders: HashMap<SliderId, f64>,
    /// Frames drawn so far; also the deadlock guard counter.
    pub frames_drawn: usize,
    max_frames: usize,
}

impl ScriptedSurface {
    /// Events must be sorted by `at`; this is asserted because an
    /// out-of-order script silently reorders the session under test.
    pub fn new(clock: Rc<ManualClock>, frame_interval: f64, events: Vec<ScriptedEvent>) -> Self {
        assert!(
            events.windows(2).all(|w| w[0].at <= w[1].at),
            "scripted events must be sorted by time"
        );
        Self {
            clock,
            frame_interval,
            events,
            next_event: 0,
            pending_keys: Vec::new(),
            pending_button: None,
            sliders: HashMap::new(),
            frames_drawn: 0,
            max_frames: 2_000_000,
        }
    }

    /// Lower the runaway-loop guard; a wait that the script never satisfies
    /// panics instead of hanging the test.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    fn release_due(&mut self) {
        let now = self.clock.now();
        while self.next_event < self.events.len() && self.events[self.next_event].at <= now {
            match self.events[self.next_event].input {
                ScriptedInput::Key(k) => self.pending_keys.push(k),
                ScriptedInput::Button(b) => self.pending_button = Some(b),
                ScriptedInput::Slider(id, v) => {
                    self.sliders.insert(id, v);
                }
            }
            self.next_event += 1;
        }
    }
}

impl Surface for ScriptedSurface {
    fn draw(&mut self, _frame: &Frame) {
        self.frames_drawn += 1;
        assert!(
            self.frames_drawn <= self.max_frames,
            "scripted session exceeded {} frames; a wait loop is starved of input",
            self.max_frames
        );
        self.clock.advance(self.frame_interval);
        self.release_due();
    }

    fn poll_keys(&mut self, filter: &[Key]) -> Vec<Key> {
        self.release_due();
        let mut hit = Vec::new();
        self.pending_keys.retain(|k| {
            if filter.contains(k) {
                hit.push(*k);
                false
            } else {
                true
            }
        });
        hit
    }

    fn button_pressed(&mut self, id: ButtonId) -> bool {
        self.release_due();
        if self.pending_button == Some(id) {
            self.pending_button = None;
            true
        } else {
            false
        }
    }

    fn slider_value(&mut self, id: SliderId) -> Option<f64> {
        self.release_due();
        self.sliders.get(&id).copied()
    }

    fn reset_slider(&mut self, id: SliderId) {
        self.sliders.remove(&id);
    }
}
