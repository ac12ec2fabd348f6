//! Display/input collaborator.
//!
//! Rendering fidelity is out of scope for the engine: trials describe what
//! should be on screen as a [`Frame`] of abstract elements and a [`Surface`]
//! implementation decides how to show it. The `draw` call doubles as the
//! cooperative yield — it blocks until the surface's next refresh, which is
//! what paces every wait loop in the engine.
//!
//! Implementations:
//! - [`console::ConsoleSurface`]: line-oriented development surface
//! - [`scripted::ScriptedSurface`]: deterministic canned-input surface for
//!   tests and dry runs

pub mod console;
pub mod scripted;

pub use console::ConsoleSurface;
pub use scripted::{ScriptedEvent, ScriptedInput, ScriptedSurface};

/// Keys the engine cares about. Escape is the system-wide abort signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Enter,
    Escape,
}

/// On-screen rating sliders. Calibration is labeled 1–10; Pain and
/// Expectancy run "Not painful" to "Very painful". All report 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SliderId {
    Calibration,
    Pain,
    Expectancy,
}

/// Clickable targets. One set per decision screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    CalibNext,
    CalibStay,
    CalibPrevious,
    ChoiceLeft,
    ChoiceRight,
    ConfirmYes,
    ConfirmNo,
}

/// One visual element of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Body text, centered.
    Text(String),
    /// Secondary line (e.g. "press spacebar to continue").
    Caption(String),
    /// Fixation cross shown at shock delivery.
    Fixation,
    /// Remaining whole seconds of the countdown, ceiling-rounded.
    Countdown(u32),
    /// A rating slider with its prompt.
    Slider { id: SliderId, prompt: String },
    /// A labeled button target.
    Button { id: ButtonId, label: String },
}

/// Everything that should be on screen for the current refresh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub elements: Vec<Element>,
}

impl Frame {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            elements: vec![Element::Text(body.into())],
        }
    }

    pub fn with(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Sliders present in this frame, in order.
    pub fn sliders(&self) -> Vec<SliderId> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                Element::Slider { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Buttons present in this frame, with labels.
    pub fn buttons(&self) -> Vec<(ButtonId, &str)> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                Element::Button { id, label } => Some((*id, label.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Display surface plus input device.
///
/// `draw` blocks until the next refresh; all other calls are non-blocking
/// polls. Blocking waits are built on top of these in the engine so the
/// abort check can run between refreshes.
pub trait Surface {
    /// Present a frame and yield until the next refresh.
    fn draw(&mut self, frame: &Frame);

    /// Keys from `filter` pressed since the last poll. Keys outside the
    /// filter stay pending.
    fn poll_keys(&mut self, filter: &[Key]) -> Vec<Key>;

    /// Whether the given button target was clicked since the last poll.
    /// Consumes the click on a match.
    fn button_pressed(&mut self, id: ButtonId) -> bool;

    /// Current value of a slider, `None` until the participant has
    /// interacted with it since the last reset.
    fn slider_value(&mut self, id: SliderId) -> Option<f64>;

    /// Clear a slider back to the untouched state for the next trial.
    fn reset_slider(&mut self, id: SliderId);
}
