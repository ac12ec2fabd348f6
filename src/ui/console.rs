//! Line-oriented development surface.
//!
//! Good enough to run a full session offline: frames are printed to stdout
//! whenever their content changes, and input arrives as lines on stdin,
//! read by a background thread so polling never blocks.
//!
//! Input grammar (one token per line):
//! - empty line → spacebar
//! - `esc` / `q` → escape (abort)
//! - a number → sets the slider shown on the current frame
//! - anything else → matched case-insensitively against the labels of the
//!   buttons on the current frame

use std::collections::{HashMap, VecDeque};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use super::{ButtonId, Frame, Key, SliderId, Surface};

pub struct ConsoleSurface {
    rx: Receiver<String>,
    frame_interval: Duration,
    last_render: String,
    pending_keys: VecDeque<Key>,
    pending_button: Option<ButtonId>,
    sliders: HashMap<SliderId, f64>,
    current_frame: Frame,
}

impl ConsoleSurface {
    pub fn new(frame_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            rx,
            frame_interval,
            last_render: String::new(),
            pending_keys: VecDeque::new(),
            pending_button: None,
            sliders: HashMap::new(),
            current_frame: Frame::blank(),
        }
    }

    fn pump(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(line) => self.interpret(line.trim().to_string()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn interpret(&mut self, token: String) {
        if token.is_empty() {
            self.pending_keys.push_back(Key::Space);
            return;
        }
        match token.to_ascii_lowercase().as_str() {
            "esc" | "escape" | "q" => {
                self.pending_keys.push_back(Key::Escape);
                return;
            }
            _ => {}
        }
        if let Ok(value) = token.parse::<f64>() {
            if let Some(id) = self.current_frame.sliders().first().copied() {
                self.sliders.insert(id, value.clamp(0.0, 100.0));
                return;
            }
        }
        let lowered = token.to_ascii_lowercase();
        for (id, label) in self.current_frame.buttons() {
            if label.to_ascii_lowercase().starts_with(&lowered) {
                self.pending_button = Some(id);
                return;
            }
        }
        println!("(unrecognized input: {token:?})");
    }

    fn render(frame: &Frame) -> String {
        use super::Element::*;
        let mut out = String::new();
        for element in &frame.elements {
            match element {
                Text(body) => {
                    out.push_str(body);
                    out.push('\n');
                }
                Caption(body) => {
                    out.push_str(body);
                    out.push('\n');
                }
                Fixation => out.push_str("        x\n"),
                Countdown(n) => out.push_str(&format!("        {n}\n")),
                Slider { prompt, .. } => {
                    out.push_str(&format!("{prompt} [enter a number 0-100]\n"));
                }
                Button { label, .. } => out.push_str(&format!("  [{label}]\n")),
            }
        }
        out
    }
}

impl Surface for ConsoleSurface {
    fn draw(&mut self, frame: &Frame) {
        if *frame != self.current_frame {
            self.current_frame = frame.clone();
            let rendered = Self::render(frame);
            if rendered != self.last_render {
                if !rendered.is_empty() {
                    print!("\n{rendered}");
                }
                self.last_render = rendered;
            }
        }
        thread::sleep(self.frame_interval);
    }

    fn poll_keys(&mut self, filter: &[Key]) -> Vec<Key> {
        self.pump();
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
        self.pump();
        if self.pending_button == Some(id) {
            self.pending_button = None;
            true
        } else {
            false
        }
    }

    fn slider_value(&mut self, id: SliderId) -> Option<f64> {
        self.pump();
        self.sliders.get(&id).copied()
    }

    fn reset_slider(&mut self, id: SliderId) {
        self.sliders.remove(&id);
    }
}
