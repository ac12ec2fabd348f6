//! Session engine: deterministic trial planning plus the real-time loops
//! that execute it against a clock, a surface, and an output port.

mod calibration;
mod clock;
mod config;
mod controller;
mod io;
mod plan;
mod pulse;
mod trial;

#[cfg(test)]
mod tests;

pub use calibration::*;
pub use clock::*;
pub use config::*;
pub use controller::*;
pub use io::*;
pub use plan::*;
pub use pulse::*;
pub use trial::*;
