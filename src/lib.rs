#![deny(unreachable_pub)]

// Core modules
pub mod consts;
mod errors;
pub mod logging;
pub mod text;

// Hardware and display seams
pub mod port;
pub mod ui;

// Session engine
pub mod persist;
pub mod session;

// Re-exports
pub use errors::{Result, RigError};
pub use persist::{CsvSink, MemorySink, SessionMeta, SessionRecord, TrialSink};
pub use port::{HardwarePort, NullPort, OutputPort, RecordingPort};
pub use session::{
    DesignVariant, ExperimentController, RunOutcome, SessionConfig, SessionIo, SystemClock,
    TimingConfig, TrialPlanGenerator,
};
