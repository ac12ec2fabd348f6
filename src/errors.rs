//! Error taxonomy for the session engine.
//!
//! Input-validation errors (`InvalidParticipantId`, `DuplicateParticipant`)
//! are recovered locally by reprompting at the CLI and never escape to a
//! crash. A user abort is not an error at all; it is a clean outcome carried
//! by [`crate::session::RunOutcome::Aborted`]. An absent output port is also
//! not an error: it downgrades to [`crate::port::NullPort`].

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum RigError {
    /// Participant ID was empty or not a non-negative integer. Recoverable
    /// by reprompting; must be raised before any port or display resource
    /// is acquired.
    #[error("participant ID must be a non-negative integer, got {0:?}")]
    InvalidParticipantId(String),

    /// Data for this participant already exists. Fatal to the run but
    /// recoverable by choosing a new ID; existing data is never overwritten.
    #[error("data for participant {pid} already exists at {path}; choose a different participant ID")]
    DuplicateParticipant { pid: u32, path: PathBuf },

    /// Underlying I/O failure (data directory, config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure while persisting trial rows.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed session configuration file.
    #[error("config error: {0}")]
    Config(String),

    /// Output port device could not be opened.
    #[error("output port error: {0}")]
    Port(String),
}

pub type Result<T> = std::result::Result<T, RigError>;
