//! Trial persistence.
//!
//! One CSV row per trial, calibration rows appended after the main
//! sequence, with a stable column set: the union of all trial fields plus
//! session metadata. Unset fields are present but empty. Creating a sink
//! for a participant whose data file already exists fails loudly — that is
//! the duplicate-run guard, and existing data is never overwritten.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, RigError};
use crate::session::{Stimulus, Trial};

/// Session-level metadata stamped onto every row.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub participant_id: u32,
    pub group: u32,
    pub group_name: &'static str,
    pub counterbalance: u32,
    pub started_at: String,
    pub optimal_name: &'static str,
    pub optimal_pattern: &'static str,
    pub shock_level_high: u8,
}

/// Everything handed to the sink at the end of a session.
pub struct SessionRecord<'a> {
    pub meta: &'a SessionMeta,
    pub main: &'a [Trial],
    pub calibration: &'a [Trial],
}

/// Persistence collaborator. The controller hands it the final record once,
/// whether the session completed or was aborted.
pub trait TrialSink {
    fn save(&mut self, record: &SessionRecord<'_>) -> Result<()>;
}

/// Stable column set; trial fields first, session metadata after.
pub const COLUMNS: &[&str] = &[
    "phase",
    "trialtype",
    "stimulus",
    "context",
    "choice1",
    "choice2",
    "choicetrial",
    "rft_schedule",
    "outcome",
    "choice_response",
    "exp_response",
    "pain_response",
    "blocknum",
    "trialnum",
    "datetime",
    "PID",
    "group",
    "group_name",
    "cb",
    "optimalTENS_name",
    "optimalTENS_pattern",
    "shock_level_high",
];

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn row(trial: &Trial, meta: &SessionMeta) -> Vec<String> {
    vec![
        trial.phase.to_string(),
        trial.trial_type.to_string(),
        match trial.stimulus {
            // Absent stimulus is an empty cell, like every other unset field.
            Stimulus::None => String::new(),
            s => s.to_string(),
        },
        trial.context.to_string(),
        opt(&trial.choice1),
        opt(&trial.choice2),
        trial.is_choice_trial.to_string(),
        opt(&trial.reinforcement_probability),
        opt(&trial.outcome),
        opt(&trial.choice_response),
        opt(&trial.expectancy_response),
        opt(&trial.pain_response),
        trial.block.to_string(),
        opt(&trial.trial_number),
        meta.started_at.clone(),
        meta.participant_id.to_string(),
        meta.group.to_string(),
        meta.group_name.to_string(),
        meta.counterbalance.to_string(),
        meta.optimal_name.to_string(),
        meta.optimal_pattern.to_string(),
        meta.shock_level_high.to_string(),
    ]
}

/// CSV file sink under the data directory, one file per participant.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    /// Reserve the output file for a participant. Fails with
    /// [`RigError::DuplicateParticipant`] if data already exists — checked
    /// here, before any hardware or display resource is acquired.
    pub fn create(data_dir: &Path, participant_id: u32) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(format!("{participant_id}_responses.csv"));
        if path.exists() {
            return Err(RigError::DuplicateParticipant {
                pid: participant_id,
                path,
            });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrialSink for CsvSink {
    fn save(&mut self, record: &SessionRecord<'_>) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(COLUMNS)?;
        for trial in record.main.iter().chain(record.calibration) {
            writer.write_record(row(trial, record.meta))?;
        }
        writer.flush()?;
        tracing::info!(
            target: "painrig::persist",
            path = %self.path.display(),
            rows = record.main.len() + record.calibration.len(),
            "session data written"
        );
        Ok(())
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub meta: Option<SessionMeta>,
    pub rows: Vec<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrialSink for MemorySink {
    fn save(&mut self, record: &SessionRecord<'_>) -> Result<()> {
        self.meta = Some(record.meta.clone());
        self.rows = record
            .main
            .iter()
            .chain(record.calibration)
            .map(|t| row(t, record.meta))
            .collect();
        Ok(())
    }
}
