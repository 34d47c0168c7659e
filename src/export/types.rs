//! Export job types and error definitions

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::slack::SlackError;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    Init,
    DirectoryCreated,
    Running,
    Archiving,
    Cleanup,
    Done,
    Aborted,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportPhase::Init => "init",
            ExportPhase::DirectoryCreated => "directory_created",
            ExportPhase::Running => "running",
            ExportPhase::Archiving => "archiving",
            ExportPhase::Cleanup => "cleanup",
            ExportPhase::Done => "done",
            ExportPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed export
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub archive: PathBuf,
    pub members: usize,
    pub conversations: usize,
    pub messages: usize,
    /// False when the working directory could not be removed after archiving
    pub cleaned_up: bool,
}
