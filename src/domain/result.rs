//! Per-row results and the run summary that aggregates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::row::Row;
use super::script::ScriptType;
use crate::error::RowError;

pub const SUCCESS_MESSAGE: &str = "Method was executed successfully.";
pub const CLEARED_MESSAGE: &str = "The list has been cleared.";

/// Unique identifier for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        RunId(uuid)
    }
}

impl std::ops::Deref for RunId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Outcome of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub row_index: usize,
    pub source_row: Row,
    pub error: bool,
    pub message: String,
    pub output: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(row: &Row, message: impl Into<String>, output: Option<String>) -> Self {
        Self {
            row_index: row.index,
            source_row: row.clone(),
            error: false,
            message: message.into(),
            output,
        }
    }

    pub fn failed(row: &Row, error: &RowError) -> Self {
        Self {
            row_index: row.index,
            source_row: row.clone(),
            error: true,
            message: error.message(),
            output: error.output(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every row settled
    Completed,
    /// Scheduling stopped early; only settled rows carry results
    Aborted { reason: String },
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted { .. } => "aborted",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Everything a finished run produced, in row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub title: String,
    pub script_type: ScriptType,
    pub status: RunStatus,
    pub results: Vec<ExecutionResult>,
    /// Rows that settled
    pub completed: usize,
    /// Data rows in the document
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| !r.error).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error).count()
    }

    /// True when the run completed and no row failed.
    pub fn is_clean(&self) -> bool {
        self.status.is_completed() && self.failed() == 0
    }
}

/// Progress after a row settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Body text, e.g. "Processing 3 of 10."
    pub fn message(&self) -> String {
        format!("Processing {} of {}.", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::script::TargetKind;

    #[test]
    fn failed_result_carries_error_rendering() {
        let row = Row::new(3, vec!["https://s".to_string()]);
        let result = ExecutionResult::failed(
            &row,
            &RowError::Dispatch {
                kind: TargetKind::Site,
                method: "nope".to_string(),
            },
        );
        assert!(result.error);
        assert_eq!(result.row_index, 3);
        assert_eq!(result.output.as_deref(), Some("Unable to process request."));
    }

    #[test]
    fn progress_message_wording() {
        let progress = Progress {
            completed: 2,
            total: 7,
        };
        assert_eq!(progress.message(), "Processing 2 of 7.");
    }
}
