//! Error types for the batch script executor.
//!
//! Two layers exist. [`VolleyError`] covers failures that stop a whole run
//! before any row is processed (missing or unreadable CSV, an invalid script
//! definition). [`RowError`] covers everything that can go wrong for a single
//! row; those are never propagated, they are rendered into a failed
//! [`ExecutionResult`](crate::domain::result::ExecutionResult) instead.

use thiserror::Error;

use crate::domain::script::TargetKind;

/// Result type alias using the volley error type.
pub type Result<T> = std::result::Result<T, VolleyError>;

/// Errors that abort a run as a whole.
#[derive(Error, Debug)]
pub enum VolleyError {
    /// No CSV was supplied for the script
    #[error("There is no csv file associated with this item. Please upload a csv file first.")]
    CsvMissing,

    /// The CSV exists but could not be read
    #[error("There was an error loading the csv file. ({0})")]
    CsvLoad(String),

    /// Validation error (e.g., default parameters that are not JSON)
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while writing exports or templates
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Strict argument decoding failure.
///
/// The batch path never surfaces this; see [`crate::args::decode`].
#[derive(Error, Debug)]
#[error("parameters are not valid JSON: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Failure payload returned by the remote object graph.
///
/// Mirrors the shape of a REST error: a human readable message plus the raw
/// response body when the server produced one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub response: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: None,
        }
    }

    pub fn with_response(message: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: Some(response.into()),
        }
    }

    /// The response body if present, else the error text.
    pub fn payload(&self) -> String {
        self.response
            .clone()
            .unwrap_or_else(|| self.message.clone())
    }
}

impl From<VolleyError> for RemoteError {
    fn from(e: VolleyError) -> Self {
        RemoteError::new(e.to_string())
    }
}

/// Why a single row failed.
///
/// Each variant maps onto the fixed message/output pair the operator sees in
/// the results table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The target object could not be looked up
    #[error("failed to resolve {kind}: {}", source.message)]
    Resolution {
        kind: TargetKind,
        #[source]
        source: RemoteError,
    },

    /// The method is not registered for the resolved target
    #[error("method '{method}' does not exist for {kind}")]
    Dispatch { kind: TargetKind, method: String },

    /// The remote call itself failed
    #[error("remote invocation failed: {}", source.message)]
    Invocation {
        #[source]
        source: RemoteError,
    },

    /// The decoded arguments do not fit the method's shape
    #[error("arguments do not fit method '{method}': {reason}")]
    BadArguments { method: String, reason: String },

    /// The row exceeded the configured per-row timeout
    #[error("row timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    /// The worker task panicked or was aborted
    #[error("row task terminated unexpectedly")]
    TaskTerminated,
}

impl RowError {
    /// Operator-facing message for the results table.
    pub fn message(&self) -> String {
        match self {
            RowError::Resolution { kind, .. } => match kind {
                TargetKind::File | TargetKind::FileAsItem => "Error getting the file.",
                TargetKind::ListItem | TargetKind::List => "Error getting the list.",
                TargetKind::Site => "Error getting the site.",
            }
            .to_string(),
            RowError::Dispatch { .. } => {
                "Error: The method does not exist for this object type.".to_string()
            }
            RowError::Invocation { .. }
            | RowError::BadArguments { .. }
            | RowError::TimedOut { .. }
            | RowError::TaskTerminated => "Error executing the method.".to_string(),
        }
    }

    /// Operator-facing output column for the results table.
    pub fn output(&self) -> Option<String> {
        match self {
            RowError::Resolution { source, .. } | RowError::Invocation { source } => {
                Some(source.payload())
            }
            RowError::Dispatch { .. } => Some("Unable to process request.".to_string()),
            RowError::BadArguments { .. } => Some(
                "The parameters are not in the correct format for this method.".to_string(),
            ),
            RowError::TimedOut { after_ms } => Some(format!("Row timed out after {after_ms} ms.")),
            RowError::TaskTerminated => Some("Row task terminated unexpectedly.".to_string()),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RowError::Resolution { .. } => "resolution",
            RowError::Dispatch { .. } => "dispatch",
            RowError::Invocation { .. } => "invocation",
            RowError::BadArguments { .. } => "bad_arguments",
            RowError::TimedOut { .. } => "timed_out",
            RowError::TaskTerminated => "task_terminated",
        }
    }
}
