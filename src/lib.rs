//! CSV-driven batch script executor for a remote REST object graph.
//!
//! A script names a kind of remote object (file, list item, list, site), a
//! default method and default JSON parameters. Every data row of a CSV
//! document locates one object; the row's method (or the default) is invoked
//! on it and the outcome is collected into a [`RunSummary`], in row order,
//! while progress is reported after each row.
//!
//! Rows are processed by a bounded pool of tokio tasks; a failing row never
//! stops the batch.

pub mod args;
pub mod domain;
pub mod error;
pub mod executor;
pub mod http;
pub mod parser;
pub mod remote;
pub mod report;
pub mod runner;

// Re-export commonly used types
pub use domain::result::{ExecutionResult, Progress, RunId, RunStatus, RunSummary};
pub use domain::row::Row;
pub use domain::script::{ScriptConfig, ScriptType, TargetKind};
pub use error::{RemoteError, Result, RowError, VolleyError};
pub use executor::RowExecutor;
pub use http::{HttpClient, HttpResponse, MockHttpClient, ReqwestHttpClient, RestRequest};
pub use parser::{CsvDocument, parse_line};
pub use remote::{MethodRegistry, MockResolver, ObjectResolver, RestResolver, TargetRef};
pub use runner::{BatchRunner, NoProgress, ProgressSink, RunnerConfig};
