//! Batch orchestration: run one script over every row of a CSV document.
//!
//! Rows are processed by a bounded pool of tokio tasks. Each task resolves
//! its row's target and executes the effective method; the orchestrator loop
//! alone stores results (by row index) and reports progress, so results come
//! back in row order and progress is monotonic whatever the completion order.

pub mod progress;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use progress::{NoProgress, ProgressSink};

use crate::domain::result::{ExecutionResult, Progress, RunId, RunStatus, RunSummary};
use crate::domain::row::Row;
use crate::domain::script::ScriptConfig;
use crate::error::{Result, RowError, VolleyError};
use crate::executor::RowExecutor;
use crate::http::HttpClient;
use crate::parser::CsvDocument;
use crate::remote::registry::MethodRegistry;
use crate::remote::{ObjectResolver, resolve_target};

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Rows processed at once. 1 reproduces strictly sequential processing.
    pub concurrency: usize,

    /// Timeout for each remote call in milliseconds
    pub timeout_ms: u64,

    /// Upper bound on a whole row (lookup plus invocation) in milliseconds.
    /// None leaves rows unbounded apart from the per-call timeout.
    pub row_timeout_ms: Option<u64>,

    /// Bearer token sent with every remote call; empty sends none
    #[serde(skip_serializing)]
    pub access_token: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout_ms: 600000, // 10 minutes
            row_timeout_ms: None,
            access_token: String::new(),
        }
    }
}

/// Runs scripts against CSV documents.
pub struct BatchRunner<R: ObjectResolver, H: HttpClient> {
    resolver: Arc<R>,
    executor: RowExecutor<H>,
    config: RunnerConfig,
}

impl<R, H> BatchRunner<R, H>
where
    R: ObjectResolver + 'static,
    H: HttpClient + 'static,
{
    pub fn new(resolver: R, http: H, registry: MethodRegistry, config: RunnerConfig) -> Self {
        let executor = RowExecutor::new(
            http,
            Arc::new(registry),
            config.access_token.clone(),
            config.timeout_ms,
        );
        Self {
            resolver: Arc::new(resolver),
            executor,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &MethodRegistry {
        self.executor.registry()
    }

    /// Load the CSV at `csv` and run `script` over it.
    ///
    /// `None` means no CSV is attached to the script, which aborts the run
    /// like an unreadable file does.
    pub async fn run_csv(
        &self,
        script: &ScriptConfig,
        csv: Option<&Path>,
        progress: &impl ProgressSink,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let path = csv.ok_or(VolleyError::CsvMissing)?;
        let document = CsvDocument::load(path).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to load CSV");
        })?;
        self.run(script, &document, progress, cancel).await
    }

    /// Run `script` over every data row of `document`.
    ///
    /// Row failures never abort the run. Cancelling `cancel` stops scheduling
    /// new rows; rows already running finish and the summary is
    /// [`RunStatus::Aborted`] with only the settled rows. A cancel that leaves
    /// no row unsettled still completes the run.
    #[tracing::instrument(skip_all, fields(title = %script.title, script_type = %script.script_type))]
    pub async fn run(
        &self,
        script: &ScriptConfig,
        document: &CsvDocument,
        progress: &impl ProgressSink,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let rows = document.rows();
        let total = rows.len();

        tracing::info!(
            run_id = %run_id,
            total,
            concurrency = self.config.concurrency,
            "Starting run"
        );

        let script = Arc::new(script.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks: JoinSet<ExecutionResult> = JoinSet::new();
        let mut task_rows: HashMap<tokio::task::Id, Row> = HashMap::new();
        let mut slots: Vec<Option<ExecutionResult>> = vec![None; total];
        let mut completed = 0;
        let mut cancelled = false;

        let mut pending = rows.into_iter();
        let mut next = pending.next();

        loop {
            if next.is_none() && tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    next = None;
                    tracing::info!(in_flight = tasks.len(), "Run cancelled, draining in-flight rows");
                }

                permit = semaphore.clone().acquire_owned(), if next.is_some() => {
                    let permit = permit.map_err(|e| anyhow::anyhow!("row semaphore closed: {}", e))?;
                    let Some(row) = next.take() else { continue };
                    next = pending.next();

                    let resolver = self.resolver.clone();
                    let executor = self.executor.clone();
                    let script = script.clone();
                    let row_timeout_ms = self.config.row_timeout_ms;
                    let task_row = row.clone();

                    let handle = tasks.spawn(async move {
                        // Permit is held for the duration of this task
                        let _permit = permit;
                        process_row(resolver.as_ref(), &executor, &script, &task_row, row_timeout_ms).await
                    });
                    task_rows.insert(handle.id(), row);
                }

                Some(joined) = tasks.join_next_with_id() => {
                    let result = match joined {
                        Ok((id, result)) => {
                            task_rows.remove(&id);
                            result
                        }
                        Err(join_error) => {
                            let Some(row) = task_rows.remove(&join_error.id()) else {
                                tracing::error!(error = %join_error, "Unknown row task terminated");
                                continue;
                            };
                            tracing::error!(row = row.index, error = %join_error, "Row task terminated");
                            ExecutionResult::failed(&row, &RowError::TaskTerminated)
                        }
                    };

                    metrics::counter!(
                        "volley_rows_total",
                        "outcome" => if result.error { "failed" } else { "succeeded" },
                    )
                    .increment(1);

                    if let Some(slot) = slots.get_mut(result.row_index) {
                        *slot = Some(result);
                        completed += 1;
                        progress.on_progress(Progress { completed, total });
                    }
                }

                else => break,
            }
        }

        let results: Vec<ExecutionResult> = slots.into_iter().flatten().collect();
        let status = if cancelled && completed < total {
            RunStatus::Aborted {
                reason: "cancelled".to_string(),
            }
        } else {
            RunStatus::Completed
        };

        let summary = RunSummary {
            run_id,
            title: script.title.clone(),
            script_type: script.script_type,
            status,
            completed,
            total,
            results,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            run_id = %run_id,
            status = summary.status.as_str(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Run finished"
        );

        Ok(summary)
    }
}

/// Resolve and execute one row. Never fails; every outcome is a result.
async fn process_row<R, H>(
    resolver: &R,
    executor: &RowExecutor<H>,
    script: &ScriptConfig,
    row: &Row,
    row_timeout_ms: Option<u64>,
) -> ExecutionResult
where
    R: ObjectResolver + ?Sized,
    H: HttpClient,
{
    let layout = script.script_type.layout();
    let method = row.effective(layout.method, &script.method);
    let params = row.effective(layout.parameters, &script.parameters);

    let work = async {
        match resolve_target(resolver, script.script_type, row, method).await {
            Ok(target) => executor.execute(row, &target, method, params).await,
            Err(e) => {
                tracing::warn!(row = row.index, error = %e, "Could not resolve row target");
                ExecutionResult::failed(row, &e)
            }
        }
    };

    match row_timeout_ms {
        Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), work)
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(row = row.index, after_ms, "Row timed out");
                ExecutionResult::failed(row, &RowError::TimedOut { after_ms })
            }),
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::script::ScriptType;
    use crate::http::{HttpResponse, MockHttpClient};
    use crate::remote::MockResolver;

    fn runner(
        resolver: MockResolver,
        http: &MockHttpClient,
        config: RunnerConfig,
    ) -> BatchRunner<MockResolver, MockHttpClient> {
        BatchRunner::new(resolver, http.clone(), MethodRegistry::standard(), config)
    }

    #[test]
    fn config_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.timeout_ms, 600000);
        assert!(config.row_timeout_ms.is_none());
    }

    #[test]
    fn config_deserializes_partially() {
        let config: RunnerConfig = serde_json::from_str(r#"{"concurrency": 4}"#).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_ms, 600000);
    }

    #[test_log::test(tokio::test)]
    async fn empty_document_completes_with_no_results() {
        let http = MockHttpClient::new();
        let summary = runner(MockResolver::new(), &http, RunnerConfig::default())
            .run(
                &ScriptConfig::new("Empty", ScriptType::Site),
                &CsvDocument::from_text("Site Url,Method,Parameters\n"),
                &NoProgress,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(summary.status.is_completed());
        assert!(summary.results.is_empty());
        assert_eq!(summary.total, 0);
    }

    #[test_log::test(tokio::test)]
    async fn missing_csv_aborts_before_any_row() {
        let http = MockHttpClient::new();
        let err = runner(MockResolver::new(), &http, RunnerConfig::default())
            .run_csv(
                &ScriptConfig::new("None", ScriptType::Site),
                None,
                &NoProgress,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "There is no csv file associated with this item. Please upload a csv file first."
        );
        assert_eq!(http.call_count(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn row_timeout_settles_the_row() {
        let http = MockHttpClient::new();
        let resolver = MockResolver::new();
        resolver.add_site("https://slow");
        let _trigger = http.add_response_with_trigger(
            "GET https://slow/_api/web",
            Ok(HttpResponse::ok("{}")),
        );

        let config = RunnerConfig {
            row_timeout_ms: Some(20),
            ..Default::default()
        };
        let summary = runner(resolver, &http, config)
            .run(
                &ScriptConfig::new("Slow", ScriptType::Site),
                &CsvDocument::from_text("Site Url,Method,Parameters\nhttps://slow,,\n"),
                &NoProgress,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let result = &summary.results[0];
        assert!(result.error);
        assert_eq!(result.message, "Error executing the method.");
        assert_eq!(result.output.as_deref(), Some("Row timed out after 20 ms."));
    }
}
