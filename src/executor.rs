//! Invocation of a method against a resolved target.
//!
//! The executor never fails: every outcome, including an unknown method or
//! malformed arguments, is rendered into an [`ExecutionResult`].

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::args;
use crate::domain::result::{CLEARED_MESSAGE, ExecutionResult, SUCCESS_MESSAGE};
use crate::domain::row::Row;
use crate::error::{RemoteError, RowError};
use crate::http::{HttpClient, RestRequest};
use crate::remote::registry::MethodRegistry;
use crate::remote::{ListHandle, TargetRef, send};

/// Page size of the item listing used to clear a list.
pub const CLEAR_PAGE_SIZE: usize = 5000;

/// Item deletes in flight at once while clearing a list.
const CLEAR_PARALLELISM: usize = 8;

/// Per-item outcome reported in the output of a clear.
#[derive(Debug, Clone, Serialize)]
struct ClearedItem {
    id: u64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Runs one row's method call.
#[derive(Clone)]
pub struct RowExecutor<H: HttpClient> {
    http: H,
    registry: Arc<MethodRegistry>,
    access_token: String,
    timeout_ms: u64,
}

impl<H: HttpClient> RowExecutor<H> {
    pub fn new(
        http: H,
        registry: Arc<MethodRegistry>,
        access_token: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            registry,
            access_token: access_token.into(),
            timeout_ms,
        }
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Invoke `method` with `params` on `target` and render the outcome.
    #[tracing::instrument(skip(self, row, target, params), fields(row = row.index, kind = %target.kind()))]
    pub async fn execute(
        &self,
        row: &Row,
        target: &TargetRef,
        method: &str,
        params: &str,
    ) -> ExecutionResult {
        let outcome = match target {
            TargetRef::ClearList(list) => self
                .clear_list(list)
                .await
                .map(|output| (CLEARED_MESSAGE, output)),
            _ => self
                .invoke(target, method, params)
                .await
                .map(|output| (SUCCESS_MESSAGE, output)),
        };

        match outcome {
            Ok((message, output)) => {
                tracing::debug!("Method executed");
                ExecutionResult::succeeded(row, message, Some(output))
            }
            Err(e) => {
                tracing::warn!(error = %e, error_kind = e.kind(), "Method failed");
                ExecutionResult::failed(row, &e)
            }
        }
    }

    /// Dispatch through the registry and return the response body.
    ///
    /// An empty method fetches the target itself.
    pub async fn invoke(
        &self,
        target: &TargetRef,
        method: &str,
        params: &str,
    ) -> Result<String, RowError> {
        let request = if method.is_empty() {
            RestRequest::get(target.uri())
        } else {
            let spec = self
                .registry
                .lookup(target.kind(), method)
                .ok_or_else(|| RowError::Dispatch {
                    kind: target.kind(),
                    method: method.to_string(),
                })?;
            spec.build(target.uri(), method, &args::decode(params))?
        };

        send(
            &self.http,
            "invoke",
            &request,
            &self.access_token,
            self.timeout_ms,
        )
        .await
        .map_err(|source| RowError::Invocation { source })
    }

    /// Delete every item of a list.
    ///
    /// The item listing is followed page by page until the server stops
    /// returning a next link. Item deletes that fail are reported in the
    /// output but do not fail the row; only a failed item listing does.
    pub async fn clear_list(&self, list: &ListHandle) -> Result<String, RowError> {
        let ids = self.list_item_ids(list).await?;

        tracing::info!(items = ids.len(), list = %list.uri, "Clearing list");

        let responses: Vec<ClearedItem> = futures::stream::iter(ids)
            .map(|id| async move {
                let request = RestRequest::delete(list.item(id).uri);
                match send(
                    &self.http,
                    "clear",
                    &request,
                    &self.access_token,
                    self.timeout_ms,
                )
                .await
                {
                    Ok(_) => ClearedItem {
                        id,
                        ok: true,
                        error: None,
                    },
                    Err(e) => ClearedItem {
                        id,
                        ok: false,
                        error: Some(e.payload()),
                    },
                }
            })
            .buffered(CLEAR_PARALLELISM)
            .collect()
            .await;

        let deleted = responses.iter().filter(|item| item.ok).count();
        Ok(serde_json::json!({ "deleted": deleted, "responses": responses }).to_string())
    }

    async fn list_item_ids(&self, list: &ListHandle) -> Result<Vec<u64>, RowError> {
        let mut ids = Vec::new();
        let mut next = Some(list.item_ids_uri(CLEAR_PAGE_SIZE));
        let mut pages = 0;

        while let Some(url) = next.take() {
            let listing = send(
                &self.http,
                "clear",
                &RestRequest::get(url.as_str()),
                &self.access_token,
                self.timeout_ms,
            )
            .await
            .map_err(|source| RowError::Invocation { source })?;

            let page = ItemPage::parse(&listing).map_err(|e| RowError::Invocation {
                source: RemoteError::with_response(
                    format!("unexpected item listing: {}", e),
                    listing.clone(),
                ),
            })?;

            pages += 1;
            ids.extend(page.ids);
            // Stop if the server hands back the page just read
            next = page.next.filter(|link| *link != url);
        }

        tracing::debug!(pages, items = ids.len(), list = %list.uri, "Listed items");
        Ok(ids)
    }
}

/// One page of an item listing in either the plain (`value`,
/// `odata.nextLink`) or verbose (`d.results`, `d.__next`) OData shape.
#[derive(Debug, PartialEq, Eq)]
struct ItemPage {
    ids: Vec<u64>,
    next: Option<String>,
}

impl ItemPage {
    fn parse(listing: &str) -> Result<Self, String> {
        let document: Value = serde_json::from_str(listing).map_err(|e| e.to_string())?;
        let items = document
            .get("value")
            .or_else(|| document.pointer("/d/results"))
            .and_then(Value::as_array)
            .ok_or_else(|| "no item collection".to_string())?;

        let ids = items
            .iter()
            .map(|item| {
                let id = item.get("Id").or_else(|| item.get("ID"));
                id.and_then(Value::as_u64)
                    .or_else(|| id.and_then(Value::as_str).and_then(|s| s.parse().ok()))
                    .ok_or_else(|| format!("item without a numeric id: {}", item))
            })
            .collect::<Result<Vec<u64>, String>>()?;

        let next = ["odata.nextLink", "@odata.nextLink"]
            .iter()
            .find_map(|key| document.get(*key))
            .or_else(|| document.pointer("/d/__next"))
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string);

        Ok(Self { ids, next })
    }
}
