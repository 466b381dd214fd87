//! Access to the remote object graph.
//!
//! - [`handle`]: REST handles for files, items, lists and sites
//! - [`registry`]: methods each object kind supports
//! - [`rest`]: production resolver over an [`HttpClient`]
//! - [`mock`]: in-memory resolver for tests
//!
//! [`resolve_target`] turns one CSV row into a [`TargetRef`] according to the
//! script type's column layout.

pub mod handle;
pub mod mock;
pub mod registry;
pub mod rest;

use async_trait::async_trait;

pub use handle::{FileHandle, FileQuery, ItemHandle, ListHandle, ListQuery, SiteHandle, TargetRef};
pub use mock::MockResolver;
pub use registry::{ArgShape, MethodRegistry, MethodSpec, Verb};
pub use rest::RestResolver;

use crate::domain::row::Row;
use crate::domain::script::ScriptType;
use crate::error::{RemoteError, RowError};
use crate::http::{HttpClient, RestRequest};

/// Method name that empties a list instead of dispatching through the registry.
pub const CLEAR_METHOD: &str = "clear";

/// Looks up remote objects.
///
/// Child objects (a list's items, a file's backing item) are derived from the
/// returned handles and need no lookup of their own.
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    async fn get_file(&self, query: &FileQuery) -> Result<FileHandle, RemoteError>;

    async fn get_list(&self, query: &ListQuery) -> Result<ListHandle, RemoteError>;

    async fn get_site(&self, site_url: &str) -> Result<SiteHandle, RemoteError>;
}

fn file_query(row: &Row, script_type: ScriptType) -> FileQuery {
    let layout = script_type.layout();
    FileQuery {
        site_url: row.field(layout.site_url).to_string(),
        list_name: row.column(layout.list_name).to_string(),
        file_url: row.column(layout.file_url).to_string(),
    }
}

fn list_query(row: &Row, script_type: ScriptType) -> ListQuery {
    let layout = script_type.layout();
    ListQuery::new(
        row.field(layout.site_url),
        row.column(layout.list_id),
        row.column(layout.list_name),
    )
}

/// Resolve the object a row targets.
///
/// A List row whose effective method is [`CLEAR_METHOD`] is not looked up;
/// the list handle is built from the row directly.
#[tracing::instrument(skip(resolver, row), fields(row = row.index, script_type = %script_type))]
pub async fn resolve_target<R>(
    resolver: &R,
    script_type: ScriptType,
    row: &Row,
    method: &str,
) -> Result<TargetRef, RowError>
where
    R: ObjectResolver + ?Sized,
{
    let kind = script_type.target_kind();
    let failed = |source: RemoteError| {
        tracing::debug!(error = %source, "Target lookup failed");
        RowError::Resolution { kind, source }
    };

    let target = match script_type {
        ScriptType::File => TargetRef::File(
            resolver
                .get_file(&file_query(row, script_type))
                .await
                .map_err(failed)?,
        ),
        ScriptType::FileItem => {
            let file = resolver
                .get_file(&file_query(row, script_type))
                .await
                .map_err(failed)?;
            TargetRef::FileAsItem(file.list_item())
        }
        ScriptType::Item => {
            let raw_id = row.column(script_type.layout().item_id);
            let item_id = raw_id.trim().parse::<u64>().map_err(|_| {
                failed(RemoteError::new(format!("item id '{}' is not a number", raw_id)))
            })?;
            let list = resolver
                .get_list(&list_query(row, script_type))
                .await
                .map_err(failed)?;
            TargetRef::ListItem(list.item(item_id))
        }
        ScriptType::List if method == CLEAR_METHOD => {
            TargetRef::ClearList(ListHandle::from_query(&list_query(row, script_type)))
        }
        ScriptType::List => TargetRef::List(
            resolver
                .get_list(&list_query(row, script_type))
                .await
                .map_err(failed)?,
        ),
        ScriptType::Site => TargetRef::Site(
            resolver
                .get_site(row.field(script_type.layout().site_url))
                .await
                .map_err(failed)?,
        ),
    };

    Ok(target)
}

/// Send a request and return the body of a 2xx response.
///
/// Transport errors become a [`RemoteError`] without a response; non-2xx
/// statuses carry the response body. `kind` labels the call in metrics
/// (`lookup`, `invoke`, `clear`).
pub(crate) async fn send<H: HttpClient>(
    http: &H,
    kind: &'static str,
    request: &RestRequest,
    access_token: &str,
    timeout_ms: u64,
) -> Result<String, RemoteError> {
    let response = http
        .execute(request, access_token, timeout_ms)
        .await
        .map_err(RemoteError::from)?;

    metrics::counter!(
        "volley_remote_calls_total",
        "kind" => kind,
        "outcome" => if response.is_success() { "success" } else { "failure" },
    )
    .increment(1);

    if response.is_success() {
        Ok(response.body)
    } else {
        tracing::debug!(status = response.status, url = %request.url, "Remote call returned an error status");
        Err(RemoteError::with_response(
            format!("HTTP {}", response.status),
            response.body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        Row::new(0, fields.iter().map(|f| f.to_string()).collect())
    }

    #[tokio::test]
    async fn item_row_resolves_through_its_list() {
        let resolver = MockResolver::new();
        resolver.add_list("https://c", "Tasks");

        let target = resolve_target(
            &resolver,
            ScriptType::Item,
            &row(&["https://c", "Tasks", "12", "update", "[]"]),
            "update",
        )
        .await
        .unwrap();

        assert_eq!(
            target,
            TargetRef::ListItem(ItemHandle {
                uri: "https://c/_api/web/lists/getByTitle('Tasks')/items(12)".to_string()
            })
        );
        assert_eq!(resolver.lookup_count(), 1);
    }

    #[tokio::test]
    async fn non_numeric_item_id_fails_before_lookup() {
        let resolver = MockResolver::new();
        resolver.add_list("https://c", "Tasks");

        let err = resolve_target(
            &resolver,
            ScriptType::Item,
            &row(&["https://c", "Tasks", "12#x", "update", "[]"]),
            "update",
        )
        .await
        .unwrap_err();

        assert_eq!(err.message(), "Error getting the list.");
        assert_eq!(err.output().as_deref(), Some("item id '12#x' is not a number"));
        assert_eq!(resolver.lookup_count(), 0);
    }

    #[tokio::test]
    async fn clear_skips_lookup() {
        let resolver = MockResolver::new();

        let target = resolve_target(
            &resolver,
            ScriptType::List,
            &row(&["https://c", "", "Tasks", "clear", ""]),
            "clear",
        )
        .await
        .unwrap();

        assert!(matches!(target, TargetRef::ClearList(_)));
        assert_eq!(resolver.lookup_count(), 0);
    }

    #[tokio::test]
    async fn missing_site_is_a_resolution_error() {
        let resolver = MockResolver::new();

        let err = resolve_target(&resolver, ScriptType::Site, &row(&["https://gone"]), "")
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Error getting the site.");
    }

    #[tokio::test]
    async fn file_item_row_targets_backing_item() {
        let resolver = MockResolver::new();
        resolver.add_file("https://c", "/Docs/a.docx");

        let target = resolve_target(
            &resolver,
            ScriptType::FileItem,
            &row(&["https://c", "Docs", "/Docs/a.docx", "update", "{}"]),
            "update",
        )
        .await
        .unwrap();

        assert!(matches!(target, TargetRef::FileAsItem(_)));
        assert!(target.uri().ends_with("/ListItemAllFields"));
    }
}
