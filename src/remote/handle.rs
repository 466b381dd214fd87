//! Handles to remote objects and the queries that locate them.
//!
//! A handle is just the REST URI of an object plus enough context to derive
//! child handles (a list's items, a file's backing item) without another
//! round trip.

use serde::Serialize;

use crate::domain::script::TargetKind;

/// Quote a value as an OData string literal for use inside a URL path.
///
/// `'` is doubled, then each `/`-separated piece is percent-encoded so that
/// `#`, `?`, `%` and `&` reach the server as part of the literal.
pub fn odata_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    let encoded: Vec<String> = escaped
        .split('/')
        .map(|piece| urlencoding::encode(piece).replace("%27", "'"))
        .collect();
    format!("'{}'", encoded.join("/"))
}

fn api_root(site_url: &str) -> String {
    format!("{}/_api/web", site_url.trim_end_matches('/'))
}

/// Server-relative form of a file URL. Absolute URLs lose their origin.
fn server_relative(file_url: &str) -> &str {
    match file_url.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or("/"),
        None => file_url,
    }
}

/// Locates a file: SiteUrl, ListName, FileUrl columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileQuery {
    pub site_url: String,
    pub list_name: String,
    pub file_url: String,
}

/// Locates a list by id or, failing that, by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub site_url: String,
    pub list_id: Option<String>,
    pub list_name: Option<String>,
}

impl ListQuery {
    pub fn new(site_url: &str, list_id: &str, list_name: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            site_url: site_url.to_string(),
            list_id: non_empty(list_id),
            list_name: non_empty(list_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteHandle {
    pub site_url: String,
    pub uri: String,
}

impl SiteHandle {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.to_string(),
            uri: api_root(site_url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListHandle {
    pub site_url: String,
    pub uri: String,
}

impl ListHandle {
    /// Build the handle a query points at. The id wins over the title.
    pub fn from_query(query: &ListQuery) -> Self {
        let root = api_root(&query.site_url);
        let uri = match (&query.list_id, &query.list_name) {
            (Some(id), _) => format!("{}/lists(guid{})", root, odata_literal(id)),
            (None, Some(name)) => format!("{}/lists/getByTitle({})", root, odata_literal(name)),
            (None, None) => format!("{}/lists/getByTitle('')", root),
        };
        Self {
            site_url: query.site_url.clone(),
            uri,
        }
    }

    /// Handle for an item of this list; no remote call is made.
    pub fn item(&self, id: u64) -> ItemHandle {
        ItemHandle {
            uri: format!("{}/items({})", self.uri, id),
        }
    }

    /// Endpoint listing every item id, capped at the REST page limit.
    pub fn item_ids_uri(&self, top: usize) -> String {
        format!("{}/items?$select=Id&$top={}", self.uri, top)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub site_url: String,
    pub uri: String,
}

impl FileHandle {
    pub fn from_query(query: &FileQuery) -> Self {
        Self {
            site_url: query.site_url.clone(),
            uri: format!(
                "{}/getFileByServerRelativeUrl({})",
                api_root(&query.site_url),
                odata_literal(server_relative(&query.file_url))
            ),
        }
    }

    /// The list item backing this file.
    pub fn list_item(&self) -> ItemHandle {
        ItemHandle {
            uri: format!("{}/ListItemAllFields", self.uri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemHandle {
    pub uri: String,
}

/// A resolved remote object, ready for method invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "target")]
pub enum TargetRef {
    File(FileHandle),
    FileAsItem(ItemHandle),
    ListItem(ItemHandle),
    List(ListHandle),
    Site(SiteHandle),
    /// Delete every item in the list instead of dispatching a method
    ClearList(ListHandle),
}

impl TargetRef {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetRef::File(_) => TargetKind::File,
            TargetRef::FileAsItem(_) => TargetKind::FileAsItem,
            TargetRef::ListItem(_) => TargetKind::ListItem,
            TargetRef::List(_) | TargetRef::ClearList(_) => TargetKind::List,
            TargetRef::Site(_) => TargetKind::Site,
        }
    }

    /// REST URI of the object.
    pub fn uri(&self) -> &str {
        match self {
            TargetRef::File(h) => &h.uri,
            TargetRef::FileAsItem(h) | TargetRef::ListItem(h) => &h.uri,
            TargetRef::List(h) | TargetRef::ClearList(h) => &h.uri,
            TargetRef::Site(h) => &h.uri,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_uri_strips_trailing_slash() {
        assert_eq!(
            SiteHandle::new("https://contoso/sites/a/").uri,
            "https://contoso/sites/a/_api/web"
        );
    }

    #[test]
    fn list_prefers_id_over_title() {
        let by_id = ListHandle::from_query(&ListQuery::new("https://c", "abc-123", "Tasks"));
        assert_eq!(by_id.uri, "https://c/_api/web/lists(guid'abc-123')");

        let by_title = ListHandle::from_query(&ListQuery::new("https://c", "", "Bob's Tasks"));
        assert_eq!(
            by_title.uri,
            "https://c/_api/web/lists/getByTitle('Bob''s%20Tasks')"
        );
        assert_eq!(by_title.item(7).uri, format!("{}/items(7)", by_title.uri));
    }

    #[test]
    fn literal_is_percent_encoded() {
        assert_eq!(odata_literal("fix #12 & more"), "'fix%20%2312%20%26%20more'");
        assert_eq!(odata_literal("100%?"), "'100%25%3F'");
        assert_eq!(odata_literal("/Docs/it's.docx"), "'/Docs/it''s.docx'");
    }

    #[test]
    fn file_url_with_spaces_stays_in_the_path() {
        let file = FileHandle::from_query(&FileQuery {
            site_url: "https://c".to_string(),
            list_name: "Docs".to_string(),
            file_url: "/Docs/Q1 #2.docx".to_string(),
        });
        assert_eq!(
            file.uri,
            "https://c/_api/web/getFileByServerRelativeUrl('/Docs/Q1%20%232.docx')"
        );
    }

    #[test]
    fn file_url_is_made_server_relative() {
        let file = FileHandle::from_query(&FileQuery {
            site_url: "https://c/sites/a".to_string(),
            list_name: "Documents".to_string(),
            file_url: "https://c/sites/a/Documents/x.docx".to_string(),
        });
        assert_eq!(
            file.uri,
            "https://c/sites/a/_api/web/getFileByServerRelativeUrl('/sites/a/Documents/x.docx')"
        );
        assert!(file.list_item().uri.ends_with("/ListItemAllFields"));
    }

    #[test]
    fn clear_list_reports_list_kind() {
        let list = ListHandle::from_query(&ListQuery::new("https://c", "", "Tasks"));
        assert_eq!(TargetRef::ClearList(list).kind(), TargetKind::List);
    }
}
