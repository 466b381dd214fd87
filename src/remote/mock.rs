//! In-memory resolver for tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::ObjectResolver;
use super::handle::{FileHandle, FileQuery, ListHandle, ListQuery, SiteHandle};
use crate::error::RemoteError;

/// Resolves only the objects registered with it; everything else is a 404.
///
/// Handles are built exactly as [`RestResolver`](super::RestResolver) builds
/// them, so their URIs line up with scripted [`MockHttpClient`](crate::http::MockHttpClient)
/// responses.
#[derive(Clone, Default)]
pub struct MockResolver {
    known: Arc<Mutex<HashSet<String>>>,
    lookups: Arc<AtomicUsize>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&self, site_url: &str) {
        self.known.lock().insert(format!("site|{}", site_url));
    }

    /// Register a list by title or by id.
    pub fn add_list(&self, site_url: &str, title_or_id: &str) {
        self.known
            .lock()
            .insert(format!("list|{}|{}", site_url, title_or_id));
    }

    pub fn add_file(&self, site_url: &str, file_url: &str) {
        self.known
            .lock()
            .insert(format!("file|{}|{}", site_url, file_url));
    }

    /// Number of lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self, key: String) -> Result<(), RemoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.known.lock().contains(&key) {
            Ok(())
        } else {
            Err(RemoteError::with_response(
                "HTTP 404",
                format!(r#"{{"error":"{} not found"}}"#, key),
            ))
        }
    }
}

#[async_trait]
impl ObjectResolver for MockResolver {
    async fn get_file(&self, query: &FileQuery) -> Result<FileHandle, RemoteError> {
        self.check(format!("file|{}|{}", query.site_url, query.file_url))?;
        Ok(FileHandle::from_query(query))
    }

    async fn get_list(&self, query: &ListQuery) -> Result<ListHandle, RemoteError> {
        let key = query
            .list_id
            .as_deref()
            .or(query.list_name.as_deref())
            .unwrap_or_default();
        self.check(format!("list|{}|{}", query.site_url, key))?;
        Ok(ListHandle::from_query(query))
    }

    async fn get_site(&self, site_url: &str) -> Result<SiteHandle, RemoteError> {
        self.check(format!("site|{}", site_url))?;
        Ok(SiteHandle::new(site_url))
    }
}
