//! Resolver that checks each object exists with a GET against its REST URI.

use async_trait::async_trait;

use super::handle::{FileHandle, FileQuery, ListHandle, ListQuery, SiteHandle};
use super::{ObjectResolver, send};
use crate::error::RemoteError;
use crate::http::{HttpClient, RestRequest};

#[derive(Clone)]
pub struct RestResolver<H: HttpClient> {
    http: H,
    access_token: String,
    timeout_ms: u64,
}

impl<H: HttpClient> RestResolver<H> {
    pub fn new(http: H, access_token: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            timeout_ms,
        }
    }

    async fn fetch(&self, uri: &str) -> Result<(), RemoteError> {
        send(
            &self.http,
            "lookup",
            &RestRequest::get(uri),
            &self.access_token,
            self.timeout_ms,
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl<H: HttpClient + 'static> ObjectResolver for RestResolver<H> {
    async fn get_file(&self, query: &FileQuery) -> Result<FileHandle, RemoteError> {
        let handle = FileHandle::from_query(query);
        self.fetch(&handle.uri).await?;
        Ok(handle)
    }

    async fn get_list(&self, query: &ListQuery) -> Result<ListHandle, RemoteError> {
        let handle = ListHandle::from_query(query);
        self.fetch(&handle.uri).await?;
        Ok(handle)
    }

    async fn get_site(&self, site_url: &str) -> Result<SiteHandle, RemoteError> {
        let handle = SiteHandle::new(site_url);
        self.fetch(&handle.uri).await?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpClient};

    #[tokio::test]
    async fn non_success_status_carries_the_body() {
        let http = MockHttpClient::new();
        http.add_response(
            "GET https://c/_api/web/lists/getByTitle('Nope')",
            Ok(HttpResponse {
                status: 404,
                body: r#"{"error":"List does not exist"}"#.to_string(),
            }),
        );

        let resolver = RestResolver::new(http.clone(), "tok", 1000);
        let err = resolver
            .get_list(&ListQuery::new("https://c", "", "Nope"))
            .await
            .unwrap_err();

        assert_eq!(err.message, "HTTP 404");
        assert_eq!(err.payload(), r#"{"error":"List does not exist"}"#);
        assert_eq!(http.get_calls()[0].access_token, "tok");
    }

    #[tokio::test]
    async fn site_lookup_returns_handle() {
        let http = MockHttpClient::new();
        http.add_response("GET https://c/_api/web", Ok(HttpResponse::ok("{}")));

        let resolver = RestResolver::new(http, "", 1000);
        let site = resolver.get_site("https://c").await.unwrap();
        assert_eq!(site.uri, "https://c/_api/web");
    }

    #[tokio::test]
    async fn transport_error_has_no_response() {
        let resolver = RestResolver::new(MockHttpClient::new(), "", 1000);
        let err = resolver.get_site("https://unreachable").await.unwrap_err();
        assert!(err.response.is_none());
    }
}
