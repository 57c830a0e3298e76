use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SourceResult;

/// A single GET against the remote API.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Request {
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Opt in to the session request cache. Only idempotent, slow-changing
    /// resources (sidebars, wiki pages) should set this.
    pub cache: bool,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
            cache: false,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    /// Full request signature: path plus key-sorted query string.
    pub fn signature(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// Fetches raw JSON payloads from the remote API.
///
/// Implementations return `Err` on non-2xx responses and network failures.
/// Timeouts surface as [`SourceError::Timeout`].
///
/// [`SourceError::Timeout`]: crate::SourceError::Timeout
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> SourceResult<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, request: &Request) -> SourceResult<Value> {
        (**self).fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_query() {
        let req = Request::new("/api/morechildren")
            .query("sort", "new")
            .query("link_id", "t3_a");
        assert_eq!(req.signature(), "/api/morechildren?link_id=t3_a&sort=new");
    }

    #[test]
    fn signature_without_query_is_path() {
        assert_eq!(Request::new("/r/rust/about").signature(), "/r/rust/about");
    }

    #[test]
    fn cached_flag() {
        assert!(!Request::new("/x").cache);
        assert!(Request::new("/x").cached().cache);
    }
}
