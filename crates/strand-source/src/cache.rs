use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::transport::{Request, Transport};

/// Response cache for idempotent GETs, keyed by full request signature.
///
/// A cache belongs to one logical session. It is created by the caller and
/// handed to a [`SessionTransport`]; nothing in Strand keeps a global one.
/// Entries are never evicted: only requests marked cacheable (about pages,
/// wiki pages, moderator lists) land here, and their number is bounded by
/// what one session visits. Long-lived callers drop the cache or call
/// [`clear`](Self::clear) between sessions.
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<String, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, request: &Request) -> Option<Value> {
        let found = self
            .entries
            .lock()
            .expect("lock poisoned")
            .get(&request.signature())
            .cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, request: &Request, value: Value) {
        self.entries
            .lock()
            .expect("lock poisoned")
            .insert(request.signature(), value);
    }

    /// Drop every entry and return how many there were. Stats are kept.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("lock poisoned");
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "request cache cleared");
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Transport wrapper adding the session cache and an optional timeout.
pub struct SessionTransport<T> {
    inner: T,
    cache: Arc<RequestCache>,
    timeout: Option<Duration>,
}

impl<T: Transport> SessionTransport<T> {
    pub fn new(inner: T, cache: Arc<RequestCache>) -> Self {
        Self {
            inner,
            cache,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    async fn fetch_uncached(&self, request: &Request) -> SourceResult<Value> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.fetch(request))
                .await
                .map_err(|_| SourceError::Timeout(limit))?,
            None => self.inner.fetch(request).await,
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for SessionTransport<T> {
    async fn fetch(&self, request: &Request) -> SourceResult<Value> {
        if request.cache {
            if let Some(value) = self.cache.get(request) {
                debug!(request = %request.signature(), "cache hit");
                return Ok(value);
            }
        }
        let value = self.fetch_uncached(request).await?;
        if request.cache {
            self.cache.put(request, value.clone());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counting {
        calls: AtomicU64,
        delay: Option<Duration>,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl Transport for Counting {
        async fn fetch(&self, request: &Request) -> SourceResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(json!({ "path": request.path }))
        }
    }

    #[tokio::test]
    async fn cached_requests_hit_inner_once() {
        let cache = Arc::new(RequestCache::new());
        let transport = SessionTransport::new(Counting::new(), cache.clone());
        let req = Request::new("/r/rust/about").cached();

        let a = transport.fetch(&req).await.unwrap();
        let b = transport.fetch(&req).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[tokio::test]
    async fn clear_drops_entries() {
        let cache = Arc::new(RequestCache::new());
        let transport = SessionTransport::new(Counting::new(), cache.clone());
        let req = Request::new("/r/rust/about").cached();
        transport.fetch(&req).await.unwrap();
        transport.fetch(&Request::new("/r/go/about").cached()).await.unwrap();

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        transport.fetch(&req).await.unwrap();
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats(), (0, 3));
    }

    #[tokio::test]
    async fn uncached_requests_always_fetch() {
        let transport = SessionTransport::new(Counting::new(), Arc::new(RequestCache::new()));
        let req = Request::new("/r/rust");
        transport.fetch(&req).await.unwrap();
        transport.fetch(&req).await.unwrap();
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 2);
        assert!(transport.cache().is_empty());
    }

    #[tokio::test]
    async fn query_is_part_of_cache_key() {
        let transport = SessionTransport::new(Counting::new(), Arc::new(RequestCache::new()));
        transport
            .fetch(&Request::new("/w").query("page", "a").cached())
            .await
            .unwrap();
        transport
            .fetch(&Request::new("/w").query("page", "b").cached())
            .await
            .unwrap();
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.cache().len(), 2);
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let inner = Counting {
            calls: AtomicU64::new(0),
            delay: Some(Duration::from_millis(500)),
        };
        let transport = SessionTransport::new(inner, Arc::new(RequestCache::new()))
            .with_timeout(Duration::from_millis(20));
        let err = transport.fetch(&Request::new("/slow")).await.unwrap_err();
        assert!(matches!(err, SourceError::Timeout(d) if d == Duration::from_millis(20)));
        assert!(!err.is_network());
    }
}
