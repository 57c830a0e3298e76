use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use strand_router::paths::split_url;
use strand_router::{Identity, PathRouter, Route, Router};
use strand_source::{classify, RawListing, Request, SourceError, Transport};
use strand_store::{ContentStore, InMemoryContentStore};
use strand_types::{LinkToken, NodeResult};

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::format::{Formatter, PlainFormatter};
use crate::materialize::Materializer;
use crate::node::Node;
use crate::validate::{Finding, Validator};

/// Subreddits that aggregate others and have no sidebar of their own.
const AGGREGATES: &[&str] = &["popular", "all"];

/// Result of a page load: a completed store and the token the page is about.
pub struct Graph {
    pub store: InMemoryContentStore<Node>,
    pub pivot: LinkToken,
    /// How the requested path was routed, when it could be.
    pub route: Option<Route>,
    pub(crate) validator: Option<Arc<Validator>>,
}

impl Graph {
    pub fn pivot_node(&self) -> Option<NodeResult<Node>> {
        self.store.get(&self.pivot)
    }

    /// Tokens referenced from the graph, parents included, that have no
    /// filled entry. Empty for every completed pass.
    pub fn dangling(&self) -> Vec<LinkToken> {
        dangling_in(&self.store, &[self.pivot], true)
    }

    /// Validator mismatches recorded during the pass.
    pub fn findings(&self) -> Vec<Finding> {
        self.validator
            .as_ref()
            .map(|v| v.findings())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("pivot", &self.pivot)
            .field("entries", &self.store.len())
            .finish()
    }
}

pub(crate) fn dangling_in(
    store: &InMemoryContentStore<Node>,
    roots: &[LinkToken],
    parents: bool,
) -> Vec<LinkToken> {
    let mut missing: BTreeSet<LinkToken> = store.pending().into_iter().collect();
    missing.extend(roots.iter().filter(|t| !store.contains(t)).copied());
    for token in store.tokens() {
        let refs = store
            .with_data(&token, |node| {
                let mut refs = node.references();
                if parents {
                    refs.extend(node.parent_token());
                }
                refs
            })
            .unwrap_or_default();
        missing.extend(refs.into_iter().filter(|t| !store.contains(t)));
    }
    missing.into_iter().collect()
}

/// Builds graphs for page loads and loader executions.
///
/// Every call works against its own fresh store. Callers merge the stores
/// of later loader executions into the store of the page they extend.
pub struct GraphBuilder<T> {
    pub(crate) transport: T,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) formatter: Arc<dyn Formatter>,
    pub(crate) config: GraphConfig,
}

impl<T: Transport> GraphBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            router: Arc::new(PathRouter::new()),
            formatter: Arc::new(PlainFormatter),
            config: GraphConfig::default(),
        }
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn new_store(&self) -> (InMemoryContentStore<Node>, Option<Arc<Validator>>) {
        if self.config.validate {
            let validator = Arc::new(Validator::new(self.router.clone()));
            (InMemoryContentStore::with_observer(validator.clone()), Some(validator))
        } else {
            (InMemoryContentStore::new(), None)
        }
    }

    pub(crate) fn materializer<'a>(
        &'a self,
        store: &'a InMemoryContentStore<Node>,
    ) -> Materializer<'a, InMemoryContentStore<Node>> {
        Materializer::new(store, self.formatter.as_ref(), self.config.comment_sort)
    }

    /// Load the page at `path` into a fresh graph.
    ///
    /// Never fails: routing and transport failures become an error pivot
    /// carrying a message fit for display.
    pub async fn load_page(&self, path: &str) -> Graph {
        let (store, validator) = self.new_store();
        let route = match self.router.parse(path) {
            Ok(route) => route,
            Err(e) => {
                let pivot = store.create_error_node(&format!("Cannot open {path}: {e}"), "route");
                return Graph {
                    store,
                    pivot,
                    route: None,
                    validator,
                };
            }
        };
        info!(path, identity = route.identity.kind(), "loading page");
        let pivot = self.fill_page(&store, &route.identity).await;
        debug!(entries = store.len(), pivot = %pivot.short_hex(), "page loaded");
        Graph {
            store,
            pivot,
            route: Some(route),
            validator,
        }
    }

    async fn fill_page(
        &self,
        store: &InMemoryContentStore<Node>,
        identity: &Identity,
    ) -> LinkToken {
        let request = match page_request(identity, self.config.cache_static) {
            Ok(request) => request,
            Err(e) => return store.create_error_node(&e.to_string(), identity.kind()),
        };

        let sidebar = match identity {
            Identity::Subreddit { subreddit, .. }
                if self.config.fetch_sidebar && !AGGREGATES.contains(&subreddit.as_str()) =>
            {
                let about = Identity::About {
                    subreddit: subreddit.clone(),
                };
                page_request(&about, self.config.cache_static)
                    .ok()
                    .map(|request| (about, request))
            }
            _ => None,
        };

        let (primary, about) = match &sidebar {
            Some((_, sidebar_request)) => {
                let (primary, about) = tokio::join!(
                    self.transport.fetch(&request),
                    self.transport.fetch(sidebar_request)
                );
                (primary, Some(about))
            }
            None => (self.transport.fetch(&request).await, None),
        };

        let value = match primary {
            Ok(value) => value,
            Err(e) => {
                warn!(request = %request.signature(), error = %e, "page fetch failed");
                let message = describe_fetch_error(&e, &request.path);
                return store.create_error_node(&message, identity.kind());
            }
        };

        let materializer = self.materializer(store);
        let header = match (sidebar, about) {
            (Some((about_identity, _)), Some(Ok(about))) => match classify(about) {
                raw @ RawListing::About(_) => Some(materializer.page(raw, &about_identity, None)),
                other => {
                    debug!(found = other.discriminant(), "sidebar payload ignored");
                    None
                }
            },
            (_, Some(Err(e))) => {
                warn!(error = %e, "sidebar fetch failed");
                None
            }
            _ => None,
        };
        materializer.page(classify(value), identity, header)
    }
}

/// Request fetching the page `identity` names.
pub fn page_request(identity: &Identity, cache_static: bool) -> GraphResult<Request> {
    let canonical = identity.canonical_path();
    let path = split_url(&canonical).0.to_string();
    let request = match identity {
        Identity::Thread { post, .. } => Request::new(path).query("sort", post.sort.as_str()),
        Identity::Subreddit { after, .. } | Identity::User { after, .. } => match after {
            Some(after) => Request::new(path).query("after", after),
            None => Request::new(path),
        },
        Identity::About { .. } | Identity::Wiki { .. } | Identity::Moderators { .. } => {
            let request = Request::new(path);
            if cache_static {
                request.cached()
            } else {
                request
            }
        }
        Identity::RedirectLoop { path } => return Err(GraphError::RedirectLoop(path.clone())),
        Identity::NotFound { path } => return Err(GraphError::NotFound(path.clone())),
    };
    Ok(request)
}

/// User-visible message for a failed fetch of `what`.
pub fn describe_fetch_error(error: &SourceError, what: &str) -> String {
    if error.is_network() {
        format!(
            "Network error while loading {what}: {error}. Tracking protection or a content \
             blocker is a common cause; allow requests to the API host and retry."
        )
    } else {
        format!("Failed to load {what}: {error}")
    }
}
