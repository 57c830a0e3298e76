use std::sync::Arc;

use tracing::{debug, warn};

use strand_codec::{LoaderCodec, Opaque};
use strand_router::paths::split_url;
use strand_source::{classify, RawListing, Request, Transport};
use strand_store::{ContentStore, InMemoryContentStore};
use strand_types::{CommentSort, LinkToken, Loader, PostRef};

use crate::batch::{batch_request, find_subtree, merge_residual, replies_after, reparent, split_ids};
use crate::error::{GraphError, GraphResult};
use crate::materialize::{ListingScope, ThreadContext};
use crate::node::Node;
use crate::page::{dangling_in, describe_fetch_error, GraphBuilder};
use crate::validate::{Finding, Validator};

/// Result of executing a loader: a fresh store holding the new entities,
/// the top-level items in display order and the continuation of whatever
/// is still left.
pub struct Fragment {
    pub store: InMemoryContentStore<Node>,
    /// New top-level items. When `residual` is set the last item is a
    /// load-more node carrying it.
    pub items: Vec<LinkToken>,
    pub residual: Option<Loader>,
    validator: Option<Arc<Validator>>,
}

impl Fragment {
    /// Tokens referenced by the fragment that have no entry in it. Parents
    /// are not checked: they live in the store the fragment extends.
    pub fn dangling(&self) -> Vec<LinkToken> {
        dangling_in(&self.store, &self.items, false)
    }

    /// Copy the fragment's entries into `target`, keeping existing entries.
    pub fn merge_into(&self, target: &InMemoryContentStore<Node>) -> GraphResult<usize> {
        Ok(target.absorb(&self.store)?)
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.validator
            .as_ref()
            .map(|v| v.findings())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("items", &self.items.len())
            .field("residual", &self.residual.as_ref().map(Loader::kind))
            .finish()
    }
}

type Outcome = GraphResult<(Vec<LinkToken>, Option<Loader>)>;

/// Encode a loader for the UI layer.
pub fn encode_loader(loader: &Loader) -> GraphResult<Opaque> {
    Ok(LoaderCodec::encode(Loader::CODEC_TAG, loader)?)
}

impl<T: Transport> GraphBuilder<T> {
    /// Execute a loader handed back by the UI layer.
    pub async fn execute_opaque(&self, opaque: &Opaque) -> Fragment {
        match LoaderCodec::decode::<Loader>(Loader::CODEC_TAG, opaque) {
            Ok(loader) => self.execute_loader(&loader).await,
            Err(e) => {
                let (store, validator) = self.new_store();
                let item = store.create_error_node(&format!("Cannot load more: {e}"), "opaque");
                Fragment {
                    store,
                    items: vec![item],
                    residual: None,
                    validator,
                }
            }
        }
    }

    /// Execute `loader` against a fresh store.
    ///
    /// Never fails: a failed fetch yields a fragment whose single item is an
    /// error node.
    pub async fn execute_loader(&self, loader: &Loader) -> Fragment {
        let (store, validator) = self.new_store();
        let outcome = match loader {
            Loader::ApiBatch {
                link,
                parent_id,
                child_ids,
                sort,
            } => self.run_batch(&store, link, parent_id, child_ids, *sort).await,
            Loader::ByPermalink {
                link,
                permalink,
                anchor,
                after,
            } => {
                self.run_permalink(&store, link, permalink, anchor, after.as_deref())
                    .await
            }
            Loader::ListingPage {
                subreddit,
                sort,
                after,
            } => {
                let scope = ListingScope::Subreddit {
                    subreddit: subreddit.clone(),
                    sort: *sort,
                };
                self.run_listing(&store, &scope, after.as_deref()).await
            }
            Loader::UserPage { name, after } => {
                let scope = ListingScope::User { name: name.clone() };
                self.run_listing(&store, &scope, after.as_deref()).await
            }
        };

        let (items, residual) = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(kind = loader.kind(), error = %e, "loader failed");
                let message = match &e {
                    GraphError::Source(source) => describe_fetch_error(source, "more items"),
                    other => format!("Failed to load more items: {other}"),
                };
                (vec![store.create_error_node(&message, loader.kind())], None)
            }
        };
        debug!(
            kind = loader.kind(),
            items = items.len(),
            residual = residual.is_some(),
            "loader executed"
        );
        Fragment {
            store,
            items,
            residual,
            validator,
        }
    }

    async fn run_batch(
        &self,
        store: &InMemoryContentStore<Node>,
        link: &PostRef,
        parent_id: &str,
        child_ids: &[String],
        sort: CommentSort,
    ) -> Outcome {
        let (batch, remaining) = split_ids(child_ids);
        debug!(
            parent = parent_id,
            batch = batch.len(),
            remaining = remaining.len(),
            "batch continuation"
        );
        let value = self
            .transport
            .fetch(&batch_request(link, batch, sort))
            .await?;
        let things = match classify(value) {
            RawListing::MoreChildren(things) => things,
            RawListing::ApiError(message) => return Err(GraphError::Upstream(message)),
            other => {
                return Err(GraphError::UnexpectedPayload {
                    expected: "more-children".into(),
                    found: other.discriminant().to_string(),
                })
            }
        };

        let mut trees = reparent(things);
        let residual = merge_residual(&mut trees, remaining, parent_id).map(|child_ids| {
            Loader::ApiBatch {
                link: link.clone(),
                parent_id: parent_id.to_string(),
                child_ids,
                sort,
            }
        });

        let ctx = ThreadContext::from_post(link.clone()).attached();
        let materializer = self.materializer(store);
        let mut items = materializer.comment_list(&trees, &ctx, &ctx.anchor(parent_id));
        if let Some(loader) = &residual {
            items.push(materializer.load_more(loader.clone(), None));
        }
        Ok((items, residual))
    }

    async fn run_permalink(
        &self,
        store: &InMemoryContentStore<Node>,
        link: &PostRef,
        permalink: &str,
        anchor: &str,
        after: Option<&str>,
    ) -> Outcome {
        let path = split_url(permalink).0.trim_end_matches('/');
        let request = Request::new(path).query("sort", link.sort.as_str());
        let (post, comments) = match classify(self.transport.fetch(&request).await?) {
            RawListing::Thread { post, comments } => (post, comments),
            RawListing::ApiError(message) => return Err(GraphError::Upstream(message)),
            other => {
                return Err(GraphError::UnexpectedPayload {
                    expected: "thread".into(),
                    found: other.discriminant().to_string(),
                })
            }
        };

        let field = |key: &str| post.data.get(key).and_then(|v| v.as_str());
        let ctx = ThreadContext::with_permalink(
            link.clone(),
            field("permalink"),
            field("title").map(str::to_string),
        );
        let replies = if anchor == link.fullname {
            comments
        } else {
            find_subtree(comments, anchor)
                .ok_or_else(|| GraphError::AnchorMissing {
                    anchor: anchor.to_string(),
                })?
                .replies
        };
        let fresh = replies_after(replies, after);
        let items = self
            .materializer(store)
            .comment_list(&fresh, &ctx, &ctx.anchor(anchor));
        Ok((items, None))
    }

    async fn run_listing(
        &self,
        store: &InMemoryContentStore<Node>,
        scope: &ListingScope,
        after: Option<&str>,
    ) -> Outcome {
        let url = scope.url(None);
        let request = match after {
            Some(after) => Request::new(url).query("after", after),
            None => Request::new(url),
        };
        match classify(self.transport.fetch(&request).await?) {
            RawListing::Listing {
                children, after, ..
            } => Ok(self.materializer(store).listing_items(scope, &children, after)),
            RawListing::ApiError(message) => Err(GraphError::Upstream(message)),
            other => Err(GraphError::UnexpectedPayload {
                expected: "listing".into(),
                found: other.discriminant().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::ParentRef;
    use crate::testing::MockTransport;
    use serde_json::{json, Value};
    use strand_ident::LinkHasher;
    use strand_source::SourceError;
    use strand_types::{Base, ListingSort, NodeResult};

    fn link() -> PostRef {
        PostRef::new("t3_p", "rust", CommentSort::default())
    }

    fn comment(id: &str, parent: &str) -> Value {
        json!({"kind": "t1", "data": {
            "name": format!("t1_{id}"), "parent_id": parent, "body": id,
            "permalink": format!("/r/rust/comments/p/slug/{id}/"),
        }})
    }

    fn envelope(things: Vec<Value>) -> Value {
        json!({"json": {"errors": [], "data": {"things": things}}})
    }

    fn batch(ids: Vec<String>) -> Loader {
        Loader::ApiBatch {
            link: link(),
            parent_id: "t3_p".into(),
            child_ids: ids,
            sort: CommentSort::default(),
        }
    }

    fn builder(transport: MockTransport) -> GraphBuilder<MockTransport> {
        GraphBuilder::new(transport).with_config(GraphConfig {
            validate: true,
            ..GraphConfig::default()
        })
    }

    /// Answers a batch request with one top-level comment per requested id.
    fn echo_batch(request: &Request) -> strand_source::SourceResult<Value> {
        let things = request.query["children"]
            .split(',')
            .map(|id| comment(id, "t3_p"))
            .collect();
        Ok(envelope(things))
    }

    fn node(fragment: &Fragment, token: &LinkToken) -> Node {
        fragment
            .store
            .get(token)
            .and_then(NodeResult::into_data)
            .expect("data node")
    }

    #[tokio::test]
    async fn oversized_batch_is_split() {
        let ids: Vec<String> = (0..150).map(|i| format!("c{i}")).collect();
        let b = builder(MockTransport::new().with_handler("/api/morechildren", echo_batch));
        let fragment = b.execute_loader(&batch(ids.clone())).await;

        let requests = b.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query["children"].split(',').count(), 100);

        assert_eq!(fragment.items.len(), 101);
        match &fragment.residual {
            Some(Loader::ApiBatch { child_ids, .. }) => assert_eq!(child_ids, &ids[100..].to_vec()),
            other => panic!("expected residual batch, got {other:?}"),
        }
        let last = node(&fragment, fragment.items.last().unwrap());
        assert_eq!(last.loader(), fragment.residual.as_ref());
        assert!(fragment.dangling().is_empty());
        assert!(fragment.findings().is_empty());
    }

    #[tokio::test]
    async fn small_batch_has_no_residual() {
        let b = builder(MockTransport::new().with_handler("/api/morechildren", echo_batch));
        let fragment = b.execute_loader(&batch(vec!["x".into(), "y".into()])).await;
        assert_eq!(fragment.items.len(), 2);
        assert!(fragment.residual.is_none());
    }

    #[tokio::test]
    async fn batch_results_are_reparented() {
        let b = builder(MockTransport::new().with_response(
            "/api/morechildren",
            envelope(vec![comment("a", "t3_p"), comment("b", "t1_a"), comment("c", "t3_p")]),
        ));
        let fragment = b
            .execute_loader(&batch(vec!["a".into(), "b".into(), "c".into()]))
            .await;

        let on = |id: &str| LinkHasher::of(&Base::comment(id, link()));
        assert_eq!(fragment.items, vec![on("t1_a"), on("t1_c")]);
        let a = node(&fragment, &fragment.items[0]);
        let a = a.as_post().unwrap();
        assert_eq!(a.replies.as_ref().unwrap().items, vec![on("t1_b")]);
        // Top-level results point at the parent the caller already holds.
        let post_token = LinkHasher::of(&Base::Post(link()));
        assert_eq!(a.parent, Some(ParentRef::Node(post_token)));
    }

    #[tokio::test]
    async fn out_of_batch_parent_is_attached_by_token() {
        let b = builder(MockTransport::new().with_response(
            "/api/morechildren",
            envelope(vec![comment("a", "t3_p"), comment("x", "t1_known")]),
        ));
        let fragment = b
            .execute_loader(&batch(vec!["a".into(), "x".into()]))
            .await;

        let on = |id: &str| LinkHasher::of(&Base::comment(id, link()));
        assert_eq!(fragment.items, vec![on("t1_a"), on("t1_x")]);
        let x = node(&fragment, &fragment.items[1]);
        assert_eq!(
            x.as_post().unwrap().parent,
            Some(ParentRef::Node(on("t1_known")))
        );
        assert!(fragment.dangling().is_empty());
    }

    #[tokio::test]
    async fn trailing_stub_merges_into_residual() {
        let stub = json!({"kind": "more", "data": {
            "name": "t1__", "parent_id": "t3_p", "children": ["m1", "m2"], "count": 2
        }});
        let b = builder(MockTransport::new().with_handler("/api/morechildren", move |request| {
            let mut things: Vec<Value> = request.query["children"]
                .split(',')
                .map(|id| comment(id, "t3_p"))
                .collect();
            things.push(stub.clone());
            Ok(envelope(things))
        }));
        let ids: Vec<String> = (0..101).map(|i| format!("c{i}")).collect();
        let fragment = b.execute_loader(&batch(ids)).await;

        match &fragment.residual {
            Some(Loader::ApiBatch { child_ids, .. }) => {
                assert_eq!(child_ids, &vec!["c100".to_string(), "m1".into(), "m2".into()])
            }
            other => panic!("expected residual batch, got {other:?}"),
        }
        // 100 comments and one merged continuation.
        assert_eq!(fragment.items.len(), 101);
    }

    #[tokio::test]
    async fn depth_continuation_returns_later_replies() {
        let mut anchor = comment("a", "t3_p");
        anchor["data"]["replies"] = json!({"kind": "Listing", "data": {"children": [
            comment("b", "t1_a"), comment("c", "t1_a"), comment("d", "t1_a")
        ]}});
        let thread = json!([
            {"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {
                "name": "t3_p", "subreddit": "rust", "title": "p",
                "permalink": "/r/rust/comments/p/slug/"
            }}]}},
            {"kind": "Listing", "data": {"children": [anchor]}}
        ]);
        let b = builder(MockTransport::new().with_response("/r/rust/comments/p/slug/a", thread));
        let loader = Loader::ByPermalink {
            link: link(),
            permalink: "/r/rust/comments/p/slug/a/".into(),
            anchor: "t1_a".into(),
            after: Some("t1_b".into()),
        };
        let fragment = b.execute_loader(&loader).await;

        let on = |id: &str| LinkHasher::of(&Base::comment(id, link()));
        assert_eq!(fragment.items, vec![on("t1_c"), on("t1_d")]);
        assert!(fragment.residual.is_none());
        let c = node(&fragment, &fragment.items[0]);
        assert_eq!(c.as_post().unwrap().parent, Some(ParentRef::Node(on("t1_a"))));
        assert!(fragment.findings().is_empty());
    }

    #[tokio::test]
    async fn missing_anchor_is_an_error_item() {
        let thread = json!([
            {"kind": "Listing", "data": {"children": [
                {"kind": "t3", "data": {"name": "t3_p", "subreddit": "rust"}}
            ]}},
            {"kind": "Listing", "data": {"children": []}}
        ]);
        let b = builder(MockTransport::new().with_response("/r/rust/comments/p/slug/a", thread));
        let fragment = b
            .execute_loader(&Loader::ByPermalink {
                link: link(),
                permalink: "/r/rust/comments/p/slug/a/".into(),
                anchor: "t1_a".into(),
                after: None,
            })
            .await;
        assert_eq!(fragment.items.len(), 1);
        let message = fragment.store.get(&fragment.items[0]).unwrap();
        assert!(message.error().unwrap().contains("t1_a"));
    }

    #[tokio::test]
    async fn listing_page_continues_with_next_cursor() {
        let page = json!({"kind": "Listing", "data": {"after": "t3_z", "children": [
            {"kind": "t3", "data": {
                "name": "t3_y", "subreddit": "rust", "permalink": "/r/rust/comments/y/s/"
            }}
        ]}});
        let b = builder(MockTransport::new().with_response("/r/rust/new", page));
        let fragment = b
            .execute_loader(&Loader::ListingPage {
                subreddit: "rust".into(),
                sort: ListingSort::New,
                after: Some("t3_x".into()),
            })
            .await;

        assert_eq!(b.transport().requests()[0].signature(), "/r/rust/new?after=t3_x");
        assert_eq!(fragment.items.len(), 2);
        assert_eq!(
            fragment.residual,
            Some(Loader::ListingPage {
                subreddit: "rust".into(),
                sort: ListingSort::New,
                after: Some("t3_z".into())
            })
        );
    }

    #[tokio::test]
    async fn transport_failure_is_single_error_item() {
        let b = builder(
            MockTransport::new()
                .with_error("/api/morechildren", || SourceError::Network("refused".into())),
        );
        let fragment = b.execute_loader(&batch(vec!["x".into()])).await;
        assert_eq!(fragment.items.len(), 1);
        assert!(fragment.residual.is_none());
        let stored = fragment.store.get(&fragment.items[0]).unwrap();
        assert!(stored.error().unwrap().contains("Network error"));
    }

    #[tokio::test]
    async fn opaque_roundtrip_executes_loader() {
        let b = builder(MockTransport::new().with_handler("/api/morechildren", echo_batch));
        let opaque = encode_loader(&batch(vec!["x".into()])).unwrap();
        let fragment = b.execute_opaque(&opaque).await;
        assert_eq!(fragment.items.len(), 1);
        assert!(node(&fragment, &fragment.items[0]).as_post().is_some());

        let garbage = b.execute_opaque(&Opaque::from("nope".to_string())).await;
        assert!(garbage.store.get(&garbage.items[0]).unwrap().is_error());
    }

    #[tokio::test]
    async fn fragment_merges_into_page_store_by_identity() {
        let b = builder(MockTransport::new().with_handler("/api/morechildren", echo_batch));
        let first = b.execute_loader(&batch(vec!["x".into(), "y".into()])).await;
        let second = b.execute_loader(&batch(vec!["y".into(), "z".into()])).await;

        let page = InMemoryContentStore::new();
        assert_eq!(first.merge_into(&page).unwrap(), 2);
        // `y` is already known; only `z` is new.
        assert_eq!(second.merge_into(&page).unwrap(), 1);
        assert_eq!(page.len(), 3);
    }
}
