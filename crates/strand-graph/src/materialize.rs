//! Raw payload to graph conversion.
//!
//! Every entity that can be identified is filled under the token of its
//! [`Base`], so an entity reached twice (natively and through a crosspost,
//! say) is stored once. Each child is filled inside its own `fill_once`
//! call, which turns a malformed child into an `Error` entry for that child
//! alone.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;

use strand_ident::LinkHasher;
use strand_router::{paths, Identity};
use strand_source::raw::{KIND_COMMENT, KIND_POST};
use strand_source::{
    RawComment, RawListing, RawMore, RawPost, RawSubreddit, RawThing, RawTree, RawUser,
    RawWikiPage,
};
use strand_store::{ContentStore, FillError};
use strand_types::base::normalize_subreddit;
use strand_types::{Base, CommentSort, LinkToken, ListingSort, Loader, PostRef};

use crate::format::{Document, FormatContext, Formatter};
use crate::node::{
    AboutNode, Crumb, ListingNode, LoadMoreNode, Node, ParentRef, PostKind, PostNode, Replies,
    UserEntry, UserListNode,
};

const DELETED: &str = "[deleted]";

/// Which paginated listing a page of entries belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingScope {
    Subreddit { subreddit: String, sort: ListingSort },
    User { name: String },
}

impl ListingScope {
    pub fn base(&self, after: Option<String>) -> Base {
        match self {
            Self::Subreddit { subreddit, sort } => Base::listing(subreddit, *sort, after),
            Self::User { name } => Base::user(name, after),
        }
    }

    /// Loader for the page starting at `after`.
    pub fn loader(&self, after: Option<String>) -> Loader {
        match self {
            Self::Subreddit { subreddit, sort } => Loader::ListingPage {
                subreddit: normalize_subreddit(subreddit),
                sort: *sort,
                after,
            },
            Self::User { name } => Loader::UserPage {
                name: name.to_lowercase(),
                after,
            },
        }
    }

    pub fn url(&self, after: Option<&str>) -> String {
        match self {
            Self::Subreddit { subreddit, sort } => {
                paths::listing_path(&normalize_subreddit(subreddit), *sort, after)
            }
            Self::User { name } => paths::user_path(&name.to_lowercase(), after),
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Subreddit { subreddit, .. } => format!("r/{}", normalize_subreddit(subreddit)),
            Self::User { name } => format!("u/{name}"),
        }
    }
}

/// Context shared by every comment of one thread.
#[derive(Clone, Debug)]
pub struct ThreadContext {
    pub post: PostRef,
    /// Permalink of the post, ending in `/`.
    pub permalink: String,
    pub title: Option<String>,
    /// Attach replies declared under a comment outside the current anchor
    /// to that comment's token instead of deferring them.
    pub attach_declared: bool,
}

impl ThreadContext {
    /// Context for a thread known only by reference.
    pub fn from_post(post: PostRef) -> Self {
        let permalink = format!("/r/{}/comments/{}/_/", post.subreddit, post.id());
        Self {
            post,
            permalink,
            title: None,
            attach_declared: false,
        }
    }

    /// Context for a thread whose post permalink may be known.
    pub fn with_permalink(post: PostRef, permalink: Option<&str>, title: Option<String>) -> Self {
        match permalink {
            Some(permalink) => Self {
                post,
                permalink: ensure_trailing_slash(permalink),
                title,
                attach_declared: false,
            },
            None => Self {
                title,
                ..Self::from_post(post)
            },
        }
    }

    /// Context for batch results, whose parents are already in the graph
    /// the caller holds.
    pub fn attached(self) -> Self {
        Self {
            attach_declared: true,
            ..self
        }
    }

    /// Permalink of a post or comment of this thread.
    pub fn permalink_of(&self, fullname: &str) -> String {
        if fullname == self.post.fullname {
            self.permalink.clone()
        } else {
            let id = fullname.split_once('_').map_or(fullname, |(_, id)| id);
            format!("{}{id}/", self.permalink)
        }
    }

    /// The in-graph node a list of replies under `fullname` hangs from.
    pub fn anchor(&self, fullname: &str) -> Anchor {
        let base = Base::from_fullname(fullname, &self.post)
            .unwrap_or_else(|| Base::Post(self.post.clone()));
        let fullname = match &base {
            Base::Comment { fullname, .. } => fullname.clone(),
            _ => self.post.fullname.clone(),
        };
        Anchor {
            permalink: self.permalink_of(&fullname),
            token: LinkHasher::of(&base),
            fullname,
        }
    }

    fn crumbs(&self) -> Vec<Crumb> {
        let mut crumbs = vec![subreddit_crumb(&self.post.subreddit)];
        crumbs.push(Crumb {
            label: self
                .title
                .clone()
                .unwrap_or_else(|| self.post.fullname.clone()),
            url: self.permalink.clone(),
        });
        crumbs
    }

    /// Parent of a comment declared under `parent_id` rather than under the
    /// anchor it was listed with.
    fn declared_parent(&self, parent_id: &str) -> ParentRef {
        let base = self
            .attach_declared
            .then(|| Base::from_fullname(parent_id, &self.post))
            .flatten();
        match base {
            Some(base) => ParentRef::Node(LinkHasher::of(&base)),
            None => self.deferred_parent(parent_id),
        }
    }

    /// Placeholder parent for a comment whose parent is not in the graph.
    fn deferred_parent(&self, parent_id: &str) -> ParentRef {
        ParentRef::Deferred {
            crumbs: self.crumbs(),
            loader: Loader::ByPermalink {
                link: self.post.clone(),
                permalink: self.permalink_of(parent_id),
                anchor: parent_id.to_string(),
                after: None,
            },
        }
    }
}

/// The node a list of sibling replies hangs under.
#[derive(Clone, Debug)]
pub struct Anchor {
    pub fullname: String,
    pub permalink: String,
    pub token: LinkToken,
}

/// Fills a content store from classified raw payloads.
pub struct Materializer<'a, S> {
    store: &'a S,
    formatter: &'a dyn Formatter,
    listing_sort: CommentSort,
}

impl<'a, S: ContentStore<Node>> Materializer<'a, S> {
    /// `listing_sort` is the comment sort given to posts reached from
    /// listings rather than from their own thread.
    pub fn new(store: &'a S, formatter: &'a dyn Formatter, listing_sort: CommentSort) -> Self {
        Self {
            store,
            formatter,
            listing_sort,
        }
    }

    /// Materialize one page payload requested for `identity`. Returns the
    /// pivot token.
    pub fn page(
        &self,
        raw: RawListing,
        identity: &Identity,
        header: Option<LinkToken>,
    ) -> LinkToken {
        match (raw, identity) {
            (RawListing::Thread { post, comments }, Identity::Thread { post: wanted, focus }) => {
                self.thread(&post, comments, wanted.sort, focus.as_deref())
            }
            (
                RawListing::Listing {
                    children, after, ..
                },
                Identity::Subreddit {
                    subreddit,
                    sort,
                    after: page,
                },
            ) => {
                let scope = ListingScope::Subreddit {
                    subreddit: subreddit.clone(),
                    sort: *sort,
                };
                self.listing(&scope, page.clone(), &children, after, header)
            }
            (
                RawListing::Listing {
                    children, after, ..
                },
                Identity::User { name, after: page },
            ) => {
                let scope = ListingScope::User { name: name.clone() };
                self.listing(&scope, page.clone(), &children, after, header)
            }
            (RawListing::Wiki(thing), Identity::Wiki { subreddit, page }) => {
                self.wiki(subreddit, page, &thing)
            }
            (RawListing::About(thing), Identity::About { subreddit }) => {
                self.about(subreddit, &thing)
            }
            (RawListing::UserList(users), Identity::Moderators { subreddit }) => {
                self.moderators(subreddit, &users)
            }
            (RawListing::ApiError(message), identity) => match identity.to_base() {
                Some(base) => self
                    .store
                    .fill_once(LinkHasher::of(&base), || Err(FillError::Upstream(message))),
                None => self.store.create_error_node(&message, identity.kind()),
            },
            (RawListing::Unsupported { discriminant, raw }, _) => {
                self.unsupported(discriminant, raw)
            }
            (other, identity) => self.unsupported(
                other.discriminant().to_string(),
                json!({ "requested": identity.kind() }),
            ),
        }
    }

    /// Materialize a thread page. The pivot is the post, or the focused
    /// comment when the thread was requested through a comment permalink.
    pub fn thread(
        &self,
        post: &RawThing,
        comments: Vec<RawTree>,
        sort: CommentSort,
        focus: Option<&str>,
    ) -> LinkToken {
        let post_token = self.post(post, sort, Some(comments));
        let (Some(focus), Some(post_ref)) = (focus, post_ref_of(post, sort)) else {
            return post_token;
        };
        let token = LinkHasher::of(&Base::comment(focus, post_ref));
        if self.store.contains(&token) {
            token
        } else {
            self.store
                .create_error_node(&format!("comment {focus} is not part of this thread"), "focus")
        }
    }

    /// Fill a post. `comments` is `Some` when the post's own thread was
    /// fetched.
    pub fn post(
        &self,
        thing: &RawThing,
        sort: CommentSort,
        comments: Option<Vec<RawTree>>,
    ) -> LinkToken {
        let Some(post_ref) = post_ref_of(thing, sort) else {
            return self
                .store
                .create_error_node("post without name or subreddit", "post");
        };
        let token = LinkHasher::of(&Base::Post(post_ref.clone()));
        self.store.fill_once(token, || {
            let raw: RawPost = thing.parse().map_err(FillError::malformed)?;
            let ctx = ThreadContext::with_permalink(
                post_ref.clone(),
                raw.permalink.as_deref(),
                Some(raw.title.clone()),
            );
            let replies = comments.map(|comments| Replies {
                items: self.comment_list(&comments, &ctx, &ctx.anchor(&post_ref.fullname)),
            });
            // Crossposts embed the original under the base a listing gives it.
            let embed = raw.crosspost_parent_list.first().map(|original| {
                let original = RawThing::new(KIND_POST, original.clone());
                self.post(&original, self.listing_sort, None)
            });

            Ok(Node::Post(PostNode {
                kind: PostKind::Post,
                url: Some(paths::with_comment_sort(&ctx.permalink, sort)),
                disallow_pivot: false,
                title: Some(raw.title),
                body: self.format(&raw.selftext, &post_ref.subreddit, "post"),
                author: author(raw.author),
                created: timestamp(raw.created_utc),
                score: raw.score,
                stickied: raw.stickied,
                locked: raw.locked,
                embed,
                parent: Some(subreddit_parent(&post_ref.subreddit)),
                replies,
            }))
        })
    }

    /// Materialize sibling comment trees hanging under `anchor`, in source
    /// order.
    pub fn comment_list(
        &self,
        trees: &[RawTree],
        ctx: &ThreadContext,
        anchor: &Anchor,
    ) -> Vec<LinkToken> {
        let mut items = Vec::with_capacity(trees.len());
        let mut last_known: Option<&str> = None;
        for tree in trees {
            items.push(self.comment_tree(tree, ctx, anchor, last_known));
            if !tree.thing.is_more() {
                last_known = tree.thing.name().or(last_known);
            }
        }
        items
    }

    fn comment_tree(
        &self,
        tree: &RawTree,
        ctx: &ThreadContext,
        anchor: &Anchor,
        last_known: Option<&str>,
    ) -> LinkToken {
        let thing = &tree.thing;
        if thing.is_more() {
            return self.continuation(thing, ctx, anchor, last_known);
        }
        if thing.kind != KIND_COMMENT {
            return self.unsupported(format!("{} in comment tree", thing.kind), thing.data.clone());
        }
        let Some(name) = thing.name() else {
            return self.store.create_error_node("comment without a name", "comment");
        };

        let token = LinkHasher::of(&Base::comment(name, ctx.post.clone()));
        self.store.fill_once(token, || {
            let raw: RawComment = thing.parse().map_err(FillError::malformed)?;
            let parent = match raw.parent_id.as_deref() {
                Some(declared) if declared != anchor.fullname => ctx.declared_parent(declared),
                _ => ParentRef::Node(anchor.token),
            };
            let replies = if tree.replies.is_empty() {
                None
            } else {
                let here = Anchor {
                    fullname: raw.name.clone(),
                    permalink: raw
                        .permalink
                        .as_deref()
                        .map(ensure_trailing_slash)
                        .unwrap_or_else(|| ctx.permalink_of(&raw.name)),
                    token,
                };
                Some(Replies {
                    items: self.comment_list(&tree.replies, ctx, &here),
                })
            };
            Ok(self.comment_node(raw, ctx, parent, replies))
        })
    }

    /// A comment reached outside its thread, e.g. from a user listing.
    fn standalone_comment(&self, thing: &RawThing) -> LinkToken {
        let data = &thing.data;
        let field = |key: &str| data.get(key).and_then(Value::as_str);
        let (Some(name), Some(link_id), Some(subreddit)) =
            (thing.name(), field("link_id"), field("subreddit"))
        else {
            return self
                .store
                .create_error_node("comment without name, link or subreddit", "comment");
        };
        let post = PostRef::new(link_id, subreddit, self.listing_sort);
        let token = LinkHasher::of(&Base::comment(name, post.clone()));
        self.store.fill_once(token, || {
            let raw: RawComment = thing.parse().map_err(FillError::malformed)?;
            let thread_permalink = raw.permalink.as_deref().map(parent_permalink);
            let ctx = ThreadContext::with_permalink(
                post.clone(),
                thread_permalink.as_deref(),
                field("link_title").map(str::to_string),
            );
            let parent_id = raw.parent_id.clone().unwrap_or_else(|| post.fullname.clone());
            let parent = ctx.deferred_parent(&parent_id);
            Ok(self.comment_node(raw, &ctx, parent, None))
        })
    }

    fn comment_node(
        &self,
        raw: RawComment,
        ctx: &ThreadContext,
        parent: ParentRef,
        replies: Option<Replies>,
    ) -> Node {
        let permalink = raw
            .permalink
            .clone()
            .unwrap_or_else(|| ctx.permalink_of(&raw.name));
        Node::Post(PostNode {
            kind: PostKind::Comment,
            url: Some(paths::with_comment_sort(&permalink, ctx.post.sort)),
            disallow_pivot: false,
            title: None,
            body: self.format(&raw.body, &ctx.post.subreddit, "comment"),
            author: author(raw.author),
            created: timestamp(raw.created_utc),
            score: if raw.score_hidden { None } else { raw.score },
            stickied: raw.stickied,
            locked: false,
            embed: None,
            parent: Some(parent),
            replies,
        })
    }

    /// Turn a `more` stub into a load-more node.
    ///
    /// A stub without children is a depth continuation, resolved by
    /// re-fetching the anchor's permalink. A stub listing ids is a breadth
    /// continuation, resolved by a batch fetch of exactly those ids.
    fn continuation(
        &self,
        thing: &RawThing,
        ctx: &ThreadContext,
        anchor: &Anchor,
        last_known: Option<&str>,
    ) -> LinkToken {
        let more: RawMore = match thing.parse() {
            Ok(more) => more,
            Err(e) => {
                return self
                    .store
                    .create_error_node(&format!("malformed continuation: {e}"), "more")
            }
        };
        let loader = if more.children.is_empty() {
            Loader::ByPermalink {
                link: ctx.post.clone(),
                permalink: anchor.permalink.clone(),
                anchor: anchor.fullname.clone(),
                after: last_known.map(str::to_string),
            }
        } else {
            Loader::ApiBatch {
                link: ctx.post.clone(),
                parent_id: more.parent_id,
                child_ids: more.children,
                sort: ctx.post.sort,
            }
        };
        debug!(kind = loader.kind(), count = more.count, "continuation");
        self.load_more(loader, (more.count > 0).then_some(more.count))
    }

    /// Store a load-more node under a fresh token.
    pub fn load_more(&self, loader: Loader, count: Option<u64>) -> LinkToken {
        let count = count.or_else(|| loader.pending_count().map(|n| n as u64));
        self.store
            .insert_fresh(loader.kind(), Node::LoadMore(LoadMoreNode { loader, count }))
    }

    /// Fill a listing node for the page of `scope` starting at `page`.
    pub fn listing(
        &self,
        scope: &ListingScope,
        page: Option<String>,
        children: &[RawThing],
        next: Option<String>,
        header: Option<LinkToken>,
    ) -> LinkToken {
        let token = LinkHasher::of(&scope.base(page.clone()));
        self.store.fill_once(token, || {
            let (items, _) = self.listing_items(scope, children, next);
            Ok(Node::Listing(ListingNode {
                url: scope.url(page.as_deref()),
                title: scope.title(),
                header,
                items,
            }))
        })
    }

    /// Entries of one listing page, followed by a load-more node for the
    /// next page when there is one. Also returns that page's loader.
    pub fn listing_items(
        &self,
        scope: &ListingScope,
        children: &[RawThing],
        next: Option<String>,
    ) -> (Vec<LinkToken>, Option<Loader>) {
        let mut items: Vec<LinkToken> = children
            .iter()
            .map(|child| match child.kind.as_str() {
                KIND_POST => self.post(child, self.listing_sort, None),
                KIND_COMMENT => self.standalone_comment(child),
                other => self.unsupported(format!("{other} in listing"), child.data.clone()),
            })
            .collect();
        let residual = next.map(|after| scope.loader(Some(after)));
        if let Some(loader) = &residual {
            items.push(self.load_more(loader.clone(), None));
        }
        (items, residual)
    }

    pub fn wiki(&self, subreddit: &str, page: &str, thing: &RawThing) -> LinkToken {
        let subreddit = normalize_subreddit(subreddit);
        let page = page.trim_matches('/').to_lowercase();
        let token = LinkHasher::of(&Base::wiki(&subreddit, &page));
        self.store.fill_once(token, || {
            let raw: RawWikiPage = thing.parse().map_err(FillError::malformed)?;
            Ok(Node::Post(PostNode {
                kind: PostKind::Wiki,
                url: Some(paths::wiki_path(&subreddit, &page)),
                disallow_pivot: false,
                title: Some(page.clone()),
                body: self.format(&raw.content_md, &subreddit, "wiki"),
                author: raw.editor(),
                created: timestamp(raw.revision_date),
                score: None,
                stickied: false,
                locked: false,
                embed: None,
                parent: Some(subreddit_parent(&subreddit)),
                replies: None,
            }))
        })
    }

    pub fn about(&self, subreddit: &str, thing: &RawThing) -> LinkToken {
        let token = LinkHasher::of(&Base::about(subreddit));
        self.store.fill_once(token, || {
            let raw: RawSubreddit = thing.parse().map_err(FillError::malformed)?;
            let description = if raw.description.trim().is_empty() {
                &raw.public_description
            } else {
                &raw.description
            };
            let name = normalize_subreddit(&raw.display_name);
            Ok(Node::About(AboutNode {
                description: self.format(description, &name, "about"),
                subreddit: name,
                title: raw.title,
                subscribers: raw.subscribers,
                over18: raw.over18,
            }))
        })
    }

    pub fn moderators(&self, subreddit: &str, users: &[Value]) -> LinkToken {
        let subreddit = normalize_subreddit(subreddit);
        let token = LinkHasher::of(&Base::moderators(&subreddit));
        self.store.fill_once(token, || {
            let users = users
                .iter()
                .filter_map(|value| match serde_json::from_value::<RawUser>(value.clone()) {
                    Ok(user) => Some(UserEntry {
                        name: user.name,
                        permissions: user.mod_permissions,
                    }),
                    Err(e) => {
                        debug!(error = %e, "skipping malformed user entry");
                        None
                    }
                })
                .collect();
            Ok(Node::UserList(UserListNode {
                url: paths::moderators_path(&subreddit),
                title: format!("Moderators of r/{subreddit}"),
                users,
            }))
        })
    }

    pub fn unsupported(&self, discriminant: String, raw: Value) -> LinkToken {
        debug!(discriminant = %discriminant, "unsupported payload");
        self.store
            .insert_fresh("unsupported", Node::Unsupported { discriminant, raw })
    }

    fn format(&self, body: &str, subreddit: &str, kind: &str) -> Document {
        self.formatter
            .format(body, &FormatContext { subreddit, kind })
    }
}

fn post_ref_of(thing: &RawThing, sort: CommentSort) -> Option<PostRef> {
    let name = thing.name()?;
    let subreddit = thing.data.get("subreddit").and_then(Value::as_str)?;
    Some(PostRef::new(name, subreddit, sort))
}

fn subreddit_crumb(subreddit: &str) -> Crumb {
    Crumb {
        label: format!("r/{subreddit}"),
        url: paths::listing_path(subreddit, ListingSort::default(), None),
    }
}

fn subreddit_parent(subreddit: &str) -> ParentRef {
    ParentRef::Deferred {
        crumbs: vec![subreddit_crumb(subreddit)],
        loader: Loader::ListingPage {
            subreddit: subreddit.to_string(),
            sort: ListingSort::default(),
            after: None,
        },
    }
}

fn author(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.is_empty() && n != DELETED)
}

fn timestamp(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::<Utc>::from_timestamp(s as i64, 0))
}

fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Permalink of the thread a comment permalink points into.
fn parent_permalink(comment_permalink: &str) -> String {
    let trimmed = comment_permalink.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => trimmed[..=i].to_string(),
        None => ensure_trailing_slash(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PlainFormatter;
    use crate::node::Node;
    use serde_json::json;
    use strand_source::classify;
    use strand_store::InMemoryContentStore;
    use strand_types::NodeResult;

    fn listing(children: Vec<Value>, after: Option<&str>) -> Value {
        json!({"kind": "Listing", "data": {"children": children, "after": after}})
    }

    fn post_json(id: &str, sub: &str) -> Value {
        json!({"kind": "t3", "data": {
            "name": format!("t3_{id}"), "subreddit": sub, "title": format!("title {id}"),
            "selftext": "body", "author": "alice",
            "permalink": format!("/r/{sub}/comments/{id}/title_{id}/"),
            "created_utc": 1_700_000_000.0, "score": 10,
        }})
    }

    fn comment_json(id: &str, parent: &str, replies: Vec<Value>) -> Value {
        json!({"kind": "t1", "data": {
            "name": format!("t1_{id}"), "parent_id": parent, "body": format!("comment {id}"),
            "author": "bob", "permalink": format!("/r/rust/comments/p/title_p/{id}/"),
            "replies": if replies.is_empty() { json!("") } else { listing(replies, None) },
        }})
    }

    fn thread_json(comments: Vec<Value>) -> Value {
        json!([listing(vec![post_json("p", "rust")], None), listing(comments, None)])
    }

    fn thread_identity(focus: Option<&str>) -> Identity {
        Identity::Thread {
            post: PostRef::new("t3_p", "rust", CommentSort::default()),
            focus: focus.map(str::to_string),
        }
    }

    fn materialize(value: Value, identity: &Identity) -> (InMemoryContentStore<Node>, LinkToken) {
        materialize_sorted(value, identity, CommentSort::default())
    }

    fn materialize_sorted(
        value: Value,
        identity: &Identity,
        listing_sort: CommentSort,
    ) -> (InMemoryContentStore<Node>, LinkToken) {
        let store = InMemoryContentStore::new();
        let pivot = Materializer::new(&store, &PlainFormatter, listing_sort)
            .page(classify(value), identity, None);
        (store, pivot)
    }

    fn post_node(store: &InMemoryContentStore<Node>, token: &LinkToken) -> PostNode {
        store
            .get(token)
            .and_then(NodeResult::into_data)
            .and_then(|n| n.as_post().cloned())
            .expect("post node")
    }

    #[test]
    fn thread_wires_parents_and_replies() {
        let value = thread_json(vec![comment_json(
            "a",
            "t3_p",
            vec![comment_json("b", "t1_a", vec![])],
        )]);
        let (store, pivot) = materialize(value, &thread_identity(None));

        let post = post_node(&store, &pivot);
        assert_eq!(post.title.as_deref(), Some("title p"));
        assert_eq!(post.author.as_deref(), Some("alice"));
        assert!(post.created.is_some());
        let items = post.replies.expect("replies").items;
        assert_eq!(items.len(), 1);

        let a = post_node(&store, &items[0]);
        assert_eq!(a.parent, Some(ParentRef::Node(pivot)));
        let b_token = a.replies.expect("nested").items[0];
        assert_eq!(post_node(&store, &b_token).parent, Some(ParentRef::Node(items[0])));
        assert!(store.is_complete());
    }

    #[test]
    fn rematerializing_is_deterministic() {
        let value = thread_json(vec![comment_json("a", "t3_p", vec![])]);
        let (first, p1) = materialize(value.clone(), &thread_identity(None));
        let (second, p2) = materialize(value, &thread_identity(None));
        assert_eq!(p1, p2);
        assert_eq!(first.tokens(), second.tokens());
    }

    #[test]
    fn depth_and_breadth_continuations() {
        let depth = json!({"kind": "more", "data": {
            "parent_id": "t1_a", "children": [], "count": 0
        }});
        let breadth = json!({"kind": "more", "data": {
            "name": "t1_more", "parent_id": "t3_p", "children": ["x", "y"], "count": 2
        }});
        let value = thread_json(vec![comment_json("a", "t3_p", vec![depth]), breadth]);
        let (store, pivot) = materialize(value, &thread_identity(None));

        let items = post_node(&store, &pivot).replies.unwrap().items;
        let a = post_node(&store, &items[0]);
        let depth_node = store.get(&a.replies.unwrap().items[0]).unwrap().into_data().unwrap();
        let breadth_node = store.get(&items[1]).unwrap().into_data().unwrap();

        match depth_node.loader() {
            Some(Loader::ByPermalink {
                permalink, anchor, ..
            }) => {
                assert_eq!(permalink, "/r/rust/comments/p/title_p/a/");
                assert_eq!(anchor, "t1_a");
            }
            other => panic!("expected by_permalink, got {other:?}"),
        }
        match breadth_node.loader() {
            Some(Loader::ApiBatch {
                child_ids,
                parent_id,
                ..
            }) => {
                assert_eq!(child_ids, &vec!["x".to_string(), "y".to_string()]);
                assert_eq!(parent_id, "t3_p");
            }
            other => panic!("expected api_batch, got {other:?}"),
        }
    }

    #[test]
    fn malformed_child_is_isolated() {
        let mut comments: Vec<Value> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| comment_json(id, "t3_p", vec![]))
            .collect();
        // No body: the comment fails to parse but keeps its name.
        comments.insert(2, json!({"kind": "t1", "data": {"name": "t1_bad", "parent_id": "t3_p"}}));
        let (store, pivot) = materialize(thread_json(comments), &thread_identity(None));

        let items = post_node(&store, &pivot).replies.unwrap().items;
        let results: Vec<NodeResult<Node>> = items.iter().map(|t| store.get(t).unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_data()).count(), 4);
        assert_eq!(results.iter().filter(|r| r.is_error()).count(), 1);
        assert!(results[2].is_error());

        let bad = LinkHasher::of(&Base::comment(
            "t1_bad",
            PostRef::new("t3_p", "rust", CommentSort::default()),
        ));
        assert_eq!(items[2], bad);
    }

    #[test]
    fn nameless_child_gets_fresh_error_node() {
        let comments = vec![
            comment_json("a", "t3_p", vec![]),
            json!({"kind": "t1", "data": {"body": "orphan"}}),
        ];
        let (store, pivot) = materialize(thread_json(comments), &thread_identity(None));
        let items = post_node(&store, &pivot).replies.unwrap().items;
        assert!(store.get(&items[1]).unwrap().is_error());
    }

    #[test]
    fn crosspost_dedups_with_native_post() {
        let mut crosspost = post_json("x", "other");
        crosspost["data"]["crosspost_parent_list"] =
            json!([post_json("p", "rust")["data"].clone()]);
        let value = listing(vec![post_json("p", "rust"), crosspost], None);
        let identity = Identity::Subreddit {
            subreddit: "mixed".into(),
            sort: ListingSort::Hot,
            after: None,
        };
        let (store, pivot) = materialize(value, &identity);

        let native = LinkHasher::of(&Base::post("t3_p", "rust", CommentSort::default()));
        let Node::Listing(list) = store.get(&pivot).unwrap().into_data().unwrap() else {
            panic!("expected listing");
        };
        assert_eq!(list.items[0], native);
        assert_eq!(post_node(&store, &list.items[1]).embed, Some(native));
        // listing + native/original + crosspost
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn crosspost_dedups_under_listing_sort() {
        let mut crosspost = post_json("x", "other");
        crosspost["data"]["crosspost_parent_list"] =
            json!([post_json("p", "rust")["data"].clone()]);
        let value = listing(vec![post_json("p", "rust"), crosspost], None);
        let identity = Identity::Subreddit {
            subreddit: "mixed".into(),
            sort: ListingSort::Hot,
            after: None,
        };
        let (store, pivot) = materialize_sorted(value, &identity, CommentSort::New);

        let native = LinkHasher::of(&Base::post("t3_p", "rust", CommentSort::New));
        let Node::Listing(list) = store.get(&pivot).unwrap().into_data().unwrap() else {
            panic!("expected listing");
        };
        assert_eq!(list.items[0], native);
        assert_eq!(post_node(&store, &list.items[1]).embed, Some(native));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn listing_cursor_adds_load_more() {
        let value = listing(vec![post_json("a", "rust")], Some("t3_a"));
        let identity = Identity::Subreddit {
            subreddit: "rust".into(),
            sort: ListingSort::New,
            after: None,
        };
        let (store, pivot) = materialize(value, &identity);
        let Node::Listing(list) = store.get(&pivot).unwrap().into_data().unwrap() else {
            panic!("expected listing");
        };
        assert_eq!(list.url, "/r/rust/new");
        let more = store.get(&list.items[1]).unwrap().into_data().unwrap();
        assert_eq!(
            more.loader(),
            Some(&Loader::ListingPage {
                subreddit: "rust".into(),
                sort: ListingSort::New,
                after: Some("t3_a".into())
            })
        );
    }

    #[test]
    fn focused_comment_is_pivot_with_deferred_parent() {
        let value = thread_json(vec![comment_json("c", "t1_up", vec![])]);
        let (store, pivot) = materialize(value, &thread_identity(Some("t1_c")));
        let c = post_node(&store, &pivot);
        match c.parent {
            Some(ParentRef::Deferred {
                crumbs,
                loader: Loader::ByPermalink { anchor, permalink, .. },
            }) => {
                assert_eq!(anchor, "t1_up");
                assert_eq!(permalink, "/r/rust/comments/p/title_p/up/");
                assert_eq!(crumbs.len(), 2);
            }
            other => panic!("expected deferred parent, got {other:?}"),
        }
    }

    #[test]
    fn missing_focus_is_an_error_pivot() {
        let value = thread_json(vec![comment_json("a", "t3_p", vec![])]);
        let (store, pivot) = materialize(value, &thread_identity(Some("t1_gone")));
        assert!(store.get(&pivot).unwrap().is_error());
    }

    #[test]
    fn deleted_author_is_none() {
        let mut c = comment_json("a", "t3_p", vec![]);
        c["data"]["author"] = json!("[deleted]");
        let (store, pivot) = materialize(thread_json(vec![c]), &thread_identity(None));
        let items = post_node(&store, &pivot).replies.unwrap().items;
        assert_eq!(post_node(&store, &items[0]).author, None);
    }

    #[test]
    fn unsupported_payload_degrades() {
        let (store, pivot) = materialize(json!({"kind": "LabeledMulti"}), &thread_identity(None));
        let node = store.get(&pivot).unwrap().into_data().unwrap();
        assert!(matches!(
            node,
            Node::Unsupported { ref discriminant, .. } if discriminant == "LabeledMulti"
        ));
    }

    #[test]
    fn api_error_is_stored_at_derived_token() {
        let (store, pivot) = materialize(
            json!({"error": 403, "message": "Forbidden"}),
            &thread_identity(None),
        );
        assert_eq!(
            pivot,
            LinkHasher::of(&Base::post("t3_p", "rust", CommentSort::default()))
        );
        assert!(store.get(&pivot).unwrap().error().unwrap().contains("Forbidden"));
    }

    #[test]
    fn wiki_and_moderators() {
        let wiki = json!({"kind": "wikipage", "data": {
            "content_md": "intro\n\nmore", "revision_date": 1_700_000_000.0,
            "revision_by": {"data": {"name": "mod1"}}
        }});
        let identity = Identity::Wiki {
            subreddit: "rust".into(),
            page: "index".into(),
        };
        let (store, pivot) = materialize(wiki, &identity);
        let page = post_node(&store, &pivot);
        assert_eq!(page.url.as_deref(), Some("/r/rust/wiki/index"));
        assert_eq!(page.body.paragraphs.len(), 2);
        assert_eq!(page.author.as_deref(), Some("mod1"));

        let mods = json!({"kind": "UserList", "data": {"children": [
            {"name": "mod1", "mod_permissions": ["all"]},
            {"bogus": true}
        ]}});
        let identity = Identity::Moderators {
            subreddit: "rust".into(),
        };
        let (store, pivot) = materialize(mods, &identity);
        let Node::UserList(list) = store.get(&pivot).unwrap().into_data().unwrap() else {
            panic!("expected user list");
        };
        assert_eq!(list.users.len(), 1);
        assert_eq!(list.users[0].permissions, vec!["all".to_string()]);
    }

    #[test]
    fn user_listing_comments_have_deferred_parents() {
        let comment = json!({"kind": "t1", "data": {
            "name": "t1_u", "parent_id": "t3_p", "link_id": "t3_p", "subreddit": "Rust",
            "body": "mine", "link_title": "title p",
            "permalink": "/r/rust/comments/p/title_p/u/"
        }});
        let identity = Identity::User {
            name: "bob".into(),
            after: None,
        };
        let (store, pivot) = materialize(listing(vec![comment], None), &identity);
        let Node::Listing(list) = store.get(&pivot).unwrap().into_data().unwrap() else {
            panic!("expected listing");
        };
        let c = post_node(&store, &list.items[0]);
        match c.parent {
            Some(ParentRef::Deferred {
                loader: Loader::ByPermalink { permalink, anchor, .. },
                crumbs,
            }) => {
                assert_eq!(permalink, "/r/rust/comments/p/title_p/");
                assert_eq!(anchor, "t3_p");
                assert_eq!(crumbs[1].label, "title p");
            }
            other => panic!("expected deferred parent, got {other:?}"),
        }
    }

    #[test]
    fn parent_permalink_drops_last_segment() {
        assert_eq!(
            parent_permalink("/r/rust/comments/p/t/c/"),
            "/r/rust/comments/p/t/"
        );
    }
}
