use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_types::{LinkToken, Loader};

use crate::format::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Post,
    Comment,
    Wiki,
}

/// Breadcrumb entry of a placeholder ancestor chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub label: String,
    pub url: String,
}

/// How a post-like node reaches its parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    /// The parent is a node of the same graph, or of the graph a fragment
    /// is merged into.
    Node(LinkToken),
    /// Only a breadcrumb trail is known; `loader` fetches the container.
    Deferred { crumbs: Vec<Crumb>, loader: Loader },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replies {
    /// Reply tokens in source order. The last one may be a load-more node.
    pub items: Vec<LinkToken>,
}

/// A post, comment or wiki page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostNode {
    pub kind: PostKind,
    /// Public URL. Validated against the node's own token unless
    /// `disallow_pivot` is set.
    pub url: Option<String>,
    pub disallow_pivot: bool,
    pub title: Option<String>,
    pub body: Document,
    /// `None` for deleted authors.
    pub author: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub stickied: bool,
    pub locked: bool,
    /// Embedded preview of a crossposted original.
    pub embed: Option<LinkToken>,
    pub parent: Option<ParentRef>,
    pub replies: Option<Replies>,
}

/// A page of posts or comments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingNode {
    pub url: String,
    pub title: String,
    /// Sidebar node, when it was fetched.
    pub header: Option<LinkToken>,
    /// Entries in source order. The last one may be a load-more node.
    pub items: Vec<LinkToken>,
}

/// A continuation that has not been fetched yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadMoreNode {
    pub loader: Loader,
    /// Entities behind the loader, when the source says.
    pub count: Option<u64>,
}

/// Subreddit sidebar data. Never a pivot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AboutNode {
    pub subreddit: String,
    pub title: String,
    pub description: Document,
    pub subscribers: Option<u64>,
    pub over18: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListNode {
    pub url: String,
    pub title: String,
    pub users: Vec<UserEntry>,
}

/// Value stored for every link token of a graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Post(PostNode),
    Listing(ListingNode),
    LoadMore(LoadMoreNode),
    About(AboutNode),
    UserList(UserListNode),
    /// Well-formed payload of a shape nothing handles, kept for diagnostics.
    Unsupported { discriminant: String, raw: Value },
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(post) => match post.kind {
                PostKind::Post => "post",
                PostKind::Comment => "comment",
                PostKind::Wiki => "wiki",
            },
            Self::Listing(_) => "listing",
            Self::LoadMore(_) => "load-more",
            Self::About(_) => "about",
            Self::UserList(_) => "user-list",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    /// URL whose route must lead back to this node, if the node may be a
    /// pivot.
    pub fn pivot_url(&self) -> Option<&str> {
        match self {
            Self::Post(post) if !post.disallow_pivot => post.url.as_deref(),
            Self::Listing(listing) => Some(&listing.url),
            Self::UserList(list) => Some(&list.url),
            Self::Post(_) | Self::LoadMore(_) | Self::About(_) | Self::Unsupported { .. } => None,
        }
    }

    /// Tokens this node points down to: replies, listing items, headers
    /// and embeds. Parents are not included.
    pub fn references(&self) -> Vec<LinkToken> {
        match self {
            Self::Post(post) => post
                .embed
                .iter()
                .copied()
                .chain(post.replies.iter().flat_map(|r| r.items.iter().copied()))
                .collect(),
            Self::Listing(listing) => listing
                .header
                .iter()
                .copied()
                .chain(listing.items.iter().copied())
                .collect(),
            Self::LoadMore(_) | Self::About(_) | Self::UserList(_) | Self::Unsupported { .. } => {
                Vec::new()
            }
        }
    }

    /// Parent token, when the parent is a graph node.
    pub fn parent_token(&self) -> Option<LinkToken> {
        match self {
            Self::Post(PostNode {
                parent: Some(ParentRef::Node(token)),
                ..
            }) => Some(*token),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&PostNode> {
        match self {
            Self::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn loader(&self) -> Option<&Loader> {
        match self {
            Self::LoadMore(more) => Some(&more.loader),
            _ => None,
        }
    }
}
