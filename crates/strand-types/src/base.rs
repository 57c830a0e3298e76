use serde::{Deserialize, Serialize};

use crate::sort::{CommentSort, ListingSort};

/// Prefix the remote API uses for post fullnames.
pub const POST_PREFIX: &str = "t3_";
/// Prefix the remote API uses for comment fullnames.
pub const COMMENT_PREFIX: &str = "t1_";

/// Identifying context of a post: enough to derive its token and to address
/// the remote thread it lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    /// Fullname, e.g. `t3_abc123`.
    pub fullname: String,
    /// Lowercased subreddit name.
    pub subreddit: String,
    /// Active comment sort.
    pub sort: CommentSort,
}

impl PostRef {
    /// Build a post reference. The subreddit name is case-folded and the
    /// fullname gains its `t3_` prefix if it was given bare.
    pub fn new(fullname: impl AsRef<str>, subreddit: impl AsRef<str>, sort: CommentSort) -> Self {
        Self {
            fullname: with_prefix(fullname.as_ref(), POST_PREFIX),
            subreddit: normalize_subreddit(subreddit.as_ref()),
            sort,
        }
    }

    /// The post id without its `t3_` prefix.
    pub fn id(&self) -> &str {
        self.fullname
            .strip_prefix(POST_PREFIX)
            .unwrap_or(&self.fullname)
    }

    /// The same post under a different comment sort.
    pub fn with_sort(&self, sort: CommentSort) -> Self {
        Self {
            sort,
            ..self.clone()
        }
    }
}

/// Minimal structural identity of an entity.
///
/// Two bases that compare equal always yield the same link token. Variants
/// carry contextual fields (the post a comment sits on, the subreddit a
/// wiki page belongs to) so that a raw id reused across namespaces never
/// aliases.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    Post(PostRef),
    Comment {
        fullname: String,
        on_post: PostRef,
    },
    SubredditListing {
        subreddit: String,
        sort: ListingSort,
        after: Option<String>,
    },
    SubredditAbout {
        subreddit: String,
    },
    WikiPage {
        subreddit: String,
        page: String,
    },
    Moderators {
        subreddit: String,
    },
    UserListing {
        name: String,
        after: Option<String>,
    },
}

impl Base {
    /// Discriminating tag mixed into the identity hash.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::Comment { .. } => "comment",
            Self::SubredditListing { .. } => "subreddit-listing",
            Self::SubredditAbout { .. } => "subreddit-about",
            Self::WikiPage { .. } => "wiki-page",
            Self::Moderators { .. } => "moderators",
            Self::UserListing { .. } => "user-listing",
        }
    }

    pub fn post(fullname: impl AsRef<str>, subreddit: impl AsRef<str>, sort: CommentSort) -> Self {
        Self::Post(PostRef::new(fullname, subreddit, sort))
    }

    pub fn comment(fullname: impl AsRef<str>, on_post: PostRef) -> Self {
        Self::Comment {
            fullname: with_prefix(fullname.as_ref(), COMMENT_PREFIX),
            on_post,
        }
    }

    pub fn listing(subreddit: impl AsRef<str>, sort: ListingSort, after: Option<String>) -> Self {
        Self::SubredditListing {
            subreddit: normalize_subreddit(subreddit.as_ref()),
            sort,
            after,
        }
    }

    pub fn about(subreddit: impl AsRef<str>) -> Self {
        Self::SubredditAbout {
            subreddit: normalize_subreddit(subreddit.as_ref()),
        }
    }

    pub fn wiki(subreddit: impl AsRef<str>, page: impl AsRef<str>) -> Self {
        Self::WikiPage {
            subreddit: normalize_subreddit(subreddit.as_ref()),
            page: page.as_ref().trim_matches('/').to_lowercase(),
        }
    }

    pub fn moderators(subreddit: impl AsRef<str>) -> Self {
        Self::Moderators {
            subreddit: normalize_subreddit(subreddit.as_ref()),
        }
    }

    pub fn user(name: impl AsRef<str>, after: Option<String>) -> Self {
        Self::UserListing {
            name: name.as_ref().to_lowercase(),
            after,
        }
    }

    /// Base of the entity a fullname refers to, in the context of `post`.
    ///
    /// Returns `None` for fullnames that are neither posts nor comments.
    pub fn from_fullname(fullname: &str, post: &PostRef) -> Option<Self> {
        if fullname.starts_with(COMMENT_PREFIX) {
            Some(Self::comment(fullname, post.clone()))
        } else if fullname == post.fullname {
            Some(Self::Post(post.clone()))
        } else {
            None
        }
    }
}

/// Case-fold a subreddit name and strip an `r/` prefix.
pub fn normalize_subreddit(name: &str) -> String {
    let trimmed = name.trim().trim_matches('/');
    let bare = trimmed
        .strip_prefix("r/")
        .or_else(|| trimmed.strip_prefix("R/"))
        .unwrap_or(trimmed);
    bare.to_lowercase()
}

fn with_prefix(id: &str, prefix: &str) -> String {
    if id.starts_with(prefix) {
        id.to_string()
    } else {
        format!("{prefix}{id}")
    }
}
