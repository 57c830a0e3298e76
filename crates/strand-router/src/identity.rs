use serde::{Deserialize, Serialize};

use strand_types::{Base, ListingSort, PostRef};

use crate::paths;

/// What a routed path is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// A comment thread, optionally focused on one comment (fullname).
    Thread {
        post: PostRef,
        focus: Option<String>,
    },
    Subreddit {
        subreddit: String,
        sort: ListingSort,
        after: Option<String>,
    },
    About {
        subreddit: String,
    },
    Wiki {
        subreddit: String,
        page: String,
    },
    Moderators {
        subreddit: String,
    },
    User {
        name: String,
        after: Option<String>,
    },
    /// Redirect chain did not settle within the hop limit.
    RedirectLoop {
        path: String,
    },
    NotFound {
        path: String,
    },
}

impl Identity {
    /// Base of the entity this identity names, if it names one.
    ///
    /// Goes through the `Base` constructors so the same case-folding applies
    /// as when the entity is materialized.
    pub fn to_base(&self) -> Option<Base> {
        match self {
            Self::Thread { post, focus: None } => Some(Base::Post(post.clone())),
            Self::Thread {
                post,
                focus: Some(comment),
            } => Some(Base::comment(comment, post.clone())),
            Self::Subreddit {
                subreddit,
                sort,
                after,
            } => Some(Base::listing(subreddit, *sort, after.clone())),
            Self::About { subreddit } => Some(Base::about(subreddit)),
            Self::Wiki { subreddit, page } => Some(Base::wiki(subreddit, page)),
            Self::Moderators { subreddit } => Some(Base::moderators(subreddit)),
            Self::User { name, after } => Some(Base::user(name, after.clone())),
            Self::RedirectLoop { .. } | Self::NotFound { .. } => None,
        }
    }

    /// Canonical path for this identity.
    pub fn canonical_path(&self) -> String {
        match self {
            Self::Thread { post, focus } => paths::thread_path(post, focus.as_deref()),
            Self::Subreddit {
                subreddit,
                sort,
                after,
            } => paths::listing_path(subreddit, *sort, after.as_deref()),
            Self::About { subreddit } => paths::about_path(subreddit),
            Self::Wiki { subreddit, page } => paths::wiki_path(subreddit, page),
            Self::Moderators { subreddit } => paths::moderators_path(subreddit),
            Self::User { name, after } => paths::user_path(name, after.as_deref()),
            Self::RedirectLoop { path } | Self::NotFound { path } => path.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Thread { .. } => "thread",
            Self::Subreddit { .. } => "subreddit",
            Self::About { .. } => "about",
            Self::Wiki { .. } => "wiki",
            Self::Moderators { .. } => "moderators",
            Self::User { .. } => "user",
            Self::RedirectLoop { .. } => "redirect-loop",
            Self::NotFound { .. } => "not-found",
        }
    }
}
