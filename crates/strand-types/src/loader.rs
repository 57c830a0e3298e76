use serde::{Deserialize, Serialize};

use crate::base::PostRef;
use crate::sort::{CommentSort, ListingSort};

/// Deferred work: a pure-data description of how to fetch the next
/// fragment of a graph.
///
/// Loaders carry only the context needed to issue the fetch and to reparent
/// what comes back. They are not identity-bearing: two equal loaders may
/// still live under two different tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loader {
    /// Breadth continuation: specific outstanding child ids under one parent.
    ApiBatch {
        link: PostRef,
        /// Fullname of the node the children hang under.
        parent_id: String,
        child_ids: Vec<String>,
        sort: CommentSort,
    },
    /// Depth continuation: re-fetch the thread anchored at a comment.
    ByPermalink {
        link: PostRef,
        permalink: String,
        /// Fullname of the comment the permalink is anchored at.
        anchor: String,
        /// Last already-known reply of the anchor; only later replies are new.
        after: Option<String>,
    },
    ListingPage {
        subreddit: String,
        sort: ListingSort,
        after: Option<String>,
    },
    UserPage {
        name: String,
        after: Option<String>,
    },
}

impl Loader {
    /// Stable tag used when encoding loaders for the UI layer.
    pub const CODEC_TAG: &'static str = "loader";

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiBatch { .. } => "api_batch",
            Self::ByPermalink { .. } => "by_permalink",
            Self::ListingPage { .. } => "listing_page",
            Self::UserPage { .. } => "user_page",
        }
    }

    /// Number of entities this loader promises, when known.
    pub fn pending_count(&self) -> Option<usize> {
        match self {
            Self::ApiBatch { child_ids, .. } => Some(child_ids.len()),
            Self::ByPermalink { .. } | Self::ListingPage { .. } | Self::UserPage { .. } => None,
        }
    }
}
