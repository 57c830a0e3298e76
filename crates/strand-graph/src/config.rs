use serde::{Deserialize, Serialize};
use strand_types::CommentSort;

/// Behaviour switches for a [`GraphBuilder`](crate::GraphBuilder).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Attach the URL round-trip validator to every store.
    pub validate: bool,
    /// Fetch the subreddit sidebar alongside subreddit listings.
    pub fetch_sidebar: bool,
    /// Route sidebar, wiki and moderator requests through the request cache.
    pub cache_static: bool,
    /// Comment sort used for posts reached from listings.
    pub comment_sort: CommentSort,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            validate: cfg!(debug_assertions),
            fetch_sidebar: true,
            cache_static: true,
            comment_sort: CommentSort::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = GraphConfig::default();
        assert!(c.fetch_sidebar);
        assert!(c.cache_static);
        assert_eq!(c.comment_sort, CommentSort::Confidence);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let c: GraphConfig = serde_json::from_str(r#"{"comment_sort": "new"}"#).unwrap();
        assert_eq!(c.comment_sort, CommentSort::New);
        assert!(c.fetch_sidebar);
    }
}
