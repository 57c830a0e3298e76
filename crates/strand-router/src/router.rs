use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use strand_types::base::normalize_subreddit;
use strand_types::{CommentSort, ListingSort, PostRef};

use crate::error::{RouteError, RouteResult};
use crate::identity::Identity;
use crate::paths::{parse_query, segments, split_url, validate_path};

/// Redirects followed before a path is declared a loop.
pub const MAX_REDIRECT_HOPS: usize = 100;

/// Result of routing a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub identity: Identity,
    pub canonical_path: String,
}

/// Turns request paths into identities.
pub trait Router: Send + Sync {
    /// Route a path or absolute URL. Redirects are resolved internally.
    fn parse(&self, path: &str) -> RouteResult<Route>;
}

/// Table-driven router over the fixed path grammar, with a redirect table.
#[derive(Clone, Debug, Default)]
pub struct PathRouter {
    redirects: HashMap<String, String>,
}

impl PathRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect(mut self, from: impl AsRef<str>, to: impl Into<String>) -> Self {
        self.add_redirect(from, to);
        self
    }

    pub fn add_redirect(&mut self, from: impl AsRef<str>, to: impl Into<String>) {
        self.redirects.insert(redirect_key(from.as_ref()), to.into());
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects.len()
    }

    /// Follow the redirect table from `path`. Returns `None` when the chain
    /// is still redirecting after [`MAX_REDIRECT_HOPS`] hops.
    fn resolve(&self, path: &str, query: &str) -> Option<(String, String)> {
        let mut path = redirect_key(path);
        let mut query = query.to_string();
        for hop in 0..MAX_REDIRECT_HOPS {
            let Some(target) = self.redirects.get(&path) else {
                return Some((path, query));
            };
            let (next_path, next_query) = split_url(target);
            debug!(hop, from = %path, to = %next_path, "following redirect");
            path = redirect_key(next_path);
            if !next_query.is_empty() {
                query = next_query.to_string();
            }
        }
        if self.redirects.contains_key(&path) {
            None
        } else {
            Some((path, query))
        }
    }
}

impl Router for PathRouter {
    fn parse(&self, url: &str) -> RouteResult<Route> {
        let (path, query) = split_url(url);
        validate_path(path)?;
        let identity = match self.resolve(path, query) {
            Some((path, query)) => {
                validate_path(&path)?;
                route_identity(&path, &parse_query(&query))?
            }
            None => {
                warn!(path, hops = MAX_REDIRECT_HOPS, "redirect loop");
                Identity::RedirectLoop {
                    path: path.to_string(),
                }
            }
        };
        let canonical_path = identity.canonical_path();
        Ok(Route {
            identity,
            canonical_path,
        })
    }
}

fn redirect_key(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn comment_sort(query: &BTreeMap<String, String>) -> RouteResult<CommentSort> {
    match query.get("sort") {
        None => Ok(CommentSort::default()),
        Some(value) => CommentSort::from_str(value).map_err(|_| RouteError::InvalidQuery {
            key: "sort".into(),
            value: value.clone(),
        }),
    }
}

fn route_identity(path: &str, query: &BTreeMap<String, String>) -> RouteResult<Identity> {
    let after = query.get("after").filter(|a| !a.is_empty()).cloned();
    let segs = segments(path);
    let head = segs.first().map(|s| s.to_ascii_lowercase());

    let identity = match (head.as_deref(), &segs[..]) {
        (None, _) => Identity::Subreddit {
            subreddit: "popular".into(),
            sort: ListingSort::default(),
            after,
        },
        (Some("r"), [_, sub]) => Identity::Subreddit {
            subreddit: normalize_subreddit(sub),
            sort: ListingSort::default(),
            after,
        },
        (Some("r"), [_, sub, "about"]) => Identity::About {
            subreddit: normalize_subreddit(sub),
        },
        (Some("r"), [_, sub, "about", "moderators"]) => Identity::Moderators {
            subreddit: normalize_subreddit(sub),
        },
        (Some("r"), [_, sub, "wiki"]) => Identity::Wiki {
            subreddit: normalize_subreddit(sub),
            page: "index".into(),
        },
        (Some("r"), [_, sub, "wiki", page @ ..]) => Identity::Wiki {
            subreddit: normalize_subreddit(sub),
            page: page.join("/").to_lowercase(),
        },
        (Some("r"), [_, sub, "comments", id, rest @ ..]) if rest.len() <= 2 => Identity::Thread {
            post: PostRef::new(id, sub, comment_sort(query)?),
            focus: rest.get(1).map(|c| format!("{}{c}", strand_types::base::COMMENT_PREFIX)),
        },
        (Some("r"), [_, sub, sort]) => match ListingSort::from_str(&sort.to_ascii_lowercase()) {
            Ok(sort) => Identity::Subreddit {
                subreddit: normalize_subreddit(sub),
                sort,
                after,
            },
            Err(_) => Identity::NotFound {
                path: path.to_string(),
            },
        },
        (Some("u" | "user"), [_, name, ..]) => Identity::User {
            name: name.to_lowercase(),
            after,
        },
        _ => Identity::NotFound {
            path: path.to_string(),
        },
    };
    Ok(identity)
}
