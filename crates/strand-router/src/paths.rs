//! Path validation and canonical path builders.
//!
//! Valid request paths:
//! - Must start with `/` once any scheme and host are stripped
//! - Must not contain whitespace, `\`, `<`, `>` or `"`
//! - Must not contain a `..` or `.` component

use std::collections::BTreeMap;

use strand_types::{CommentSort, ListingSort, PostRef};

use crate::error::{RouteError, RouteResult};

/// Characters that are forbidden anywhere in a request path.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\\', '<', '>', '"'];

/// Validate a request path (without query string).
pub fn validate_path(path: &str) -> RouteResult<()> {
    if !path.starts_with('/') {
        return Err(RouteError::InvalidPath {
            path: path.to_string(),
            reason: "must start with '/'".into(),
        });
    }

    for ch in FORBIDDEN_CHARS {
        if path.contains(*ch) {
            return Err(RouteError::InvalidPath {
                path: path.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }

    if path.split('/').any(|c| c == ".." || c == ".") {
        return Err(RouteError::InvalidPath {
            path: path.to_string(),
            reason: "must not contain '.' or '..' components".into(),
        });
    }

    Ok(())
}

/// Split a URL or path into its path and query parts, dropping any scheme,
/// host and fragment.
pub fn split_url(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let rest = match without_fragment.find("://") {
        Some(i) => {
            let after_scheme = &without_fragment[i + 3..];
            match after_scheme.find('/') {
                Some(j) => &after_scheme[j..],
                None => "/",
            }
        }
        None => without_fragment,
    };
    match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    }
}

/// Parse `a=1&b=2` into a sorted map. Later keys win.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Path segments, ignoring empty ones produced by leading, trailing or
/// doubled slashes.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn with_after(path: String, after: Option<&str>) -> String {
    match after {
        Some(cursor) => format!("{path}?after={cursor}"),
        None => path,
    }
}

/// `/r/<sub>/comments/<id>` with an optional focused comment, plus `?sort=`
/// when the post's sort is not the default.
pub fn thread_path(post: &PostRef, focus: Option<&str>) -> String {
    let mut path = format!("/r/{}/comments/{}", post.subreddit, post.id());
    if let Some(comment) = focus {
        let id = comment.strip_prefix(strand_types::base::COMMENT_PREFIX).unwrap_or(comment);
        path.push_str("/_/");
        path.push_str(id);
    }
    if !post.sort.is_default() {
        path.push_str("?sort=");
        path.push_str(post.sort.as_str());
    }
    path
}

/// Request path for a thread, without query. Sort travels as a query
/// parameter on the request.
pub fn thread_request_path(post: &PostRef) -> String {
    format!("/r/{}/comments/{}", post.subreddit, post.id())
}

pub fn listing_path(subreddit: &str, sort: ListingSort, after: Option<&str>) -> String {
    let path = if sort.is_default() {
        format!("/r/{subreddit}")
    } else {
        format!("/r/{subreddit}/{sort}")
    };
    with_after(path, after)
}

pub fn about_path(subreddit: &str) -> String {
    format!("/r/{subreddit}/about")
}

pub fn wiki_path(subreddit: &str, page: &str) -> String {
    format!("/r/{subreddit}/wiki/{page}")
}

pub fn moderators_path(subreddit: &str) -> String {
    format!("/r/{subreddit}/about/moderators")
}

pub fn user_path(name: &str, after: Option<&str>) -> String {
    with_after(format!("/user/{name}"), after)
}

/// Append `?sort=` to a permalink when the sort is not the default.
pub fn with_comment_sort(permalink: &str, sort: CommentSort) -> String {
    if sort.is_default() {
        permalink.to_string()
    } else {
        format!("{permalink}?sort={sort}")
    }
}
