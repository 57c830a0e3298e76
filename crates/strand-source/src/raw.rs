//! Loosely-typed raw payloads and their classification.
//!
//! Responses are kept as `serde_json::Value` until the materializer needs a
//! specific entity, at which point the `data` object of a [`RawThing`] is
//! parsed into one of the typed views below. Parsing failures stay local to
//! that one entity.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Remote kind tag of a comment.
pub const KIND_COMMENT: &str = "t1";
/// Remote kind tag of a post.
pub const KIND_POST: &str = "t3";
/// Remote kind tag of a subreddit.
pub const KIND_SUBREDDIT: &str = "t5";
/// Remote kind tag of a continuation marker.
pub const KIND_MORE: &str = "more";

/// One `{kind, data}` envelope from a listing.
#[derive(Clone, Debug, PartialEq)]
pub struct RawThing {
    pub kind: String,
    pub data: Value,
}

impl RawThing {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Unwrap an envelope. Anything that is not `{kind: string, data: ..}`
    /// becomes a thing with an empty kind carrying the original value.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => match (map.remove("kind"), map.remove("data")) {
                (Some(Value::String(kind)), Some(data)) => Self { kind, data },
                (kind, data) => {
                    if let Some(kind) = kind {
                        map.insert("kind".into(), kind);
                    }
                    if let Some(data) = data {
                        map.insert("data".into(), data);
                    }
                    Self::new("", Value::Object(map))
                }
            },
            other => Self::new("", other),
        }
    }

    /// The entity's fullname (`t1_..`, `t3_..`), if it declares one.
    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    /// Fullname of the declared parent, if any.
    pub fn parent_id(&self) -> Option<&str> {
        self.data.get("parent_id").and_then(Value::as_str)
    }

    pub fn is_more(&self) -> bool {
        self.kind == KIND_MORE
    }

    /// Parse the `data` object into a typed view.
    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.data)
    }

    /// Children of the nested `replies` listing. An empty string (the remote
    /// API's "no replies") or any other shape yields no children.
    pub fn nested_replies(&self) -> Vec<RawThing> {
        self.data
            .get("replies")
            .map(listing_children)
            .unwrap_or_default()
    }
}

/// A thing together with the replies attached to it, either nested in the
/// original payload or reparented from a flat batch.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTree {
    pub thing: RawThing,
    pub replies: Vec<RawTree>,
}

impl RawTree {
    pub fn leaf(thing: RawThing) -> Self {
        Self {
            thing,
            replies: Vec::new(),
        }
    }

    /// Build a tree from a thing whose replies are nested inside its data.
    pub fn from_nested(thing: RawThing) -> Self {
        let replies = thing
            .nested_replies()
            .into_iter()
            .map(Self::from_nested)
            .collect();
        Self { thing, replies }
    }
}

/// A classified response.
#[derive(Clone, Debug, PartialEq)]
pub enum RawListing {
    /// `[post listing, comment listing]` as returned for a thread permalink.
    Thread { post: RawThing, comments: Vec<RawTree> },
    /// A page of posts or comments.
    Listing {
        children: Vec<RawThing>,
        after: Option<String>,
        before: Option<String>,
    },
    Wiki(RawThing),
    /// Subreddit sidebar data (`t5`).
    About(RawThing),
    UserList(Vec<Value>),
    /// Flat result of a batched children fetch.
    MoreChildren(Vec<RawThing>),
    /// The remote answered with an error document.
    ApiError(String),
    Unsupported { discriminant: String, raw: Value },
}

impl RawListing {
    /// Short name of the classified shape, for logs.
    pub fn discriminant(&self) -> &str {
        match self {
            Self::Thread { .. } => "thread",
            Self::Listing { .. } => "listing",
            Self::Wiki(_) => "wikipage",
            Self::About(_) => "about",
            Self::UserList(_) => "user-list",
            Self::MoreChildren(_) => "more-children",
            Self::ApiError(_) => "api-error",
            Self::Unsupported { discriminant, .. } => discriminant,
        }
    }
}

/// Sort a raw response into a [`RawListing`] by its discriminant.
///
/// Never fails: well-formed but unrecognized input becomes
/// [`RawListing::Unsupported`] carrying the original payload.
pub fn classify(value: Value) -> RawListing {
    match value {
        Value::Array(items) => classify_array(items),
        Value::Object(map) => classify_object(map),
        other => RawListing::Unsupported {
            discriminant: json_type(&other).to_string(),
            raw: other,
        },
    }
}

fn classify_array(items: Vec<Value>) -> RawListing {
    let is_pair = items.len() == 2 && items.iter().all(is_listing);
    if !is_pair {
        return RawListing::Unsupported {
            discriminant: "array".into(),
            raw: Value::Array(items),
        };
    }
    let mut posts = listing_children(&items[0]);
    let comments = listing_children(&items[1]);
    if posts.is_empty() {
        return RawListing::Unsupported {
            discriminant: "thread-without-post".into(),
            raw: Value::Array(items),
        };
    }
    RawListing::Thread {
        post: posts.swap_remove(0),
        comments: comments.into_iter().map(RawTree::from_nested).collect(),
    }
}

fn classify_object(map: Map<String, Value>) -> RawListing {
    if let Some(json) = map.get("json") {
        return classify_api_envelope(json);
    }
    if let (Some(code), Some(message)) = (map.get("error"), map.get("message")) {
        return RawListing::ApiError(format!(
            "{} {}",
            code,
            message.as_str().unwrap_or_default()
        ));
    }

    let kind = map.get("kind").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "Listing" => {
            let value = Value::Object(map);
            RawListing::Listing {
                children: listing_children(&value),
                after: cursor(&value, "after"),
                before: cursor(&value, "before"),
            }
        }
        "wikipage" | KIND_SUBREDDIT => {
            let kind = kind.to_string();
            let thing = RawThing::from_value(Value::Object(map));
            if kind == KIND_SUBREDDIT {
                RawListing::About(thing)
            } else {
                RawListing::Wiki(thing)
            }
        }
        "UserList" => {
            let users = map
                .get("data")
                .and_then(|d| d.get("children"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            RawListing::UserList(users)
        }
        "" => RawListing::Unsupported {
            discriminant: "object".into(),
            raw: Value::Object(map),
        },
        other => RawListing::Unsupported {
            discriminant: other.to_string(),
            raw: Value::Object(map),
        },
    }
}

fn classify_api_envelope(json: &Value) -> RawListing {
    let errors: Vec<String> = json
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| errors.iter().map(|e| e.to_string()).collect())
        .unwrap_or_default();
    if !errors.is_empty() {
        return RawListing::ApiError(errors.join("; "));
    }
    match json
        .get("data")
        .and_then(|d| d.get("things"))
        .and_then(Value::as_array)
    {
        Some(things) => RawListing::MoreChildren(
            things.iter().cloned().map(RawThing::from_value).collect(),
        ),
        None => RawListing::Unsupported {
            discriminant: "json-envelope".into(),
            raw: json.clone(),
        },
    }
}

fn is_listing(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some("Listing")
}

fn listing_children(value: &Value) -> Vec<RawThing> {
    value
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
        .map(|children| children.iter().cloned().map(RawThing::from_value).collect())
        .unwrap_or_default()
}

fn cursor(value: &Value, key: &str) -> Option<String> {
    value
        .get("data")
        .and_then(|d| d.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct RawPost {
    pub name: String,
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<u64>,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub crosspost_parent_list: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawComment {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub link_id: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
    pub body: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub score_hidden: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawMore {
    #[serde(default)]
    pub name: Option<String>,
    pub parent_id: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawWikiPage {
    pub content_md: String,
    #[serde(default)]
    pub revision_by: Option<Value>,
    #[serde(default)]
    pub revision_date: Option<f64>,
}

impl RawWikiPage {
    /// Name of the last editor, if the payload carries one.
    pub fn editor(&self) -> Option<String> {
        self.revision_by
            .as_ref()
            .and_then(|by| by.get("data"))
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawSubreddit {
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub public_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub over18: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawUser {
    pub name: String,
    #[serde(default)]
    pub mod_permissions: Vec<String>,
}
