//! Error types for routing.

use thiserror::Error;

/// Errors raised for paths that cannot be routed at all.
///
/// Well-formed paths that match no route are not errors; they resolve to
/// [`Identity::NotFound`](crate::Identity::NotFound).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid query parameter {key}={value}")]
    InvalidQuery { key: String, value: String },
}

pub type RouteResult<T> = Result<T, RouteError>;
