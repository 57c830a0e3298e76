use strand_types::LinkToken;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// A store still had in-flight entries when it was merged.
    #[error("store is incomplete: {pending} pending entries (first: {first:?})")]
    Incomplete { pending: usize, first: LinkToken },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a fill computation. Stored as the token's `Error` entry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FillError {
    /// The source payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The source payload described an error instead of an entity.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl FillError {
    pub fn malformed(message: impl std::fmt::Display) -> Self {
        Self::Malformed(message.to_string())
    }
}
