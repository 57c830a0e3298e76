use strand_types::{LinkToken, NodeResult};

use crate::error::{FillError, StoreResult};

/// Append-only, fill-once mapping from link tokens to results.
///
/// All implementations must satisfy these invariants:
/// - A token is written at most once.
/// - `fill_once` on a token that is filled or in flight returns the token
///   without invoking the computation.
/// - A pending slot is claimed before the computation runs.
pub trait ContentStore<T>: Send + Sync {
    /// Fill `token` with the outcome of `compute` unless it already has an
    /// entry. Always returns `token`.
    fn fill_once<F>(&self, token: LinkToken, compute: F) -> LinkToken
    where
        F: FnOnce() -> Result<T, FillError>;

    /// The stored result for `token`. In-flight and unknown tokens both
    /// read as `None`.
    fn get(&self, token: &LinkToken) -> Option<NodeResult<T>>;

    /// Whether `token` has an entry, filled or pending.
    fn contains(&self, token: &LinkToken) -> bool;

    /// Mint a fresh token and store `Error(message)` under it.
    fn create_error_node(&self, message: &str, debug_context: &str) -> LinkToken;

    /// Mint a fresh token and store `Data(value)` under it.
    fn insert_fresh(&self, debug_label: &str, value: T) -> LinkToken;

    /// Copy every entry of `other` that this store lacks. Existing entries
    /// win. Returns how many entries were added.
    fn absorb(&self, other: &Self) -> StoreResult<usize>
    where
        Self: Sized;

    /// Read several tokens at once.
    fn get_batch(&self, tokens: &[LinkToken]) -> Vec<Option<NodeResult<T>>> {
        tokens.iter().map(|token| self.get(token)).collect()
    }
}

/// Hook notified after every successful fill.
pub trait FillObserver<T>: Send + Sync {
    fn on_fill(&self, token: LinkToken, value: &T);
}
