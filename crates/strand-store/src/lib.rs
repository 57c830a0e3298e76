//! Fill-once content storage for Strand.
//!
//! A content store maps [`LinkToken`]s to [`NodeResult`]s. Each token is
//! written at most once per store lifetime; later fills for the same token
//! are no-ops that hand back the token without running their computation.
//!
//! # Design Rules
//!
//! 1. A token's slot is claimed (marked pending) *before* its computation
//!    runs, so a computation that refers back to an in-flight token sees
//!    "already being computed" instead of recursing.
//! 2. Failures returned by a computation become `Error` entries. Panics are
//!    not caught: they indicate a missing case and abort the pass.
//! 3. No lock is held while a computation runs, so computations may fill
//!    other tokens in the same store.
//! 4. Merging stores never overwrites an existing entry.
//!
//! [`LinkToken`]: strand_types::LinkToken
//! [`NodeResult`]: strand_types::NodeResult

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{FillError, StoreError, StoreResult};
pub use memory::InMemoryContentStore;
pub use traits::{ContentStore, FillObserver};
