//! Identity scheme for Strand.
//!
//! Maps an entity's minimal structural description ([`Base`]) to a
//! deterministic [`LinkToken`] using domain-separated BLAKE3 over a
//! canonical JSON encoding, and mints fresh tokens for values that have no
//! natural identity.
//!
//! [`Base`]: strand_types::Base
//! [`LinkToken`]: strand_types::LinkToken

pub mod canonical;
pub mod error;
pub mod fresh;
pub mod hasher;

pub use canonical::canonical_json;
pub use error::{IdentError, IdentResult};
pub use fresh::fresh_token;
pub use hasher::LinkHasher;
