//! Raw payloads and the transport seam for Strand.
//!
//! The remote API's responses are treated as a loosely-typed, versioned
//! union. [`classify`] inspects the discriminant of a response and sorts it
//! into a [`RawListing`]; anything unrecognized becomes
//! [`RawListing::Unsupported`] instead of an error.
//!
//! Fetching is behind the [`Transport`] trait. [`SessionTransport`] layers
//! an explicit, session-scoped [`RequestCache`] and a timeout over any
//! transport; [`FixtureTransport`] serves JSON files from disk.

pub mod cache;
pub mod error;
pub mod fixture;
pub mod raw;
pub mod transport;

pub use cache::{RequestCache, SessionTransport};
pub use error::{SourceError, SourceResult};
pub use fixture::FixtureTransport;
pub use raw::{
    classify, RawComment, RawListing, RawMore, RawPost, RawSubreddit, RawThing, RawTree, RawUser,
    RawWikiPage,
};
pub use transport::{Request, Transport};
