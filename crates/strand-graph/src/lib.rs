//! Graph building for Strand.
//!
//! A [`GraphBuilder`] turns a request path into a [`Graph`]: a completed
//! content store plus the token of the page's pivot. Continuations found
//! while materializing become load-more nodes carrying a [`Loader`]; the
//! builder executes those later into a [`Fragment`] the caller merges into
//! the store it already holds.
//!
//! # Modules
//!
//! - [`batch`] — Batch splitting, reparenting and residual continuations
//! - [`config`] — Builder configuration
//! - [`error`] — Error types for graph building
//! - [`execute`] — Loader execution into fragments
//! - [`format`] — Body formatting seam
//! - [`materialize`] — Raw payloads to nodes
//! - [`node`] — Node types stored in the graph
//! - [`page`] — Page loads
//! - [`validate`] — URL round-trip validation
//!
//! [`Loader`]: strand_types::Loader

pub mod batch;
pub mod config;
pub mod error;
pub mod execute;
pub mod format;
pub mod materialize;
pub mod node;
pub mod page;
pub mod validate;

#[cfg(test)]
mod testing;

pub use batch::BATCH_CAP;
pub use config::GraphConfig;
pub use error::{GraphError, GraphResult};
pub use execute::{encode_loader, Fragment};
pub use format::{Document, FormatContext, Formatter, PlainFormatter};
pub use materialize::{ListingScope, Materializer, ThreadContext};
pub use node::{
    AboutNode, Crumb, ListingNode, LoadMoreNode, Node, ParentRef, PostKind, PostNode, Replies,
    UserEntry, UserListNode,
};
pub use page::{describe_fetch_error, page_request, Graph, GraphBuilder};
pub use validate::{Finding, Validator, Verdict};
