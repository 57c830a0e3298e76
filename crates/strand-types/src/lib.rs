//! Foundation types for Strand.
//!
//! This crate provides the identity and structural types shared by every
//! other Strand crate. It performs no hashing and no I/O.
//!
//! # Key Types
//!
//! - [`LinkToken`] — Opaque, comparable handle for a (possibly unfilled) graph node
//! - [`Base`] — Minimal structural identity of an entity
//! - [`PostRef`] — The identifying context every comment carries for its post
//! - [`NodeResult`] — `Data` or `Error`, stored once per token
//! - [`Loader`] — Serializable description of deferred continuation work

pub mod base;
pub mod error;
pub mod loader;
pub mod result;
pub mod sort;
pub mod token;

pub use base::{Base, PostRef};
pub use error::TypeError;
pub use loader::Loader;
pub use result::NodeResult;
pub use sort::{CommentSort, ListingSort};
pub use token::{LinkToken, TOKEN_LEN};
