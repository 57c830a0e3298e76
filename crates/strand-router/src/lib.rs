//! Path routing for Strand.
//!
//! A router turns a request path into a typed [`Identity`] plus the
//! canonical form of that path. The graph builder uses it twice: once to
//! decide what a page load is about, and again from the validator to check
//! that an entity's public URL leads back to the entity's own token.
//!
//! # Modules
//!
//! - [`error`] — Error types for routing
//! - [`identity`] — [`Identity`] and its conversion to a [`Base`]
//! - [`paths`] — Path validation and canonical path builders
//! - [`router`] — The [`Router`] trait and the table-driven [`PathRouter`]
//!
//! [`Base`]: strand_types::Base

pub mod error;
pub mod identity;
pub mod paths;
pub mod router;

pub use error::{RouteError, RouteResult};
pub use identity::Identity;
pub use paths::validate_path;
pub use router::{PathRouter, Route, Router, MAX_REDIRECT_HOPS};
