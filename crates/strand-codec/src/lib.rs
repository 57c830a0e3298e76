//! Opaque encoding for deferred-action descriptors.
//!
//! Loaders are handed to a UI layer as [`Opaque`] strings and fed back in
//! later. `decode(tag, encode(tag, x)) == x` holds structurally; the encoded
//! form is not promised to be canonical, so callers must never compare two
//! `Opaque` values to decide whether two descriptors are the same.

pub mod codec;
pub mod error;

pub use codec::{LoaderCodec, Opaque, CODEC_VERSION, MAX_PAYLOAD_SIZE};
pub use error::{CodecError, CodecResult};
