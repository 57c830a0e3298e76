use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Digest length of a token, the size of a BLAKE3 output.
pub const TOKEN_LEN: usize = 32;

/// Key of one entry in a content store.
///
/// Derived tokens come from hashing a [`Base`](crate::Base), so two passes
/// that meet the same post or comment land on the same entry. Fresh tokens
/// are minted per value and never collide with a derived one. Nodes point
/// at each other only through tokens.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkToken([u8; TOKEN_LEN]);

impl LinkToken {
    /// Wrap the output of a token hasher.
    pub const fn from_hash(hash: [u8; TOKEN_LEN]) -> Self {
        Self(hash)
    }

    /// Full 64-character form, used in reports and opaque handles.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 8-character prefix for log fields.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let digest = <[u8; TOKEN_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
            TypeError::InvalidLength {
                expected: TOKEN_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(digest))
    }
}

impl FromStr for LinkToken {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl fmt::Debug for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkToken({})", self.short_hex())
    }
}

impl fmt::Display for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
