use serde::Serialize;
use strand_types::{Base, LinkToken};

use crate::canonical::canonical_json;
use crate::error::IdentResult;

/// Domain-separated BLAKE3 hasher for link tokens.
///
/// Every digest is computed over `domain ":" tag ":" payload`. Derived
/// identities and fresh tokens use different domains, so a fresh token can
/// never collide with a token derived from a base.
pub struct LinkHasher {
    domain: &'static str,
}

impl LinkHasher {
    /// Hasher for tokens derived from entity bases.
    pub const LINK: Self = Self {
        domain: "strand-link-v1",
    };
    /// Hasher for one-off tokens.
    pub const FRESH: Self = Self {
        domain: "strand-fresh-v1",
    };

    /// Hash a tag and raw payload with domain separation.
    pub fn hash(&self, tag: &str, payload: &[u8]) -> LinkToken {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(tag.as_bytes());
        hasher.update(b":");
        hasher.update(payload);
        LinkToken::from_hash(*hasher.finalize().as_bytes())
    }

    /// Derive the token for `(tag, value)` from the canonical JSON of
    /// `value`. Pure: equal inputs always produce equal tokens.
    pub fn identity<T: Serialize + ?Sized>(tag: &str, value: &T) -> IdentResult<LinkToken> {
        let payload = canonical_json(value)?;
        Ok(Self::LINK.hash(tag, &payload))
    }

    /// Token of an entity base.
    pub fn of(base: &Base) -> LinkToken {
        match Self::identity(base.tag(), base) {
            Ok(token) => token,
            // Bases contain only strings, options and unit enums.
            Err(e) => unreachable!("base failed to serialize: {e}"),
        }
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
