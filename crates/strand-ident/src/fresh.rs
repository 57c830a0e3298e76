use std::sync::atomic::{AtomicU64, Ordering};

use strand_types::LinkToken;
use uuid::Uuid;

use crate::hasher::LinkHasher;

static FRESH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Mint a one-off token for a value with no natural identity (literals,
/// ad-hoc error nodes, loader nodes).
///
/// Every call returns a distinct token, even for the same label. The label
/// only feeds the digest to make tokens easier to correlate in logs.
pub fn fresh_token(debug_label: &str) -> LinkToken {
    let seq = FRESH_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut payload = Vec::with_capacity(8 + 16 + debug_label.len());
    payload.extend_from_slice(&seq.to_be_bytes());
    payload.extend_from_slice(Uuid::now_v7().as_bytes());
    payload.extend_from_slice(debug_label.as_bytes());
    LinkHasher::FRESH.hash("fresh", &payload)
}
