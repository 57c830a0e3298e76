//! URL round-trip validation.
//!
//! For every filled node that may be a pivot, the node's public URL is
//! routed back to a [`Base`] and the token derived from it is compared with
//! the token the node was stored under. A mismatch means the materializer
//! and the router disagree about an identity. Mismatches are logged and
//! recorded, never raised.
//!
//! [`Base`]: strand_types::Base

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use strand_ident::LinkHasher;
use strand_router::Router;
use strand_store::FillObserver;
use strand_types::LinkToken;

use crate::node::Node;

/// Outcome of validating one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The node has no pivot-eligible URL.
    Skipped,
    /// Another validation was running; this one did not run.
    Reentrant,
    Consistent,
    Mismatch,
}

/// A recorded mismatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub token: LinkToken,
    pub url: String,
    /// Token derived from the URL, when the URL routed to an entity.
    pub derived: Option<LinkToken>,
    pub reason: String,
}

/// Fill observer checking URL round trips.
pub struct Validator {
    router: Arc<dyn Router>,
    active: AtomicBool,
    checked: AtomicU64,
    findings: Mutex<Vec<Finding>>,
}

struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Validator {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self {
            router,
            active: AtomicBool::new(false),
            checked: AtomicU64::new(0),
            findings: Mutex::new(Vec::new()),
        }
    }

    /// Check that `node`'s URL leads back to `token`.
    pub fn validate(&self, token: LinkToken, node: &Node) -> Verdict {
        let Some(url) = node.pivot_url() else {
            return Verdict::Skipped;
        };
        if self.active.swap(true, Ordering::SeqCst) {
            return Verdict::Reentrant;
        }
        let _guard = ActiveGuard(&self.active);
        self.checked.fetch_add(1, Ordering::Relaxed);

        let (derived, reason) = match self.router.parse(url) {
            Ok(route) => match route.identity.to_base() {
                Some(base) => {
                    let derived = LinkHasher::of(&base);
                    if derived == token {
                        return Verdict::Consistent;
                    }
                    (Some(derived), format!("routes to {} {:?}", base.tag(), base))
                }
                None => (None, format!("routes to {}", route.identity.kind())),
            },
            Err(e) => (None, e.to_string()),
        };

        warn!(
            token = %token.short_hex(),
            kind = node.kind(),
            url,
            reason = %reason,
            "url does not round-trip to its node"
        );
        self.findings
            .lock()
            .expect("lock poisoned")
            .push(Finding {
                token,
                url: url.to_string(),
                derived,
                reason,
            });
        Verdict::Mismatch
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().expect("lock poisoned").clone()
    }

    /// Number of nodes actually checked.
    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Relaxed)
    }
}

impl FillObserver<Node> for Validator {
    fn on_fill(&self, token: LinkToken, value: &Node) {
        self.validate(token, value);
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("checked", &self.checked())
            .field("findings", &self.findings().len())
            .finish()
    }
}
