use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use strand_ident::fresh_token;
use strand_types::{LinkToken, NodeResult};
use tracing::debug;

use crate::error::{FillError, StoreError, StoreResult};
use crate::traits::{ContentStore, FillObserver};

#[derive(Clone, Debug)]
enum Slot<T> {
    Pending,
    Filled(NodeResult<T>),
}

/// In-memory, HashMap-based content store.
///
/// One store is created per page load or loader execution. The `RwLock`
/// only lets a finished store cross threads and await points; construction
/// is single-threaded and no lock is held while a fill computation runs.
pub struct InMemoryContentStore<T> {
    slots: RwLock<HashMap<LinkToken, Slot<T>>>,
    observer: Option<Arc<dyn FillObserver<T>>>,
}

impl<T: Clone + Send + Sync> InMemoryContentStore<T> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            observer: None,
        }
    }

    /// Create a store that reports every successful fill to `observer`.
    pub fn with_observer(observer: Arc<dyn FillObserver<T>>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            observer: Some(observer),
        }
    }

    /// Number of entries, pending ones included.
    pub fn len(&self) -> usize {
        self.slots.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.read().expect("lock poisoned").is_empty()
    }

    /// Whether `token` is claimed but not yet filled.
    pub fn is_pending(&self, token: &LinkToken) -> bool {
        matches!(
            self.slots.read().expect("lock poisoned").get(token),
            Some(Slot::Pending)
        )
    }

    /// Sorted list of tokens still in flight.
    pub fn pending(&self) -> Vec<LinkToken> {
        let slots = self.slots.read().expect("lock poisoned");
        let mut tokens: Vec<LinkToken> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Pending))
            .map(|(token, _)| *token)
            .collect();
        tokens.sort();
        tokens
    }

    /// Returns `true` once no entry is pending.
    pub fn is_complete(&self) -> bool {
        self.pending().is_empty()
    }

    /// Sorted list of all tokens in the store.
    pub fn tokens(&self) -> Vec<LinkToken> {
        let slots = self.slots.read().expect("lock poisoned");
        let mut tokens: Vec<LinkToken> = slots.keys().copied().collect();
        tokens.sort();
        tokens
    }

    /// Count of `Data` and `Error` entries, in that order.
    pub fn counts(&self) -> (usize, usize) {
        let slots = self.slots.read().expect("lock poisoned");
        slots.values().fold((0, 0), |(data, errors), slot| match slot {
            Slot::Filled(NodeResult::Data(_)) => (data + 1, errors),
            Slot::Filled(NodeResult::Error(_)) => (data, errors + 1),
            Slot::Pending => (data, errors),
        })
    }

    /// Run `f` against the stored data of `token` without cloning it.
    pub fn with_data<R>(&self, token: &LinkToken, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slots = self.slots.read().expect("lock poisoned");
        match slots.get(token) {
            Some(Slot::Filled(NodeResult::Data(value))) => Some(f(value)),
            _ => None,
        }
    }

    fn store_result(&self, token: LinkToken, result: NodeResult<T>) {
        if let (Some(observer), NodeResult::Data(value)) = (&self.observer, &result) {
            observer.on_fill(token, value);
        }
        let mut slots = self.slots.write().expect("lock poisoned");
        let previous = slots.insert(token, Slot::Filled(result));
        assert!(
            matches!(previous, Some(Slot::Pending)),
            "token {token:?} written twice"
        );
    }
}

impl<T: Clone + Send + Sync> Default for InMemoryContentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> ContentStore<T> for InMemoryContentStore<T> {
    fn fill_once<F>(&self, token: LinkToken, compute: F) -> LinkToken
    where
        F: FnOnce() -> Result<T, FillError>,
    {
        {
            let mut slots = self.slots.write().expect("lock poisoned");
            match slots.get(&token) {
                Some(Slot::Filled(_)) => return token,
                Some(Slot::Pending) => {
                    debug!(token = %token.short_hex(), "fill requested while in flight");
                    return token;
                }
                None => {
                    slots.insert(token, Slot::Pending);
                }
            }
        }

        let result = match compute() {
            Ok(value) => NodeResult::Data(value),
            Err(e) => {
                debug!(token = %token.short_hex(), error = %e, "fill failed");
                NodeResult::Error(e.to_string())
            }
        };
        self.store_result(token, result);
        token
    }

    fn get(&self, token: &LinkToken) -> Option<NodeResult<T>> {
        match self.slots.read().expect("lock poisoned").get(token) {
            Some(Slot::Filled(result)) => Some(result.clone()),
            Some(Slot::Pending) | None => None,
        }
    }

    fn contains(&self, token: &LinkToken) -> bool {
        self.slots.read().expect("lock poisoned").contains_key(token)
    }

    fn create_error_node(&self, message: &str, debug_context: &str) -> LinkToken {
        let token = fresh_token(debug_context);
        debug!(token = %token.short_hex(), context = debug_context, "error node created");
        self.slots
            .write()
            .expect("lock poisoned")
            .insert(token, Slot::Pending);
        self.store_result(token, NodeResult::Error(message.to_string()));
        token
    }

    fn insert_fresh(&self, debug_label: &str, value: T) -> LinkToken {
        let token = fresh_token(debug_label);
        self.slots
            .write()
            .expect("lock poisoned")
            .insert(token, Slot::Pending);
        self.store_result(token, NodeResult::Data(value));
        token
    }

    fn absorb(&self, other: &Self) -> StoreResult<usize> {
        let incoming = other.slots.read().expect("lock poisoned").clone();
        if let Some(first) = incoming
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Pending))
            .map(|(token, _)| *token)
            .min()
        {
            let pending = incoming
                .values()
                .filter(|slot| matches!(slot, Slot::Pending))
                .count();
            return Err(StoreError::Incomplete { pending, first });
        }

        let mut slots = self.slots.write().expect("lock poisoned");
        let mut added = 0;
        for (token, slot) in incoming {
            if let std::collections::hash_map::Entry::Vacant(entry) = slots.entry(token) {
                entry.insert(slot);
                added += 1;
            }
        }
        debug!(added, "absorbed store");
        Ok(added)
    }
}

impl<T> std::fmt::Debug for InMemoryContentStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.slots.read().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("InMemoryContentStore")
            .field("entry_count", &count)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Mutex;
    use strand_ident::LinkHasher;
    use strand_types::{Base, CommentSort};

    fn token(id: &str) -> LinkToken {
        LinkHasher::of(&Base::post(id, "rust", CommentSort::default()))
    }

    // -----------------------------------------------------------------------
    // Fill-once
    // -----------------------------------------------------------------------

    #[test]
    fn fill_once_invokes_compute_once() {
        let store = InMemoryContentStore::<u32>::new();
        let calls = Cell::new(0);

        let first = store.fill_once(token("a"), || {
            calls.set(calls.get() + 1);
            Ok(1)
        });
        let second = store.fill_once(token("a"), || {
            calls.set(calls.get() + 1);
            Ok(2)
        });

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(store.get(&first), Some(NodeResult::Data(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_compute_is_stored_as_error() {
        let store = InMemoryContentStore::<u32>::new();
        let t = store.fill_once(token("bad"), || Err(FillError::malformed("no title")));
        assert_eq!(
            store.get(&t),
            Some(NodeResult::Error("malformed payload: no title".into()))
        );
        // The error is final: a later fill does not retry.
        store.fill_once(t, || Ok(5));
        assert!(store.get(&t).unwrap().is_error());
    }

    #[test]
    fn recursive_reference_sees_in_flight_token() {
        let store = InMemoryContentStore::<u32>::new();
        let a = token("a");
        let b = token("b");
        let inner_saw_pending = Cell::new(false);

        store.fill_once(a, || {
            store.fill_once(b, || {
                inner_saw_pending.set(store.is_pending(&a));
                let back = store.fill_once(a, || panic!("in-flight token recomputed"));
                assert_eq!(back, a);
                Ok(2)
            });
            Ok(1)
        });

        assert!(inner_saw_pending.get());
        assert_eq!(store.get(&a), Some(NodeResult::Data(1)));
        assert_eq!(store.get(&b), Some(NodeResult::Data(2)));
        assert!(store.is_complete());
    }

    #[test]
    fn pending_reads_as_none() {
        let store = InMemoryContentStore::<u32>::new();
        let a = token("a");
        store.fill_once(a, || {
            assert!(store.get(&a).is_none());
            assert!(store.contains(&a));
            Ok(1)
        });
    }

    #[test]
    #[should_panic(expected = "missing case")]
    fn panics_are_not_swallowed() {
        let store = InMemoryContentStore::<u32>::new();
        store.fill_once(token("a"), || panic!("missing case"));
    }

    // -----------------------------------------------------------------------
    // Fresh entries
    // -----------------------------------------------------------------------

    #[test]
    fn error_nodes_are_distinct() {
        let store = InMemoryContentStore::<u32>::new();
        let a = store.create_error_node("network error", "page");
        let b = store.create_error_node("network error", "page");
        assert_ne!(a, b);
        assert_eq!(store.get(&a).unwrap().error(), Some("network error"));
        assert_eq!(store.counts(), (0, 2));
    }

    #[test]
    fn insert_fresh_stores_data() {
        let store = InMemoryContentStore::<u32>::new();
        let t = store.insert_fresh("literal", 9);
        assert_eq!(store.with_data(&t, |v| *v + 1), Some(10));
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    #[test]
    fn absorb_adds_missing_entries_and_keeps_existing() {
        let long_lived = InMemoryContentStore::<u32>::new();
        long_lived.fill_once(token("a"), || Ok(1));

        let fragment = InMemoryContentStore::<u32>::new();
        fragment.fill_once(token("a"), || Ok(100));
        fragment.fill_once(token("b"), || Ok(2));

        assert_eq!(long_lived.absorb(&fragment), Ok(1));
        assert_eq!(long_lived.get(&token("a")), Some(NodeResult::Data(1)));
        assert_eq!(long_lived.get(&token("b")), Some(NodeResult::Data(2)));
    }

    #[test]
    fn absorb_refuses_incomplete_store() {
        let target = InMemoryContentStore::<u32>::new();
        let source = InMemoryContentStore::<u32>::new();
        let a = token("a");
        source.fill_once(a, || {
            let err = target.absorb(&source).unwrap_err();
            assert_eq!(err, StoreError::Incomplete { pending: 1, first: a });
            Ok(1)
        });
        assert!(target.is_empty());
    }

    // -----------------------------------------------------------------------
    // Observer
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(LinkToken, u32)>>);

    impl FillObserver<u32> for Recorder {
        fn on_fill(&self, token: LinkToken, value: &u32) {
            self.0.lock().unwrap().push((token, *value));
        }
    }

    #[test]
    fn observer_sees_data_fills_only() {
        let recorder = Arc::new(Recorder::default());
        let store = InMemoryContentStore::with_observer(recorder.clone());
        store.fill_once(token("a"), || Ok(1));
        store.fill_once(token("b"), || Err(FillError::Upstream("gone".into())));
        store.fill_once(token("a"), || Ok(3));

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(token("a"), 1)]);
    }

    // -----------------------------------------------------------------------
    // Misc
    // -----------------------------------------------------------------------

    #[test]
    fn get_batch_preserves_order() {
        let store = InMemoryContentStore::<u32>::new();
        store.fill_once(token("a"), || Ok(1));
        let results = store.get_batch(&[token("missing"), token("a")]);
        assert!(results[0].is_none());
        assert_eq!(results[1], Some(NodeResult::Data(1)));
    }

    #[test]
    fn tokens_are_sorted() {
        let store = InMemoryContentStore::<u32>::new();
        for id in ["a", "b", "c", "d"] {
            store.fill_once(token(id), || Ok(0));
        }
        let tokens = store.tokens();
        assert!(tokens.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn finished_store_is_shareable_across_threads() {
        let store = Arc::new(InMemoryContentStore::<u32>::new());
        let t = store.fill_once(token("shared"), || Ok(7));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.get(&t))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Some(NodeResult::Data(7)));
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryContentStore::<u32>::new();
        store.insert_fresh("x", 1);
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryContentStore"));
        assert!(debug.contains("entry_count"));
    }
}
