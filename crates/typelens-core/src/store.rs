//! The lock-guarded store.
//!
//! One reentrancy-free read/write lock guards the node arena, both indices,
//! and the listener registry as a single unit. Everything else in the crate
//! goes through [`TypeCache::with_read`] and [`TypeCache::with_write`], so
//! the acquire/run/release pattern exists in exactly one place and the lock
//! is released on every exit path, including panics unwinding out of the
//! guarded body.

use parking_lot::RwLock;

use crate::events::{CacheUpdateListener, Events, NodeEvent, ReferenceEvent};
use crate::index::{FqnIndex, HashIndex};
use crate::instrument::CacheInstrumentation;
use crate::lookup::CacheLookup;
use crate::model::TypeArena;

/// Everything the lock guards: nodes, indices, listeners.
///
/// Read closures receive `&CacheState` and can query the arena and indices
/// directly; mutation is crate-internal, so no caller can hold a mutable
/// reference to a node outside a guarded body.
#[derive(Default)]
pub struct CacheState {
    pub(crate) arena: TypeArena,
    pub(crate) fqn_index: FqnIndex,
    pub(crate) hash_index: HashIndex,
    listeners: Vec<Box<dyn CacheUpdateListener>>,
}

impl CacheState {
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    pub fn fqn_index(&self) -> &FqnIndex {
        &self.fqn_index
    }

    pub fn hash_index(&self) -> &HashIndex {
        &self.hash_index
    }

    /// Dispatch a node event: indices first, then listeners, then the
    /// returned batch. Runs while the caller holds the write borrow, so
    /// observers see changes in a strictly serialized order.
    pub(crate) fn fire_node_event(&mut self, event: NodeEvent, events: &mut Events) {
        if let Some(node) = self.arena.get(event.id) {
            self.fqn_index.apply_node_event(&event, node);
            self.hash_index.apply_node_event(&event, node);
        }
        for listener in &mut self.listeners {
            listener.node_changed(&event);
        }
        events.node_events.push(event);
    }

    pub(crate) fn fire_reference_event(&mut self, event: ReferenceEvent, events: &mut Events) {
        for listener in &mut self.listeners {
            listener.reference_changed(&event);
        }
        events.reference_events.push(event);
    }
}

/// The type-graph cache.
///
/// At most one writer is active at any time; any number of readers may run
/// concurrently with each other but never with a writer.
#[derive(Default)]
pub struct TypeCache {
    state: RwLock<CacheState>,
}

impl TypeCache {
    pub fn new() -> Self {
        TypeCache::default()
    }

    /// Run `body` under the read lock.
    pub fn with_read<T>(&self, body: impl FnOnce(&CacheState) -> T) -> T {
        let guard = self.state.read();
        body(&guard)
    }

    /// Run `body` under the write lock.
    pub fn with_write<T>(&self, body: impl FnOnce(&mut CacheState) -> T) -> T {
        let mut guard = self.state.write();
        body(&mut guard)
    }

    /// Register a listener. Listeners are wired at initialization time and
    /// invoked synchronously under the write lock for every change.
    pub fn register_listener(&self, listener: Box<dyn CacheUpdateListener>) {
        self.with_write(|state| state.listeners.push(listener));
    }

    /// The read-only query surface.
    pub fn lookup(&self) -> CacheLookup<'_> {
        CacheLookup::new(self)
    }

    /// The instrumentation coordinator with the default search narrower.
    pub fn instrumentation(&self) -> CacheInstrumentation<'_> {
        CacheInstrumentation::new(self)
    }

    /// Number of nodes currently in the cache, stubs included.
    pub fn node_count(&self) -> usize {
        self.with_read(|state| state.arena.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NodeEventDetail, NodeEventKind};
    use crate::fragment::{ClassFragment, TypeFragment};
    use crate::model::Modifiers;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingListener {
        node_events: Arc<AtomicUsize>,
        reference_events: Arc<AtomicUsize>,
    }

    impl CacheUpdateListener for CountingListener {
        fn node_changed(&mut self, _event: &NodeEvent) {
            self.node_events.fetch_add(1, Ordering::SeqCst);
        }

        fn reference_changed(&mut self, _event: &ReferenceEvent) {
            self.reference_events.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn listener_sees_every_event_of_a_merge() {
        let cache = TypeCache::new();
        let node_events = Arc::new(AtomicUsize::new(0));
        let reference_events = Arc::new(AtomicUsize::new(0));
        cache.register_listener(Box::new(CountingListener {
            node_events: Arc::clone(&node_events),
            reference_events: Arc::clone(&reference_events),
        }));

        let mut class = ClassFragment::new("com.acme.Foo", "h1", Modifiers::PUBLIC);
        class.super_classes.push("java.lang.Object".into());
        let events = cache.merge(TypeFragment::Class(class)).unwrap();

        assert_eq!(node_events.load(Ordering::SeqCst), events.node_events.len());
        assert_eq!(
            reference_events.load(Ordering::SeqCst),
            events.reference_events.len()
        );
        assert!(!events
            .node_events_with(NodeEventKind::New, Some(NodeEventDetail::Initialized))
            .is_empty());
    }

    #[test]
    fn read_lock_exposes_indices() {
        let cache = TypeCache::new();
        cache
            .merge(TypeFragment::Class(ClassFragment::new(
                "com.acme.Foo",
                "h1",
                Modifiers::PUBLIC,
            )))
            .unwrap();

        let found = cache.with_read(|state| state.fqn_index().get("com.acme.Foo"));
        assert!(found.is_some());
        assert_eq!(cache.node_count(), 1);
    }
}
