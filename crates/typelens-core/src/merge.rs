//! Incremental one-level merge of type fragments into the graph.
//!
//! Fragments only ever carry direct associations (a class knows its direct
//! superclass, not its ancestry), so reference resolution wires exactly one
//! level and never walks further than the fragment itself claims. A
//! referenced FQN unknown to the cache becomes an uninitialized stub node,
//! filled in when its own fragment eventually arrives.

use std::collections::BTreeSet;

use tracing::warn;

use crate::error::ModificationError;
use crate::events::{
    Events, NodeEvent, NodeEventDetail, NodeEventKind, ReferenceEvent, ReferenceRelation,
};
use crate::fragment::{MethodFragment, TypeFragment};
use crate::model::{MethodNode, TypeId, TypeKind, TypeKindTag};
use crate::store::{CacheState, TypeCache};

/// Expected kind of a referred type, by reference position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferredKind {
    /// Superclass or method exception: must be a class.
    Class,
    /// Superinterface: must be an interface.
    Interface,
    /// Type or method annotation: must be an annotation.
    Annotation,
    /// Realized interface: interface or annotation acting as one.
    AnyInterface,
}

impl ReferredKind {
    fn accepts(self, tag: TypeKindTag) -> bool {
        match self {
            ReferredKind::Class => tag == TypeKindTag::Class,
            ReferredKind::Interface => tag == TypeKindTag::Interface,
            ReferredKind::Annotation => tag == TypeKindTag::Annotation,
            ReferredKind::AnyInterface => {
                matches!(tag, TypeKindTag::Interface | TypeKindTag::Annotation)
            }
        }
    }

    /// Kind of the stub created when the referred FQN is unknown.
    fn stub_tag(self) -> TypeKindTag {
        match self {
            ReferredKind::Class => TypeKindTag::Class,
            ReferredKind::Interface | ReferredKind::AnyInterface => TypeKindTag::Interface,
            ReferredKind::Annotation => TypeKindTag::Annotation,
        }
    }
}

impl TypeCache {
    /// Merge one observed type fragment into the graph.
    ///
    /// Validation happens before the write lock is taken; a rejected
    /// fragment leaves the graph untouched. All change events produced by
    /// the merge are dispatched synchronously to listeners and returned.
    pub fn merge(&self, fragment: TypeFragment) -> Result<Events, ModificationError> {
        if fragment.fqn().is_empty() {
            return Err(ModificationError::MissingFqn);
        }
        if !fragment.is_initialized() {
            return Err(ModificationError::not_initialized(fragment.fqn()));
        }
        Ok(self.with_write(|state| merge_fragment(state, &fragment)))
    }
}

fn merge_fragment(state: &mut CacheState, given: &TypeFragment) -> Events {
    let mut events = Events::new();

    let mut existing = state.fqn_index.get(given.fqn());
    if let Some(id) = existing {
        enum Known {
            Missing,
            AlreadySeen,
            KindChanged,
            Mergeable,
        }
        let known = match state.arena.get(id) {
            None => Known::Missing,
            Some(node) => {
                if given.hashes().iter().any(|h| node.hashes.contains(h)) {
                    // Re-observation of a known bytecode version: done.
                    Known::AlreadySeen
                } else if node.kind_tag() != given.kind_tag()
                    && !(given.kind_tag() == TypeKindTag::Annotation
                        && node.kind_tag() == TypeKindTag::Interface)
                {
                    // The FQN changed its kind (e.g. was a class, now is an
                    // interface). The annotation-over-interface case is the
                    // sanctioned exception, handled below.
                    Known::KindChanged
                } else {
                    Known::Mergeable
                }
            }
        };
        match known {
            Known::AlreadySeen => return events,
            Known::KindChanged => {
                remove_due_to_kind_change(state, id, &mut events);
                existing = None;
            }
            Known::Missing => existing = None,
            Known::Mergeable => {}
        }
    }

    match existing {
        None => {
            let id = insert_fragment(state, given);
            state.fire_node_event(
                NodeEvent::new(
                    id,
                    given.fqn(),
                    NodeEventKind::New,
                    Some(NodeEventDetail::Initialized),
                ),
                &mut events,
            );
            resolve_references(state, id, given, &mut events);
        }
        Some(id) => {
            let existing_tag = state.arena.get(id).map(|n| n.kind_tag());
            if given.kind_tag() == TypeKindTag::Annotation
                && existing_tag == Some(TypeKindTag::Interface)
            {
                merge_annotation_as_interface(state, id, given, &mut events);
            } else {
                merge_onto_existing(state, id, given, &mut events);
            }
        }
    }

    events
}

/// Insert a node carrying the fragment's own data. Methods come along with
/// empty reference sets; resolution fills them in afterwards.
fn insert_fragment(state: &mut CacheState, given: &TypeFragment) -> TypeId {
    let id = state
        .arena
        .alloc(given.fqn(), TypeKind::empty(given.kind_tag()));
    if let Some(node) = state.arena.get_mut(id) {
        node.hashes.extend(given.hashes().iter().cloned());
        node.modifiers = given.modifiers();
        *node.methods_mut() = given.methods().iter().map(convert_method).collect();
    }
    id
}

fn convert_method(fragment: &MethodFragment) -> MethodNode {
    MethodNode {
        name: fragment.name.clone(),
        parameter_types: fragment.parameter_types.clone(),
        return_type: fragment.return_type.clone(),
        modifiers: fragment.modifiers,
        annotations: BTreeSet::new(),
        exceptions: BTreeSet::new(),
        instrumentation: None,
    }
}

/// Wire all direct references of a freshly inserted node, one level deep.
fn resolve_references(state: &mut CacheState, id: TypeId, given: &TypeFragment, events: &mut Events) {
    for annotation in given.annotations() {
        add_annotation(state, id, &annotation.fqn, events);
    }

    for (index, method) in given.methods().iter().enumerate() {
        resolve_method_references(state, id, index, method, events);
    }

    match given {
        TypeFragment::Class(class) => {
            for super_class in &class.super_classes {
                add_superclass(state, id, &super_class.fqn, events);
            }
            for interface in &class.realized_interfaces {
                add_realized_interface(state, id, &interface.fqn, events);
            }
        }
        TypeFragment::Interface(interface) => {
            for super_interface in &interface.super_interfaces {
                add_super_interface(state, id, &super_interface.fqn, events);
            }
        }
        // Annotation elements carry no further references of their own.
        TypeFragment::Annotation(_) => {}
    }
}

fn add_annotation(state: &mut CacheState, id: TypeId, fqn: &str, events: &mut Events) {
    let target = get_or_add_referred(state, fqn, ReferredKind::Annotation, events);
    state.fire_reference_event(
        ReferenceEvent {
            from: id,
            to: target,
            relation: ReferenceRelation::Annotation,
        },
        events,
    );
    state.arena.link_annotation(id, target);
}

fn add_superclass(state: &mut CacheState, id: TypeId, fqn: &str, events: &mut Events) {
    let target = get_or_add_referred(state, fqn, ReferredKind::Class, events);
    state.fire_reference_event(
        ReferenceEvent {
            from: id,
            to: target,
            relation: ReferenceRelation::Superclass,
        },
        events,
    );
    state.arena.link_superclass(id, target);
}

fn add_realized_interface(state: &mut CacheState, id: TypeId, fqn: &str, events: &mut Events) {
    let target = get_or_add_referred(state, fqn, ReferredKind::AnyInterface, events);
    state.fire_reference_event(
        ReferenceEvent {
            from: id,
            to: target,
            relation: ReferenceRelation::RealizeInterface,
        },
        events,
    );
    state.arena.link_realized_interface(id, target);
}

fn add_super_interface(state: &mut CacheState, id: TypeId, fqn: &str, events: &mut Events) {
    let target = get_or_add_referred(state, fqn, ReferredKind::Interface, events);
    state.fire_reference_event(
        ReferenceEvent {
            from: id,
            to: target,
            relation: ReferenceRelation::SuperInterface,
        },
        events,
    );
    state.arena.link_super_interface(id, target);
}

/// Resolve annotation and exception references of the method at `index` on
/// `owner`. Method references fire no reference events; only newly created
/// stubs are announced.
fn resolve_method_references(
    state: &mut CacheState,
    owner: TypeId,
    index: usize,
    method: &MethodFragment,
    events: &mut Events,
) {
    for annotation in &method.annotations {
        let target = get_or_add_referred(state, &annotation.fqn, ReferredKind::Annotation, events);
        if let Some(node) = state.arena.get_mut(owner) {
            if let Some(entry) = node.methods_mut().get_mut(index) {
                entry.annotations.insert(target);
            }
        }
        state.arena.note_annotation_ref(target, owner);
    }
    for exception in &method.exceptions {
        let target = get_or_add_referred(state, &exception.fqn, ReferredKind::Class, events);
        if let Some(node) = state.arena.get_mut(owner) {
            if let Some(entry) = node.methods_mut().get_mut(index) {
                entry.exceptions.insert(target);
            }
        }
        state.arena.note_exception_ref(target, owner);
    }
}

/// Look up a referred FQN; add an uninitialized stub when unknown. A known
/// node of an incompatible kind is removed and replaced by a fresh stub.
/// The incoming reference's own data is never merged here.
fn get_or_add_referred(
    state: &mut CacheState,
    fqn: &str,
    expected: ReferredKind,
    events: &mut Events,
) -> TypeId {
    if let Some(id) = state.fqn_index.get(fqn) {
        if let Some(node) = state.arena.get(id) {
            if expected.accepts(node.kind_tag()) {
                return id;
            }
        }
        remove_due_to_kind_change(state, id, events);
    }
    let id = state.arena.alloc(fqn, TypeKind::empty(expected.stub_tag()));
    state.fire_node_event(
        NodeEvent::new(
            id,
            fqn,
            NodeEventKind::New,
            Some(NodeEventDetail::NotInitialized),
        ),
        events,
    );
    id
}

/// Merge the fragment onto the node already holding its FQN.
fn merge_onto_existing(state: &mut CacheState, id: TypeId, given: &TypeFragment, events: &mut Events) {
    let Some(node) = state.arena.get(id) else {
        return;
    };
    let was_initialized = node.initialized();
    let old_modifiers = node.modifiers;
    let known_annotations = referred_fqns(state, &node.annotations);

    // Hashes: the dedup shortcut already ruled out overlaps, so every given
    // hash is new here.
    if let Some(node) = state.arena.get_mut(id) {
        node.hashes.extend(given.hashes().iter().cloned());
    }
    let detail = if was_initialized {
        NodeEventDetail::HashAdded
    } else {
        NodeEventDetail::Initialized
    };
    state.fire_node_event(
        NodeEvent::new(id, given.fqn(), NodeEventKind::Changed, Some(detail)),
        events,
    );

    // Modifiers: bitwise union.
    let given_modifiers = given.modifiers().unwrap_or_default();
    let merged = Some(match old_modifiers {
        Some(old) => old.merge(given_modifiers),
        None => given_modifiers,
    });
    if merged != old_modifiers {
        if let Some(node) = state.arena.get_mut(id) {
            node.modifiers = merged;
        }
        state.fire_node_event(
            NodeEvent::new(
                id,
                given.fqn(),
                NodeEventKind::Changed,
                Some(NodeEventDetail::ModifiersChanged),
            ),
            events,
        );
    }

    // Annotations: wire only entries the node does not know yet.
    for annotation in given.annotations() {
        if !known_annotations.contains(&annotation.fqn) {
            add_annotation(state, id, &annotation.fqn, events);
        }
    }

    merge_methods(state, id, given.fqn(), given.methods(), events);

    match given {
        TypeFragment::Class(class) => {
            let (known_supers, known_interfaces) = match state.arena.get(id).and_then(|n| n.as_class())
            {
                Some(data) => (
                    referred_fqns(state, &data.super_classes),
                    referred_fqns(state, &data.realized_interfaces),
                ),
                None => (BTreeSet::new(), BTreeSet::new()),
            };
            for super_class in &class.super_classes {
                if !known_supers.contains(&super_class.fqn) {
                    add_superclass(state, id, &super_class.fqn, events);
                }
            }
            for interface in &class.realized_interfaces {
                if !known_interfaces.contains(&interface.fqn) {
                    add_realized_interface(state, id, &interface.fqn, events);
                }
            }
        }
        TypeFragment::Interface(interface) => {
            let known_supers = match state.arena.get(id).and_then(|n| n.as_interface()) {
                Some(data) => referred_fqns(state, &data.super_interfaces),
                None => BTreeSet::new(),
            };
            for super_interface in &interface.super_interfaces {
                if !known_supers.contains(&super_interface.fqn) {
                    add_super_interface(state, id, &super_interface.fqn, events);
                }
            }
        }
        TypeFragment::Annotation(_) => {}
    }
}

/// Merge the fragment's methods into the node's method set: equal
/// signatures merge metadata, unknown signatures are added wholesale.
fn merge_methods(
    state: &mut CacheState,
    id: TypeId,
    fqn: &str,
    methods: &[MethodFragment],
    events: &mut Events,
) {
    for method in methods {
        let position = state.arena.get(id).and_then(|node| {
            node.methods()
                .iter()
                .position(|m| m.has_signature(&method.name, &method.parameter_types))
        });

        match position {
            Some(index) => {
                let (known_annotations, known_exceptions, old_modifiers) = {
                    let Some(entry) = state.arena.get(id).and_then(|n| n.methods().get(index))
                    else {
                        continue;
                    };
                    (
                        referred_fqns(state, &entry.annotations),
                        referred_fqns(state, &entry.exceptions),
                        entry.modifiers,
                    )
                };

                let mut changed = false;
                for annotation in &method.annotations {
                    if known_annotations.contains(&annotation.fqn) {
                        continue;
                    }
                    let target =
                        get_or_add_referred(state, &annotation.fqn, ReferredKind::Annotation, events);
                    if let Some(node) = state.arena.get_mut(id) {
                        if let Some(entry) = node.methods_mut().get_mut(index) {
                            entry.annotations.insert(target);
                        }
                    }
                    state.arena.note_annotation_ref(target, id);
                    changed = true;
                }
                for exception in &method.exceptions {
                    if known_exceptions.contains(&exception.fqn) {
                        continue;
                    }
                    let target =
                        get_or_add_referred(state, &exception.fqn, ReferredKind::Class, events);
                    if let Some(node) = state.arena.get_mut(id) {
                        if let Some(entry) = node.methods_mut().get_mut(index) {
                            entry.exceptions.insert(target);
                        }
                    }
                    state.arena.note_exception_ref(target, id);
                    changed = true;
                }

                let merged = old_modifiers.merge(method.modifiers);
                if merged != old_modifiers {
                    if let Some(node) = state.arena.get_mut(id) {
                        if let Some(entry) = node.methods_mut().get_mut(index) {
                            entry.modifiers = merged;
                        }
                    }
                    changed = true;
                }

                if changed {
                    state.fire_node_event(
                        NodeEvent::new(
                            id,
                            fqn,
                            NodeEventKind::Changed,
                            Some(NodeEventDetail::MethodChangedOrAdded),
                        ),
                        events,
                    );
                }
            }
            None => {
                state.fire_node_event(
                    NodeEvent::new(
                        id,
                        fqn,
                        NodeEventKind::Changed,
                        Some(NodeEventDetail::MethodChangedOrAdded),
                    ),
                    events,
                );
                let index = match state.arena.get_mut(id) {
                    Some(node) => {
                        node.methods_mut().push(convert_method(method));
                        node.methods().len() - 1
                    }
                    None => continue,
                };
                resolve_method_references(state, id, index, method, events);
            }
        }
    }
}

/// An annotation fragment arriving for an FQN held by an interface node:
/// annotation types are also valid interface supertypes, so the interface
/// stays. Every class realizing the interface additionally realizes the
/// annotation, repairing the discovery-order anomaly, and the annotation
/// takes over the FQN slot.
fn merge_annotation_as_interface(
    state: &mut CacheState,
    interface_id: TypeId,
    given: &TypeFragment,
    events: &mut Events,
) {
    let realizing: Vec<TypeId> = state
        .arena
        .get(interface_id)
        .and_then(|n| n.as_interface())
        .map(|data| data.realizing_classes.iter().copied().collect())
        .unwrap_or_default();

    let annotation_id = insert_fragment(state, given);
    for class in realizing {
        state.arena.link_realized_interface(class, annotation_id);
    }

    state.fire_node_event(
        NodeEvent::new(
            annotation_id,
            given.fqn(),
            NodeEventKind::New,
            Some(NodeEventDetail::Initialized),
        ),
        events,
    );
}

/// Remove a node whose FQN changed its kind: sever every reference, fire
/// the removal, then drop it from the arena.
fn remove_due_to_kind_change(state: &mut CacheState, id: TypeId, events: &mut Events) {
    let Some(fqn) = state.arena.get(id).map(|n| n.fqn.clone()) else {
        return;
    };
    state.arena.sever_references(id);
    state.fire_node_event(
        NodeEvent::new(id, fqn.clone(), NodeEventKind::Removed, None),
        events,
    );
    state.arena.remove(id);
    warn!(%fqn, "type removed from the cache after a kind change");
}

/// FQNs of the referred nodes in an id set.
fn referred_fqns(state: &CacheState, ids: &BTreeSet<TypeId>) -> BTreeSet<String> {
    ids.iter()
        .filter_map(|id| state.arena.get(*id).map(|n| n.fqn.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{AnnotationFragment, ClassFragment, InterfaceFragment};
    use crate::model::Modifiers;

    fn class(fqn: &str, hash: &str) -> ClassFragment {
        ClassFragment::new(fqn, hash, Modifiers::PUBLIC)
    }

    fn interface(fqn: &str, hash: &str) -> InterfaceFragment {
        InterfaceFragment::new(fqn, hash, Modifiers::PUBLIC)
    }

    fn annotation(fqn: &str, hash: &str) -> AnnotationFragment {
        AnnotationFragment::new(fqn, hash, Modifiers::PUBLIC)
    }

    mod validation {
        use super::*;

        #[test]
        fn empty_fqn_is_rejected_without_mutation() {
            let cache = TypeCache::new();
            let result = cache.merge(TypeFragment::Class(class("", "h1")));
            assert!(matches!(result, Err(ModificationError::MissingFqn)));
            assert_eq!(cache.node_count(), 0);
        }

        #[test]
        fn fragment_without_hash_is_rejected() {
            let cache = TypeCache::new();
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.hashes.clear();
            let result = cache.merge(TypeFragment::Class(fragment));
            assert!(matches!(
                result,
                Err(ModificationError::NotInitialized { .. })
            ));
            assert_eq!(cache.node_count(), 0);
        }

        #[test]
        fn fragment_without_modifiers_is_rejected() {
            let cache = TypeCache::new();
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.modifiers = None;
            let result = cache.merge(TypeFragment::Class(fragment));
            assert!(matches!(
                result,
                Err(ModificationError::NotInitialized { .. })
            ));
        }
    }

    mod new_node {
        use super::*;

        #[test]
        fn merge_with_unknown_superclass_creates_one_stub() {
            let cache = TypeCache::new();
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.super_classes.push("java.lang.Object".into());

            let events = cache.merge(TypeFragment::Class(fragment)).unwrap();

            let initialized =
                events.node_events_with(NodeEventKind::New, Some(NodeEventDetail::Initialized));
            assert_eq!(initialized.len(), 1);
            assert_eq!(initialized[0].fqn, "com.acme.Foo");

            let stubs =
                events.node_events_with(NodeEventKind::New, Some(NodeEventDetail::NotInitialized));
            assert_eq!(stubs.len(), 1);
            assert_eq!(stubs[0].fqn, "java.lang.Object");

            assert_eq!(events.reference_events.len(), 1);
            assert_eq!(
                events.reference_events[0].relation,
                ReferenceRelation::Superclass
            );

            // One-level bound: exactly two nodes, no speculative ancestry.
            assert_eq!(cache.node_count(), 2);
        }

        #[test]
        fn method_references_resolve_without_reference_events() {
            let cache = TypeCache::new();
            let mut method = MethodFragment::new("run");
            method.annotations.push("com.acme.Timed".into());
            method.exceptions.push("java.io.IOException".into());
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.methods.push(method);

            let events = cache.merge(TypeFragment::Class(fragment)).unwrap();

            // Stubs announced, but no reference events for method edges.
            let stubs =
                events.node_events_with(NodeEventKind::New, Some(NodeEventDetail::NotInitialized));
            assert_eq!(stubs.len(), 2);
            assert!(events.reference_events.is_empty());

            cache.with_read(|state| {
                let id = state.fqn_index().get("com.acme.Foo").unwrap();
                let node = state.arena().get(id).unwrap();
                assert_eq!(node.methods()[0].annotations.len(), 1);
                assert_eq!(node.methods()[0].exceptions.len(), 1);

                // Back-references for cleanup are in place.
                let exc = state.fqn_index().get("java.io.IOException").unwrap();
                let exc_node = state.arena().get(exc).unwrap();
                assert!(exc_node.as_class().unwrap().throwing_refs.contains(&id));
            });
        }

        #[test]
        fn referred_node_is_reused_not_merged() {
            let cache = TypeCache::new();
            cache
                .merge(TypeFragment::Class(class("java.lang.Object", "obj1")))
                .unwrap();

            let mut fragment = class("com.acme.Foo", "h1");
            fragment.super_classes.push("java.lang.Object".into());
            let events = cache.merge(TypeFragment::Class(fragment)).unwrap();

            // No stub, no change on the referred node.
            assert!(events
                .node_events_with(NodeEventKind::New, Some(NodeEventDetail::NotInitialized))
                .is_empty());
            assert_eq!(cache.node_count(), 2);
        }
    }

    mod idempotence {
        use super::*;

        #[test]
        fn same_fragment_twice_produces_no_further_events() {
            let cache = TypeCache::new();
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.super_classes.push("java.lang.Object".into());

            cache
                .merge(TypeFragment::Class(fragment.clone()))
                .unwrap();
            let second = cache.merge(TypeFragment::Class(fragment)).unwrap();

            assert!(second.is_empty());
            assert_eq!(cache.node_count(), 2);
        }

        #[test]
        fn any_shared_hash_short_circuits() {
            let cache = TypeCache::new();
            cache
                .merge(TypeFragment::Class(class("com.acme.Foo", "h1")))
                .unwrap();

            let mut fragment = class("com.acme.Foo", "h1");
            fragment.hashes.insert("h2".to_string());
            let events = cache.merge(TypeFragment::Class(fragment)).unwrap();

            assert!(events.is_empty());
            let snapshot = cache.lookup().find_by_fqn("com.acme.Foo").unwrap();
            assert!(!snapshot.hashes.contains("h2"));
        }
    }

    mod merge_onto_existing {
        use super::*;

        #[test]
        fn new_hash_accumulates_and_fires_hash_added() {
            let cache = TypeCache::new();
            let mut first = class("com.acme.Foo", "h1");
            first.super_classes.push("java.lang.Object".into());
            cache.merge(TypeFragment::Class(first)).unwrap();

            let mut second = class("com.acme.Foo", "h2");
            second.super_classes.push("java.lang.Object".into());
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            let hash_added =
                events.node_events_with(NodeEventKind::Changed, Some(NodeEventDetail::HashAdded));
            assert_eq!(hash_added.len(), 1);
            // Superclass already resolved: no reference events re-fired.
            assert!(events.reference_events.is_empty());

            let snapshot = cache.lookup().find_by_fqn("com.acme.Foo").unwrap();
            assert_eq!(
                snapshot.hashes,
                BTreeSet::from(["h1".to_string(), "h2".to_string()])
            );
        }

        #[test]
        fn stub_fill_in_fires_changed_initialized() {
            let cache = TypeCache::new();
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.super_classes.push("com.acme.Base".into());
            cache.merge(TypeFragment::Class(fragment)).unwrap();

            let events = cache
                .merge(TypeFragment::Class(class("com.acme.Base", "b1")))
                .unwrap();

            let initialized = events
                .node_events_with(NodeEventKind::Changed, Some(NodeEventDetail::Initialized));
            assert_eq!(initialized.len(), 1);
            assert_eq!(initialized[0].fqn, "com.acme.Base");
            assert!(cache.lookup().find_by_fqn("com.acme.Base").unwrap().initialized);
        }

        #[test]
        fn modifier_union_fires_modifiers_changed() {
            let cache = TypeCache::new();
            cache
                .merge(TypeFragment::Class(class("com.acme.Foo", "h1")))
                .unwrap();

            let mut second = class("com.acme.Foo", "h2");
            second.modifiers = Some(Modifiers::PUBLIC | Modifiers::FINAL);
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            let changed = events.node_events_with(
                NodeEventKind::Changed,
                Some(NodeEventDetail::ModifiersChanged),
            );
            assert_eq!(changed.len(), 1);
            let snapshot = cache.lookup().find_by_fqn("com.acme.Foo").unwrap();
            assert_eq!(
                snapshot.modifiers,
                Some(Modifiers::PUBLIC | Modifiers::FINAL)
            );
        }

        #[test]
        fn same_modifiers_fire_no_modifier_event() {
            let cache = TypeCache::new();
            cache
                .merge(TypeFragment::Class(class("com.acme.Foo", "h1")))
                .unwrap();
            let events = cache
                .merge(TypeFragment::Class(class("com.acme.Foo", "h2")))
                .unwrap();
            assert!(events
                .node_events_with(
                    NodeEventKind::Changed,
                    Some(NodeEventDetail::ModifiersChanged)
                )
                .is_empty());
        }

        #[test]
        fn only_new_interfaces_are_wired() {
            let cache = TypeCache::new();
            let mut first = class("com.acme.Foo", "h1");
            first.realized_interfaces.push("com.acme.Service".into());
            cache.merge(TypeFragment::Class(first)).unwrap();

            let mut second = class("com.acme.Foo", "h2");
            second.realized_interfaces.push("com.acme.Service".into());
            second.realized_interfaces.push("com.acme.Closeable".into());
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            assert_eq!(events.reference_events.len(), 1);
            assert_eq!(
                events.reference_events[0].relation,
                ReferenceRelation::RealizeInterface
            );
        }
    }

    mod method_merge {
        use super::*;

        #[test]
        fn new_method_fires_method_changed_or_added() {
            let cache = TypeCache::new();
            cache
                .merge(TypeFragment::Class(class("com.acme.Foo", "h1")))
                .unwrap();

            let mut second = class("com.acme.Foo", "h2");
            second.methods.push(MethodFragment::new("run"));
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            let method_events = events.node_events_with(
                NodeEventKind::Changed,
                Some(NodeEventDetail::MethodChangedOrAdded),
            );
            assert_eq!(method_events.len(), 1);
        }

        #[test]
        fn equal_signature_merges_metadata() {
            let cache = TypeCache::new();
            let mut first = class("com.acme.Foo", "h1");
            first.methods.push(MethodFragment::new("run"));
            cache.merge(TypeFragment::Class(first)).unwrap();

            let mut method = MethodFragment::new("run");
            method.annotations.push("com.acme.Timed".into());
            method.modifiers = Modifiers::PUBLIC;
            let mut second = class("com.acme.Foo", "h2");
            second.methods.push(method);
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            let method_events = events.node_events_with(
                NodeEventKind::Changed,
                Some(NodeEventDetail::MethodChangedOrAdded),
            );
            assert_eq!(method_events.len(), 1);

            cache.with_read(|state| {
                let id = state.fqn_index().get("com.acme.Foo").unwrap();
                let node = state.arena().get(id).unwrap();
                assert_eq!(node.methods().len(), 1);
                assert_eq!(node.methods()[0].annotations.len(), 1);
            });
        }

        #[test]
        fn unchanged_method_fires_nothing() {
            let cache = TypeCache::new();
            let mut first = class("com.acme.Foo", "h1");
            let mut method = MethodFragment::new("run");
            method.modifiers = Modifiers::PUBLIC;
            first.methods.push(method.clone());
            cache.merge(TypeFragment::Class(first)).unwrap();

            let mut second = class("com.acme.Foo", "h2");
            second.methods.push(method);
            let events = cache.merge(TypeFragment::Class(second)).unwrap();

            assert!(events
                .node_events_with(
                    NodeEventKind::Changed,
                    Some(NodeEventDetail::MethodChangedOrAdded)
                )
                .is_empty());
        }

        #[test]
        fn overloads_are_distinct_methods() {
            let cache = TypeCache::new();
            let mut first = class("com.acme.Foo", "h1");
            first.methods.push(MethodFragment::new("run"));
            cache.merge(TypeFragment::Class(first)).unwrap();

            let mut overload = MethodFragment::new("run");
            overload.parameter_types.push("int".to_string());
            let mut second = class("com.acme.Foo", "h2");
            second.methods.push(overload);
            cache.merge(TypeFragment::Class(second)).unwrap();

            cache.with_read(|state| {
                let id = state.fqn_index().get("com.acme.Foo").unwrap();
                assert_eq!(state.arena().get(id).unwrap().methods().len(), 2);
            });
        }
    }

    mod kind_change {
        use super::*;

        #[test]
        fn class_replaces_interface_and_severs_references() {
            let cache = TypeCache::new();
            let mut realizer = class("com.acme.Impl", "i1");
            realizer.realized_interfaces.push("com.acme.Thing".into());
            cache.merge(TypeFragment::Class(realizer)).unwrap();
            cache
                .merge(TypeFragment::Interface(interface("com.acme.Thing", "t1")))
                .unwrap();

            let events = cache
                .merge(TypeFragment::Class(class("com.acme.Thing", "t2")))
                .unwrap();

            let removed = events.node_events_with(NodeEventKind::Removed, None);
            assert_eq!(removed.len(), 1);
            assert_eq!(removed[0].fqn, "com.acme.Thing");

            let snapshot = cache.lookup().find_by_fqn("com.acme.Thing").unwrap();
            assert_eq!(snapshot.kind, TypeKindTag::Class);

            // No dangling edge: the realizing class lost the reference.
            cache.with_read(|state| {
                let impl_id = state.fqn_index().get("com.acme.Impl").unwrap();
                let node = state.arena().get(impl_id).unwrap();
                assert!(node.as_class().unwrap().realized_interfaces.is_empty());
            });
        }

        #[test]
        fn referred_kind_mismatch_replaces_node() {
            let cache = TypeCache::new();
            // Known as an interface...
            cache
                .merge(TypeFragment::Interface(interface("com.acme.Base", "b1")))
                .unwrap();

            // ...but now referenced as a superclass.
            let mut fragment = class("com.acme.Foo", "h1");
            fragment.super_classes.push("com.acme.Base".into());
            let events = cache.merge(TypeFragment::Class(fragment)).unwrap();

            assert_eq!(events.node_events_with(NodeEventKind::Removed, None).len(), 1);
            let snapshot = cache.lookup().find_by_fqn("com.acme.Base").unwrap();
            assert_eq!(snapshot.kind, TypeKindTag::Class);
            assert!(!snapshot.initialized);
        }
    }

    mod annotation_as_interface {
        use super::*;

        #[test]
        fn interface_survives_and_classes_realize_annotation() {
            let cache = TypeCache::new();
            let mut realizer = class("com.acme.Impl", "i1");
            realizer.realized_interfaces.push("com.acme.Marker".into());
            cache.merge(TypeFragment::Class(realizer)).unwrap();
            cache
                .merge(TypeFragment::Interface(interface("com.acme.Marker", "m1")))
                .unwrap();

            let events = cache
                .merge(TypeFragment::Annotation(annotation("com.acme.Marker", "a1")))
                .unwrap();

            // No removal; the annotation is announced as new.
            assert!(events.node_events_with(NodeEventKind::Removed, None).is_empty());
            let added =
                events.node_events_with(NodeEventKind::New, Some(NodeEventDetail::Initialized));
            assert_eq!(added.len(), 1);

            // The FQN slot now resolves to the annotation.
            let snapshot = cache.lookup().find_by_fqn("com.acme.Marker").unwrap();
            assert_eq!(snapshot.kind, TypeKindTag::Annotation);

            // The realizing class now realizes both nodes.
            cache.with_read(|state| {
                let impl_id = state.fqn_index().get("com.acme.Impl").unwrap();
                let node = state.arena().get(impl_id).unwrap();
                assert_eq!(node.as_class().unwrap().realized_interfaces.len(), 2);
            });
        }
    }

    mod uniqueness {
        use super::*;

        #[test]
        fn fqn_index_never_holds_two_nodes_per_fqn() {
            let cache = TypeCache::new();
            for hash in ["h1", "h2", "h3"] {
                cache
                    .merge(TypeFragment::Class(class("com.acme.Foo", hash)))
                    .unwrap();
            }
            cache
                .merge(TypeFragment::Interface(interface("com.acme.Foo", "i1")))
                .unwrap();

            cache.with_read(|state| {
                let ids: Vec<_> = state
                    .arena()
                    .iter()
                    .filter(|n| n.fqn == "com.acme.Foo")
                    .collect();
                assert_eq!(ids.len(), 1);
            });
        }
    }
}
