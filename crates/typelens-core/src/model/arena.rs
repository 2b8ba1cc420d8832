//! Id-keyed storage for type nodes.
//!
//! The arena is the single owner of every [`TypeNode`]. Edges between nodes
//! are [`TypeId`] sets maintained in bidirectional pairs by the `link_*`
//! helpers, and [`TypeArena::sever_references`] undoes all of them before a
//! node is removed so no dangling id survives.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::model::node::{TypeId, TypeKind, TypeKindTag, TypeNode};

/// FQN of the root of the JVM throwable hierarchy. A class is an exception
/// class iff it is a (transitive) subclass of this type.
pub const FQN_THROWABLE: &str = "java.lang.Throwable";

/// Storage for type nodes, keyed by generated [`TypeId`].
///
/// Iteration order is deterministic (id order).
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: BTreeMap<TypeId, TypeNode>,
    next_id: u32,
}

impl TypeArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        TypeArena::default()
    }

    fn next_type_id(&mut self) -> TypeId {
        let id = TypeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Allocate a new node with the given FQN and kind payload. The node
    /// starts uninitialized; hashes and modifiers are merged in later.
    pub fn alloc(&mut self, fqn: impl Into<String>, kind: TypeKind) -> TypeId {
        let id = self.next_type_id();
        self.nodes.insert(
            id,
            TypeNode {
                id,
                fqn: fqn.into(),
                hashes: BTreeSet::new(),
                modifiers: None,
                annotations: BTreeSet::new(),
                kind,
            },
        );
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeNode> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node. Callers must sever its references first.
    pub fn remove(&mut self, id: TypeId) -> Option<TypeNode> {
        self.nodes.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeNode> {
        self.nodes.values()
    }

    // ========================================================================
    // Bidirectional edge maintenance
    // ========================================================================

    /// Record `annotation` on `owner`, with the back-reference on the
    /// annotation node.
    pub fn link_annotation(&mut self, owner: TypeId, annotation: TypeId) {
        if let Some(node) = self.nodes.get_mut(&owner) {
            node.annotations.insert(annotation);
        }
        self.note_annotation_ref(annotation, owner);
    }

    /// Record that `owner` references `annotation` (type- or method-level)
    /// without touching the owner side.
    pub fn note_annotation_ref(&mut self, annotation: TypeId, owner: TypeId) {
        if let Some(TypeKind::Annotation(data)) =
            self.nodes.get_mut(&annotation).map(|n| &mut n.kind)
        {
            data.annotated_refs.insert(owner);
        }
    }

    /// Record that a method of `owner` declares `exception` as thrown.
    pub fn note_exception_ref(&mut self, exception: TypeId, owner: TypeId) {
        if let Some(TypeKind::Class(data)) = self.nodes.get_mut(&exception).map(|n| &mut n.kind) {
            data.throwing_refs.insert(owner);
        }
    }

    /// Record `super_class` as a superclass of `class`, with the subclass
    /// back-reference.
    pub fn link_superclass(&mut self, class: TypeId, super_class: TypeId) {
        if let Some(TypeKind::Class(data)) = self.nodes.get_mut(&class).map(|n| &mut n.kind) {
            data.super_classes.insert(super_class);
        }
        if let Some(TypeKind::Class(data)) = self.nodes.get_mut(&super_class).map(|n| &mut n.kind) {
            data.sub_classes.insert(class);
        }
    }

    /// Record `interface` as realized by `class`, with the realizing-class
    /// back-reference. The target may be an interface or an annotation
    /// acting as an interface supertype.
    pub fn link_realized_interface(&mut self, class: TypeId, interface: TypeId) {
        if let Some(TypeKind::Class(data)) = self.nodes.get_mut(&class).map(|n| &mut n.kind) {
            data.realized_interfaces.insert(interface);
        }
        match self.nodes.get_mut(&interface).map(|n| &mut n.kind) {
            Some(TypeKind::Interface(data)) => {
                data.realizing_classes.insert(class);
            }
            Some(TypeKind::Annotation(data)) => {
                data.realizing_classes.insert(class);
            }
            _ => {}
        }
    }

    /// Record `super_interface` as a superinterface of `interface`, with
    /// the subinterface back-reference.
    pub fn link_super_interface(&mut self, interface: TypeId, super_interface: TypeId) {
        if let Some(TypeKind::Interface(data)) = self.nodes.get_mut(&interface).map(|n| &mut n.kind)
        {
            data.super_interfaces.insert(super_interface);
        }
        if let Some(TypeKind::Interface(data)) =
            self.nodes.get_mut(&super_interface).map(|n| &mut n.kind)
        {
            data.sub_interfaces.insert(interface);
        }
    }

    // ========================================================================
    // Reference severing
    // ========================================================================

    /// Clear every edge touching `id`, on both sides, leaving the node in
    /// place but fully disconnected. Must run before [`TypeArena::remove`].
    pub fn sever_references(&mut self, id: TypeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        // Ids this node references as annotations, at type or method level.
        let mut annotation_refs: BTreeSet<TypeId> = node.annotations.clone();
        let mut exception_refs: BTreeSet<TypeId> = BTreeSet::new();
        for method in node.methods() {
            annotation_refs.extend(method.annotations.iter().copied());
            exception_refs.extend(method.exceptions.iter().copied());
        }

        enum Edges {
            Class {
                super_classes: BTreeSet<TypeId>,
                sub_classes: BTreeSet<TypeId>,
                realized_interfaces: BTreeSet<TypeId>,
                throwing_refs: BTreeSet<TypeId>,
            },
            Interface {
                super_interfaces: BTreeSet<TypeId>,
                sub_interfaces: BTreeSet<TypeId>,
                realizing_classes: BTreeSet<TypeId>,
            },
            Annotation {
                annotated_refs: BTreeSet<TypeId>,
                realizing_classes: BTreeSet<TypeId>,
            },
        }

        let edges = match &node.kind {
            TypeKind::Class(data) => Edges::Class {
                super_classes: data.super_classes.clone(),
                sub_classes: data.sub_classes.clone(),
                realized_interfaces: data.realized_interfaces.clone(),
                throwing_refs: data.throwing_refs.clone(),
            },
            TypeKind::Interface(data) => Edges::Interface {
                super_interfaces: data.super_interfaces.clone(),
                sub_interfaces: data.sub_interfaces.clone(),
                realizing_classes: data.realizing_classes.clone(),
            },
            TypeKind::Annotation(data) => Edges::Annotation {
                annotated_refs: data.annotated_refs.clone(),
                realizing_classes: data.realizing_classes.clone(),
            },
        };

        // Outgoing annotation and exception references: drop the matching
        // back-references.
        for annotation in &annotation_refs {
            if let Some(TypeKind::Annotation(data)) =
                self.nodes.get_mut(annotation).map(|n| &mut n.kind)
            {
                data.annotated_refs.remove(&id);
            }
        }
        for exception in &exception_refs {
            if let Some(TypeKind::Class(data)) = self.nodes.get_mut(exception).map(|n| &mut n.kind)
            {
                data.throwing_refs.remove(&id);
            }
        }

        match edges {
            Edges::Class {
                super_classes,
                sub_classes,
                realized_interfaces,
                throwing_refs,
            } => {
                for other in super_classes {
                    if let Some(TypeKind::Class(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.sub_classes.remove(&id);
                    }
                }
                for other in sub_classes {
                    if let Some(TypeKind::Class(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.super_classes.remove(&id);
                    }
                }
                for other in realized_interfaces {
                    match self.nodes.get_mut(&other).map(|n| &mut n.kind) {
                        Some(TypeKind::Interface(data)) => {
                            data.realizing_classes.remove(&id);
                        }
                        Some(TypeKind::Annotation(data)) => {
                            data.realizing_classes.remove(&id);
                        }
                        _ => {}
                    }
                }
                // Types whose methods throw this class as an exception.
                for other in throwing_refs {
                    if let Some(other_node) = self.nodes.get_mut(&other) {
                        for method in other_node.methods_mut() {
                            method.exceptions.remove(&id);
                        }
                    }
                }
            }
            Edges::Interface {
                super_interfaces,
                sub_interfaces,
                realizing_classes,
            } => {
                for other in super_interfaces {
                    if let Some(TypeKind::Interface(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.sub_interfaces.remove(&id);
                    }
                }
                for other in sub_interfaces {
                    if let Some(TypeKind::Interface(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.super_interfaces.remove(&id);
                    }
                }
                for other in realizing_classes {
                    if let Some(TypeKind::Class(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.realized_interfaces.remove(&id);
                    }
                }
            }
            Edges::Annotation {
                annotated_refs,
                realizing_classes,
            } => {
                // Types referencing this node as an annotation, at type or
                // method level.
                for other in annotated_refs {
                    if let Some(other_node) = self.nodes.get_mut(&other) {
                        other_node.annotations.remove(&id);
                        for method in other_node.methods_mut() {
                            method.annotations.remove(&id);
                        }
                    }
                }
                for other in realizing_classes {
                    if let Some(TypeKind::Class(data)) =
                        self.nodes.get_mut(&other).map(|n| &mut n.kind)
                    {
                        data.realized_interfaces.remove(&id);
                    }
                }
            }
        }

        // Finally clear the node's own edge sets.
        if let Some(node) = self.nodes.get_mut(&id) {
            node.annotations.clear();
            for method in node.methods_mut() {
                method.annotations.clear();
                method.exceptions.clear();
            }
            match &mut node.kind {
                TypeKind::Class(data) => {
                    data.super_classes.clear();
                    data.sub_classes.clear();
                    data.realized_interfaces.clear();
                    data.throwing_refs.clear();
                }
                TypeKind::Interface(data) => {
                    data.super_interfaces.clear();
                    data.sub_interfaces.clear();
                    data.realizing_classes.clear();
                }
                TypeKind::Annotation(data) => {
                    data.annotated_refs.clear();
                    data.realizing_classes.clear();
                }
            }
        }
    }

    // ========================================================================
    // Hierarchy walks
    // ========================================================================

    /// Whether the class `id` is a transitive subclass of `super_fqn`.
    /// Cycle-guarded: merged multi-version hierarchies can be cyclic.
    pub fn is_subclass_of(&self, id: TypeId, super_fqn: &str) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(TypeKind::Class(data)) = self.nodes.get(&current).map(|n| &n.kind) else {
                continue;
            };
            for &super_class in &data.super_classes {
                if let Some(super_node) = self.nodes.get(&super_class) {
                    if super_node.fqn == super_fqn {
                        return true;
                    }
                }
                stack.push(super_class);
            }
        }
        false
    }

    /// Whether the class `id` is an exception class.
    pub fn is_exception(&self, id: TypeId) -> bool {
        matches!(
            self.nodes.get(&id).map(|n| n.kind_tag()),
            Some(TypeKindTag::Class)
        ) && self.is_subclass_of(id, FQN_THROWABLE)
    }

    /// All transitive subclasses of the class `id`, excluding `id` itself.
    pub fn transitive_subclasses(&self, id: TypeId) -> BTreeSet<TypeId> {
        let mut result = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(TypeKind::Class(data)) = self.nodes.get(&current).map(|n| &n.kind) else {
                continue;
            };
            for &sub in &data.sub_classes {
                if result.insert(sub) {
                    stack.push(sub);
                }
            }
        }
        result
    }

    /// All classes realizing the interface (or annotation) `id`, directly
    /// or through any transitive subinterface.
    pub fn transitive_realizing_classes(&self, id: TypeId) -> BTreeSet<TypeId> {
        let mut result = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            match self.nodes.get(&current).map(|n| &n.kind) {
                Some(TypeKind::Interface(data)) => {
                    result.extend(data.realizing_classes.iter().copied());
                    stack.extend(data.sub_interfaces.iter().copied());
                }
                Some(TypeKind::Annotation(data)) => {
                    result.extend(data.realizing_classes.iter().copied());
                }
                _ => {}
            }
        }
        result
    }
}
