//! Type nodes and their relationship data.
//!
//! The graph is cyclic (classes point at interfaces, interfaces point back
//! at realizing classes), so nodes never hold references to each other.
//! Every edge is a [`TypeId`] into the owning [`TypeArena`]; severing a
//! node before removal is a matter of clearing id sets on both sides.
//!
//! [`TypeArena`]: crate::model::arena::TypeArena

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::method::{MethodInstrumentationConfig, MethodNode};
use crate::model::modifiers::Modifiers;

/// Unique identifier for a type node within the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Create a new type ID.
    pub fn new(id: u32) -> Self {
        TypeId(id)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

/// Concrete kind of a type node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKindTag {
    Class,
    Interface,
    Annotation,
}

impl fmt::Display for TypeKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKindTag::Class => "class",
            TypeKindTag::Interface => "interface",
            TypeKindTag::Annotation => "annotation",
        };
        write!(f, "{}", name)
    }
}

/// A node in the type graph.
///
/// Exactly one node exists per FQN in the FQN index at any time. A node is
/// *initialized* once its own fragment has arrived (at least one content
/// hash and the modifier set); a node created only because something
/// referenced its FQN stays uninitialized until then.
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// Arena id of this node.
    pub id: TypeId,
    /// Fully qualified name. Immutable for the life of the node.
    pub fqn: String,
    /// Content hashes of every observed bytecode version of this type.
    pub hashes: BTreeSet<String>,
    /// Merged modifier bits; `None` until the node's own fragment arrives.
    pub modifiers: Option<Modifiers>,
    /// Annotations on this type.
    pub annotations: BTreeSet<TypeId>,
    /// Kind-specific relationships and methods.
    pub kind: TypeKind,
}

/// Kind-specific payload of a [`TypeNode`].
#[derive(Debug, Clone)]
pub enum TypeKind {
    Class(ClassData),
    Interface(InterfaceData),
    Annotation(AnnotationData),
}

/// Relationships of a class node.
#[derive(Debug, Clone, Default)]
pub struct ClassData {
    /// Direct superclasses. Normally a singleton chain; several versions of
    /// the same class merged into one node can disagree over time.
    pub super_classes: BTreeSet<TypeId>,
    /// Back-references: classes listing this node as a superclass.
    pub sub_classes: BTreeSet<TypeId>,
    /// Interfaces (or annotations acting as interfaces) this class realizes.
    pub realized_interfaces: BTreeSet<TypeId>,
    /// Methods of this class.
    pub methods: Vec<MethodNode>,
    /// Back-references: types owning a method that declares this class as a
    /// thrown exception.
    pub throwing_refs: BTreeSet<TypeId>,
}

/// Relationships of an interface node.
#[derive(Debug, Clone, Default)]
pub struct InterfaceData {
    /// Direct superinterfaces.
    pub super_interfaces: BTreeSet<TypeId>,
    /// Back-references: interfaces listing this node as a superinterface.
    pub sub_interfaces: BTreeSet<TypeId>,
    /// Back-references: classes realizing this interface.
    pub realizing_classes: BTreeSet<TypeId>,
    /// Methods of this interface.
    pub methods: Vec<MethodNode>,
}

/// Relationships of an annotation node.
#[derive(Debug, Clone, Default)]
pub struct AnnotationData {
    /// Annotation elements.
    pub methods: Vec<MethodNode>,
    /// Back-references: types referencing this node as an annotation,
    /// either on the type itself or on one of its methods.
    pub annotated_refs: BTreeSet<TypeId>,
    /// Back-references: classes realizing this annotation as an interface.
    pub realizing_classes: BTreeSet<TypeId>,
}

impl TypeKind {
    /// Empty payload for the given kind.
    pub fn empty(tag: TypeKindTag) -> TypeKind {
        match tag {
            TypeKindTag::Class => TypeKind::Class(ClassData::default()),
            TypeKindTag::Interface => TypeKind::Interface(InterfaceData::default()),
            TypeKindTag::Annotation => TypeKind::Annotation(AnnotationData::default()),
        }
    }
}

impl TypeNode {
    /// The concrete kind of this node.
    pub fn kind_tag(&self) -> TypeKindTag {
        match self.kind {
            TypeKind::Class(_) => TypeKindTag::Class,
            TypeKind::Interface(_) => TypeKindTag::Interface,
            TypeKind::Annotation(_) => TypeKindTag::Annotation,
        }
    }

    /// Whether the node's own fragment has been merged: at least one hash
    /// and the modifier set are present. The FQN is present by construction.
    pub fn initialized(&self) -> bool {
        !self.hashes.is_empty() && self.modifiers.is_some()
    }

    /// Methods of this node. Every kind carries methods (annotation
    /// elements are modeled as methods).
    pub fn methods(&self) -> &[MethodNode] {
        match &self.kind {
            TypeKind::Class(data) => &data.methods,
            TypeKind::Interface(data) => &data.methods,
            TypeKind::Annotation(data) => &data.methods,
        }
    }

    pub fn methods_mut(&mut self) -> &mut Vec<MethodNode> {
        match &mut self.kind {
            TypeKind::Class(data) => &mut data.methods,
            TypeKind::Interface(data) => &mut data.methods,
            TypeKind::Annotation(data) => &mut data.methods,
        }
    }

    /// Class payload, if this node is a class.
    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.kind {
            TypeKind::Class(data) => Some(data),
            _ => None,
        }
    }

    /// Interface payload, if this node is an interface.
    pub fn as_interface(&self) -> Option<&InterfaceData> {
        match &self.kind {
            TypeKind::Interface(data) => Some(data),
            _ => None,
        }
    }

    /// Annotation payload, if this node is an annotation.
    pub fn as_annotation(&self) -> Option<&AnnotationData> {
        match &self.kind {
            TypeKind::Annotation(data) => Some(data),
            _ => None,
        }
    }

    /// Whether any method of this node carries an instrumentation point.
    /// Only class methods are ever instrumented.
    pub fn has_instrumentation_points(&self) -> bool {
        match &self.kind {
            TypeKind::Class(data) => data.methods.iter().any(|m| m.instrumentation.is_some()),
            _ => false,
        }
    }

    /// All instrumentation points currently set on this node's methods.
    pub fn instrumentation_points(&self) -> Vec<MethodInstrumentationConfig> {
        match &self.kind {
            TypeKind::Class(data) => data
                .methods
                .iter()
                .filter_map(|m| m.instrumentation.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}
