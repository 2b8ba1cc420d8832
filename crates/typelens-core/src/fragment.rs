//! Ingest-side type fragments.
//!
//! The bytecode parser (an external collaborator) reports each observed
//! type as a fragment: the type's own data fully populated, and its direct
//! references carried as shallow FQN-only values. Fragments never carry
//! transitive structure; the merge engine resolves exactly one level.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Modifiers, TypeKindTag};

/// Shallow reference to another type, carried by a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Fully qualified name of the referenced type.
    pub fqn: String,
}

impl TypeRef {
    pub fn new(fqn: impl Into<String>) -> Self {
        TypeRef { fqn: fqn.into() }
    }
}

impl From<&str> for TypeRef {
    fn from(fqn: &str) -> Self {
        TypeRef::new(fqn)
    }
}

/// A method as observed by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodFragment {
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub annotations: Vec<TypeRef>,
    #[serde(default)]
    pub exceptions: Vec<TypeRef>,
}

impl MethodFragment {
    pub fn new(name: impl Into<String>) -> Self {
        MethodFragment {
            name: name.into(),
            ..MethodFragment::default()
        }
    }
}

/// One observed type, as handed to [`merge`](crate::store::TypeCache::merge).
///
/// The root type of a fragment must be initialized (FQN, at least one hash,
/// modifiers); its references need nothing beyond an FQN.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeFragment {
    Class(ClassFragment),
    Interface(InterfaceFragment),
    Annotation(AnnotationFragment),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassFragment {
    pub fqn: String,
    #[serde(default)]
    pub hashes: BTreeSet<String>,
    #[serde(default)]
    pub modifiers: Option<Modifiers>,
    #[serde(default)]
    pub annotations: Vec<TypeRef>,
    #[serde(default)]
    pub super_classes: Vec<TypeRef>,
    #[serde(default)]
    pub realized_interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub methods: Vec<MethodFragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceFragment {
    pub fqn: String,
    #[serde(default)]
    pub hashes: BTreeSet<String>,
    #[serde(default)]
    pub modifiers: Option<Modifiers>,
    #[serde(default)]
    pub annotations: Vec<TypeRef>,
    #[serde(default)]
    pub super_interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub methods: Vec<MethodFragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationFragment {
    pub fqn: String,
    #[serde(default)]
    pub hashes: BTreeSet<String>,
    #[serde(default)]
    pub modifiers: Option<Modifiers>,
    #[serde(default)]
    pub annotations: Vec<TypeRef>,
    #[serde(default)]
    pub methods: Vec<MethodFragment>,
}

impl ClassFragment {
    /// An initialized class fragment with a single hash.
    pub fn new(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        ClassFragment {
            fqn: fqn.into(),
            hashes: BTreeSet::from([hash.into()]),
            modifiers: Some(modifiers),
            annotations: Vec::new(),
            super_classes: Vec::new(),
            realized_interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }
}

impl InterfaceFragment {
    /// An initialized interface fragment with a single hash.
    pub fn new(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        InterfaceFragment {
            fqn: fqn.into(),
            hashes: BTreeSet::from([hash.into()]),
            modifiers: Some(modifiers),
            annotations: Vec::new(),
            super_interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }
}

impl AnnotationFragment {
    /// An initialized annotation fragment with a single hash.
    pub fn new(fqn: impl Into<String>, hash: impl Into<String>, modifiers: Modifiers) -> Self {
        AnnotationFragment {
            fqn: fqn.into(),
            hashes: BTreeSet::from([hash.into()]),
            modifiers: Some(modifiers),
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }
}

impl TypeFragment {
    pub fn fqn(&self) -> &str {
        match self {
            TypeFragment::Class(f) => &f.fqn,
            TypeFragment::Interface(f) => &f.fqn,
            TypeFragment::Annotation(f) => &f.fqn,
        }
    }

    pub fn hashes(&self) -> &BTreeSet<String> {
        match self {
            TypeFragment::Class(f) => &f.hashes,
            TypeFragment::Interface(f) => &f.hashes,
            TypeFragment::Annotation(f) => &f.hashes,
        }
    }

    pub fn modifiers(&self) -> Option<Modifiers> {
        match self {
            TypeFragment::Class(f) => f.modifiers,
            TypeFragment::Interface(f) => f.modifiers,
            TypeFragment::Annotation(f) => f.modifiers,
        }
    }

    pub fn annotations(&self) -> &[TypeRef] {
        match self {
            TypeFragment::Class(f) => &f.annotations,
            TypeFragment::Interface(f) => &f.annotations,
            TypeFragment::Annotation(f) => &f.annotations,
        }
    }

    pub fn methods(&self) -> &[MethodFragment] {
        match self {
            TypeFragment::Class(f) => &f.methods,
            TypeFragment::Interface(f) => &f.methods,
            TypeFragment::Annotation(f) => &f.methods,
        }
    }

    pub fn kind_tag(&self) -> TypeKindTag {
        match self {
            TypeFragment::Class(_) => TypeKindTag::Class,
            TypeFragment::Interface(_) => TypeKindTag::Interface,
            TypeFragment::Annotation(_) => TypeKindTag::Annotation,
        }
    }

    /// Whether the fragment's root type is fully specified: FQN, at least
    /// one content hash, and modifiers.
    pub fn is_initialized(&self) -> bool {
        !self.fqn().is_empty() && !self.hashes().is_empty() && self.modifiers().is_some()
    }
}
