//! Method entries owned by type nodes.
//!
//! A method's identity is its signature: name plus the ordered parameter
//! type list. The return type is carried but deliberately excluded from the
//! signature, so a fragment that re-observes a method with a covariant
//! return merges into the known entry instead of forking an overload.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::modifiers::Modifiers;
use crate::model::node::TypeId;

/// A method of a class, interface, or annotation (annotation element).
///
/// Annotation and exception references point into the arena; the referenced
/// nodes keep matching back-references for cleanup (see
/// [`TypeArena::sever_references`](crate::model::arena::TypeArena::sever_references)).
#[derive(Debug, Clone)]
pub struct MethodNode {
    /// Method name.
    pub name: String,
    /// Ordered parameter type names. Part of the signature.
    pub parameter_types: Vec<String>,
    /// Return type name. Informational, not part of the signature.
    pub return_type: Option<String>,
    /// Merged modifier bits.
    pub modifiers: Modifiers,
    /// Annotations on this method.
    pub annotations: BTreeSet<TypeId>,
    /// Declared thrown exception classes.
    pub exceptions: BTreeSet<TypeId>,
    /// Instrumentation point, if an applier marked this method.
    pub instrumentation: Option<MethodInstrumentationConfig>,
}

impl MethodNode {
    /// Whether this method has the given signature.
    pub fn has_signature(&self, name: &str, parameter_types: &[String]) -> bool {
        self.name == name && self.parameter_types == parameter_types
    }
}

/// Per-method instrumentation configuration shipped to agents.
///
/// Serialization for transport is the caller's concern; this type only
/// guarantees a stable serde shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInstrumentationConfig {
    /// Fully qualified name of the class owning the method.
    pub target_class_fqn: String,
    /// Name of the instrumented method.
    pub target_method_name: String,
    /// Ordered parameter type names of the instrumented method.
    #[serde(default)]
    pub parameter_types: Vec<String>,
    /// Return type name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Ids of the sensors to run at this instrumentation point.
    #[serde(default)]
    pub sensor_ids: Vec<u64>,
}
