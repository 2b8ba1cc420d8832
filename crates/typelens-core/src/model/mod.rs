//! Type model: nodes, relationships, and the arena that owns them.

pub mod arena;
pub mod method;
pub mod modifiers;
pub mod node;

pub use arena::{TypeArena, FQN_THROWABLE};
pub use method::{MethodInstrumentationConfig, MethodNode};
pub use modifiers::Modifiers;
pub use node::{AnnotationData, ClassData, InterfaceData, TypeId, TypeKind, TypeKindTag, TypeNode};
