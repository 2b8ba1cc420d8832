//! Type and method modifier bitmask.
//!
//! Fragments report modifiers using the JVM access-flag bit layout. The
//! cache never interprets individual bits beyond the kind filters; it only
//! accumulates them, because two bytecode versions of the same type may
//! legitimately disagree (e.g. a class made `final` in a later deploy).

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Modifier bits of a type or method, in JVM access-flag layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Modifiers: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
    }
}

impl Modifiers {
    /// Merge modifiers observed for two versions of the same type or
    /// method. The cache keeps the union of all observed bits.
    pub fn merge(self, other: Modifiers) -> Modifiers {
        self | other
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.bits())
    }
}

// Serialized as the raw bit value so fragment dumps carry the same numbers
// the agents report.
impl Serialize for Modifiers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(Modifiers::from_bits_truncate(bits))
    }
}
