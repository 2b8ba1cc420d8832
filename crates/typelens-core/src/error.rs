//! Error types for cache mutation.
//!
//! Only the merge engine treats bad input as fatal, and it validates before
//! the write-lock body executes, so a rejected fragment never causes a
//! partial mutation. Lookup failures are soft: they are logged and absorbed
//! into empty results, never surfaced as typed errors.

use thiserror::Error;

/// Fatal validation failure of a fragment handed to
/// [`merge`](crate::store::TypeCache::merge).
#[derive(Debug, Error)]
pub enum ModificationError {
    /// The fragment does not carry a fully qualified name.
    #[error("the given type fragment does not provide a fully qualified name")]
    MissingFqn,

    /// The fragment's root type is not initialized. At the very least the
    /// FQN, one content hash, and the modifiers must be set.
    #[error("the type fragment for '{fqn}' is not initialized: a content hash and modifiers are required")]
    NotInitialized { fqn: String },
}

impl ModificationError {
    /// Create a not-initialized error for the given FQN.
    pub fn not_initialized(fqn: impl Into<String>) -> Self {
        ModificationError::NotInitialized { fqn: fqn.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fqn_display() {
        assert_eq!(
            ModificationError::MissingFqn.to_string(),
            "the given type fragment does not provide a fully qualified name"
        );
    }

    #[test]
    fn not_initialized_display_names_the_type() {
        let err = ModificationError::not_initialized("com.acme.Foo");
        assert!(err.to_string().contains("com.acme.Foo"));
    }
}
