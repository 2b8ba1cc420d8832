//! Read-only query surface over the cache.
//!
//! Every method runs under the read lock and returns owned snapshots, so no
//! node reference escapes the guarded body. Lookup failures are soft: an
//! invalid pattern yields an empty result and a warning, never an error —
//! callers treat empty as "nothing found".

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::model::{Modifiers, TypeId, TypeKindTag};
use crate::pattern::MatchPattern;
use crate::store::{CacheState, TypeCache};

/// Owned view of one type node at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSnapshot {
    pub id: TypeId,
    pub fqn: String,
    pub kind: TypeKindTag,
    pub hashes: BTreeSet<String>,
    pub modifiers: Option<Modifiers>,
    pub initialized: bool,
    /// For classes: whether the type transitively extends
    /// `java.lang.Throwable`.
    pub exception: bool,
}

/// Build a snapshot of the node `id`, if present.
pub(crate) fn snapshot(state: &CacheState, id: TypeId) -> Option<TypeSnapshot> {
    let node = state.arena().get(id)?;
    Some(TypeSnapshot {
        id,
        fqn: node.fqn.clone(),
        kind: node.kind_tag(),
        hashes: node.hashes.clone(),
        modifiers: node.modifiers,
        initialized: node.initialized(),
        exception: state.arena().is_exception(id),
    })
}

/// Lookup service of a [`TypeCache`].
pub struct CacheLookup<'a> {
    cache: &'a TypeCache,
}

impl<'a> CacheLookup<'a> {
    pub(crate) fn new(cache: &'a TypeCache) -> Self {
        CacheLookup { cache }
    }

    /// Find a type by its exact fully qualified name.
    pub fn find_by_fqn(&self, fqn: &str) -> Option<TypeSnapshot> {
        self.cache.with_read(|state| {
            state
                .fqn_index()
                .get(fqn)
                .and_then(|id| snapshot(state, id))
        })
    }

    /// Find a type by one of its content hashes.
    pub fn find_by_hash(&self, hash: &str) -> Option<TypeSnapshot> {
        self.cache.with_read(|state| {
            state
                .hash_index()
                .get(hash)
                .and_then(|id| snapshot(state, id))
        })
    }

    /// All types currently in the cache, stubs included.
    pub fn find_all(&self) -> Vec<TypeSnapshot> {
        self.cache.with_read(|state| {
            state
                .fqn_index()
                .all()
                .into_iter()
                .filter_map(|id| snapshot(state, id))
                .collect()
        })
    }

    /// All types whose FQN matches the `*`-wildcard pattern.
    pub fn find_by_pattern(&self, pattern: &str, only_initialized: bool) -> Vec<TypeSnapshot> {
        let compiled = match MatchPattern::compile(pattern) {
            Ok(compiled) => compiled,
            Err(err) => {
                warn!(%pattern, %err, "pattern lookup failed, returning no results");
                return Vec::new();
            }
        };
        self.cache.with_read(|state| {
            state
                .fqn_index()
                .find_by_pattern(&compiled)
                .into_iter()
                .filter_map(|id| snapshot(state, id))
                .filter(|snapshot| !only_initialized || snapshot.initialized)
                .collect()
        })
    }

    /// Classes matching the pattern.
    pub fn find_classes_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Vec<TypeSnapshot> {
        self.find_by_pattern(pattern, only_initialized)
            .into_iter()
            .filter(|s| s.kind == TypeKindTag::Class)
            .collect()
    }

    /// Interfaces matching the pattern.
    pub fn find_interfaces_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Vec<TypeSnapshot> {
        self.find_by_pattern(pattern, only_initialized)
            .into_iter()
            .filter(|s| s.kind == TypeKindTag::Interface)
            .collect()
    }

    /// Annotations matching the pattern.
    pub fn find_annotations_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Vec<TypeSnapshot> {
        self.find_by_pattern(pattern, only_initialized)
            .into_iter()
            .filter(|s| s.kind == TypeKindTag::Annotation)
            .collect()
    }

    /// Exception classes matching the pattern.
    pub fn find_exception_classes_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Vec<TypeSnapshot> {
        self.find_by_pattern(pattern, only_initialized)
            .into_iter()
            .filter(|s| s.kind == TypeKindTag::Class && s.exception)
            .collect()
    }
}
