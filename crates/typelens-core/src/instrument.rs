//! Instrumentation coordination.
//!
//! Appliers are external policy objects that decide which methods of a
//! class get instrumented and how; the coordinator only selects candidate
//! class nodes, runs the appliers under the write lock, and collects
//! instrumentation definitions for classes that actually carry points.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lookup::{snapshot, TypeSnapshot};
use crate::model::{
    MethodInstrumentationConfig, MethodNode, Modifiers, TypeId, TypeKind, TypeKindTag, TypeNode,
};
use crate::pattern::MatchPattern;
use crate::store::{CacheState, TypeCache};

/// Configuration of one connected agent, as far as instrumentation
/// decisions need it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Id of the agent's platform.
    pub platform_id: u64,
    /// Whether the server already holds a type graph for this agent, so the
    /// agent may rely on its sending cache.
    pub class_cache_exists: bool,
}

/// Instrumentation for one class, shipped to agents by an external
/// transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationDefinition {
    /// Fully qualified name of the instrumented class.
    pub class_fqn: String,
    /// Per-method instrumentation configurations. Never empty.
    pub method_instrumentation_configs: Vec<MethodInstrumentationConfig>,
}

/// Mutable view of one class node handed to appliers.
///
/// Appliers can inspect the class and set or clear per-method
/// instrumentation points, but cannot touch the graph structure.
pub struct ClassMut<'a> {
    fqn: &'a str,
    modifiers: Option<Modifiers>,
    exception: bool,
    methods: &'a mut Vec<MethodNode>,
}

impl ClassMut<'_> {
    pub fn fqn(&self) -> &str {
        self.fqn
    }

    pub fn modifiers(&self) -> Option<Modifiers> {
        self.modifiers
    }

    pub fn is_exception(&self) -> bool {
        self.exception
    }

    pub fn methods(&self) -> &[MethodNode] {
        self.methods
    }

    pub fn methods_mut(&mut self) -> &mut [MethodNode] {
        self.methods
    }

    pub fn has_instrumentation_points(&self) -> bool {
        self.methods.iter().any(|m| m.instrumentation.is_some())
    }
}

/// Targeting data of an applier: which classes it applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorAssignment {
    /// Class FQN or `*`-wildcard pattern.
    pub class_name: String,
    /// `class_name` names an interface; target its realizing classes.
    #[serde(default)]
    pub interface: bool,
    /// `class_name` names a superclass; target its subclasses.
    #[serde(default)]
    pub superclass: bool,
    /// Only classes carrying this annotation (FQN or pattern).
    #[serde(default)]
    pub annotation: Option<String>,
}

/// External policy object deciding instrumentation-point changes on a
/// class.
pub trait InstrumentationApplier: Send + Sync {
    /// Targeting for candidate narrowing; `None` means "consider every
    /// class in the cache".
    fn sensor_assignment(&self) -> Option<&SensorAssignment> {
        None
    }

    /// Add instrumentation points to the class. Returns whether anything
    /// changed.
    fn add_instrumentation_points(&self, config: &AgentConfig, class: &mut ClassMut<'_>) -> bool;

    /// Remove the instrumentation points this applier is responsible for.
    /// Returns whether anything changed.
    fn remove_instrumentation_points(&self, class: &mut ClassMut<'_>) -> bool;
}

/// Applier that removes every instrumentation point. Used as the default
/// for removal operations.
pub struct RemoveAllApplier;

impl InstrumentationApplier for RemoveAllApplier {
    fn add_instrumentation_points(&self, _config: &AgentConfig, _class: &mut ClassMut<'_>) -> bool {
        false
    }

    fn remove_instrumentation_points(&self, class: &mut ClassMut<'_>) -> bool {
        let mut removed = false;
        for method in class.methods_mut() {
            if method.instrumentation.take().is_some() {
                removed = true;
            }
        }
        removed
    }
}

/// Narrows the candidate set for an applier with a sensor assignment.
pub trait SearchNarrower: Send + Sync {
    fn narrow(&self, cache: &TypeCache, assignment: &SensorAssignment) -> Vec<TypeId>;
}

/// Default narrower: resolves the assignment's class pattern against the
/// FQN index and walks the graph for interface / superclass / annotation
/// targeting.
pub struct PatternSearchNarrower;

impl SearchNarrower for PatternSearchNarrower {
    fn narrow(&self, cache: &TypeCache, assignment: &SensorAssignment) -> Vec<TypeId> {
        let Ok(pattern) = MatchPattern::compile(&assignment.class_name) else {
            return Vec::new();
        };
        cache.with_read(|state| {
            if assignment.superclass {
                narrow_by_superclass(state, &pattern)
            } else if assignment.interface {
                narrow_by_interface(state, &pattern)
            } else if let Some(annotation) = &assignment.annotation {
                match MatchPattern::compile(annotation) {
                    Ok(annotation_pattern) => narrow_by_annotation(state, &annotation_pattern),
                    Err(_) => Vec::new(),
                }
            } else {
                narrow_by_name(state, &pattern)
            }
        })
    }
}

fn narrow_by_name(state: &CacheState, pattern: &MatchPattern) -> Vec<TypeId> {
    state
        .fqn_index()
        .find_by_pattern(pattern)
        .into_iter()
        .filter(|&id| is_initialized_class(state, id))
        .collect()
}

fn narrow_by_superclass(state: &CacheState, pattern: &MatchPattern) -> Vec<TypeId> {
    let mut result = BTreeSet::new();
    for id in state.fqn_index().find_by_pattern(pattern) {
        if matches!(
            state.arena().get(id).map(|n| n.kind_tag()),
            Some(TypeKindTag::Class)
        ) {
            result.extend(state.arena().transitive_subclasses(id));
        }
    }
    result
        .into_iter()
        .filter(|&id| is_initialized_class(state, id))
        .collect()
}

fn narrow_by_interface(state: &CacheState, pattern: &MatchPattern) -> Vec<TypeId> {
    let mut result = BTreeSet::new();
    for id in state.fqn_index().find_by_pattern(pattern) {
        if matches!(
            state.arena().get(id).map(|n| n.kind_tag()),
            Some(TypeKindTag::Interface)
        ) {
            result.extend(state.arena().transitive_realizing_classes(id));
        }
    }
    result
        .into_iter()
        .filter(|&id| is_initialized_class(state, id))
        .collect()
}

fn narrow_by_annotation(state: &CacheState, pattern: &MatchPattern) -> Vec<TypeId> {
    let mut result = BTreeSet::new();
    for id in state.fqn_index().find_by_pattern(pattern) {
        let Some(data) = state.arena().get(id).and_then(|n| n.as_annotation()) else {
            continue;
        };
        for &annotated in &data.annotated_refs {
            match state.arena().get(annotated).map(|n| n.kind_tag()) {
                Some(TypeKindTag::Class) => {
                    result.insert(annotated);
                }
                Some(TypeKindTag::Interface) => {
                    result.extend(state.arena().transitive_realizing_classes(annotated));
                }
                _ => {}
            }
        }
    }
    result
        .into_iter()
        .filter(|&id| is_initialized_class(state, id))
        .collect()
}

fn is_initialized_class(state: &CacheState, id: TypeId) -> bool {
    state
        .arena()
        .get(id)
        .map(|n| n.kind_tag() == TypeKindTag::Class && n.initialized())
        .unwrap_or(false)
}

/// Instrumentation service of a [`TypeCache`].
pub struct CacheInstrumentation<'a> {
    cache: &'a TypeCache,
    narrower: Box<dyn SearchNarrower>,
}

impl<'a> CacheInstrumentation<'a> {
    pub(crate) fn new(cache: &'a TypeCache) -> Self {
        CacheInstrumentation {
            cache,
            narrower: Box::new(PatternSearchNarrower),
        }
    }

    /// Replace the search narrower.
    pub fn with_narrower(mut self, narrower: Box<dyn SearchNarrower>) -> Self {
        self.narrower = narrower;
        self
    }

    /// Run the appliers against the whole cache, narrowing candidates per
    /// applier assignment. Returns the classes that gained points.
    pub fn add_instrumentation_points(
        &self,
        config: &AgentConfig,
        appliers: &[&dyn InstrumentationApplier],
    ) -> Vec<TypeSnapshot> {
        let mut results = Vec::new();
        let mut seen = BTreeSet::new();
        for applier in appliers {
            let candidates = match applier.sensor_assignment() {
                Some(assignment) => self.narrower.narrow(self.cache, assignment),
                None => self.cache.with_read(|state| state.fqn_index().all()),
            };
            for changed in self.add_instrumentation_points_for(&candidates, config, appliers) {
                if seen.insert(changed.id) {
                    results.push(changed);
                }
            }
        }
        results
    }

    /// Run the appliers against the given types under one write lock. Only
    /// initialized classes are considered. Returns the classes that gained
    /// points.
    pub fn add_instrumentation_points_for(
        &self,
        ids: &[TypeId],
        config: &AgentConfig,
        appliers: &[&dyn InstrumentationApplier],
    ) -> Vec<TypeSnapshot> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.cache.with_write(|state| {
            let mut changed = Vec::new();
            for &id in ids {
                let added = with_class_mut(state, id, |class| {
                    let mut added = false;
                    for applier in appliers {
                        added |= applier.add_instrumentation_points(config, class);
                    }
                    added
                });
                if added == Some(true) {
                    changed.push(id);
                }
            }
            debug!(
                candidates = ids.len(),
                instrumented = changed.len(),
                "instrumentation points added"
            );
            changed
                .into_iter()
                .filter_map(|id| snapshot(state, id))
                .collect()
        })
    }

    /// Run the appliers against one class and, if they changed anything,
    /// return its definition.
    pub fn add_and_get_instrumentation_result(
        &self,
        id: TypeId,
        config: &AgentConfig,
        appliers: &[&dyn InstrumentationApplier],
    ) -> Option<InstrumentationDefinition> {
        self.cache.with_write(|state| {
            let added = with_class_mut(state, id, |class| {
                let mut added = false;
                for applier in appliers {
                    added |= applier.add_instrumentation_points(config, class);
                }
                added
            });
            if added == Some(true) {
                state.arena().get(id).and_then(definition_for)
            } else {
                None
            }
        })
    }

    /// Definitions for every initialized class currently carrying points.
    pub fn get_instrumentation_results(&self) -> Vec<InstrumentationDefinition> {
        self.cache.with_read(|state| {
            state
                .arena()
                .iter()
                .filter(|node| node.initialized())
                .filter_map(definition_for)
                .collect()
        })
    }

    /// Definitions for the given types; non-classes and uninitialized
    /// types are skipped.
    pub fn get_instrumentation_results_for(&self, ids: &[TypeId]) -> Vec<InstrumentationDefinition> {
        self.cache.with_read(|state| {
            ids.iter()
                .filter_map(|&id| state.arena().get(id))
                .filter(|node| node.initialized())
                .filter_map(definition_for)
                .collect()
        })
    }

    /// Definitions keyed by each class's hash set, for bulk agent-config
    /// distribution.
    pub fn get_instrumentation_results_with_hashes(
        &self,
    ) -> HashMap<BTreeSet<String>, InstrumentationDefinition> {
        self.cache.with_read(|state| {
            state
                .arena()
                .iter()
                .filter(|node| node.initialized())
                .filter_map(|node| definition_for(node).map(|d| (node.hashes.clone(), d)))
                .collect()
        })
    }

    /// Hash-keyed definitions for the given types.
    pub fn get_instrumentation_results_with_hashes_for(
        &self,
        ids: &[TypeId],
    ) -> HashMap<BTreeSet<String>, InstrumentationDefinition> {
        self.cache.with_read(|state| {
            ids.iter()
                .filter_map(|&id| state.arena().get(id))
                .filter(|node| node.initialized())
                .filter_map(|node| definition_for(node).map(|d| (node.hashes.clone(), d)))
                .collect()
        })
    }

    /// Remove every instrumentation point in the cache.
    pub fn remove_all_instrumentation_points(&self) -> Vec<TypeSnapshot> {
        let ids = self.cache.with_read(|state| state.fqn_index().all());
        self.remove_instrumentation_points_for(&ids, &[&RemoveAllApplier])
    }

    /// Remove the instrumentation points the given appliers are
    /// responsible for, from the given types. Returns the classes that
    /// lost points.
    pub fn remove_instrumentation_points_for(
        &self,
        ids: &[TypeId],
        appliers: &[&dyn InstrumentationApplier],
    ) -> Vec<TypeSnapshot> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.cache.with_write(|state| {
            let mut changed = Vec::new();
            for &id in ids {
                let removed = with_class_mut(state, id, |class| {
                    let mut removed = false;
                    for applier in appliers {
                        removed |= applier.remove_instrumentation_points(class);
                    }
                    removed
                });
                if removed == Some(true) {
                    changed.push(id);
                }
            }
            changed
                .into_iter()
                .filter_map(|id| snapshot(state, id))
                .collect()
        })
    }
}

/// Run `body` with a mutable class view of `id`. Returns `None` if the node
/// is missing, not a class, or not initialized.
fn with_class_mut<T>(
    state: &mut CacheState,
    id: TypeId,
    body: impl FnOnce(&mut ClassMut<'_>) -> T,
) -> Option<T> {
    let exception = state.arena().is_exception(id);
    let node = state.arena.get_mut(id)?;
    if !node.initialized() {
        return None;
    }
    let TypeNode {
        fqn,
        modifiers,
        kind,
        ..
    } = node;
    let TypeKind::Class(data) = kind else {
        return None;
    };
    let mut class = ClassMut {
        fqn: fqn.as_str(),
        modifiers: *modifiers,
        exception,
        methods: &mut data.methods,
    };
    Some(body(&mut class))
}

/// Definition for a class node, or `None` when it has no points.
fn definition_for(node: &TypeNode) -> Option<InstrumentationDefinition> {
    if !node.has_instrumentation_points() {
        return None;
    }
    Some(InstrumentationDefinition {
        class_fqn: node.fqn.clone(),
        method_instrumentation_configs: node.instrumentation_points(),
    })
}
