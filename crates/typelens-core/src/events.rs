//! Change events produced by the merge engine.
//!
//! Every mutation of the graph fires events synchronously while the write
//! lock is held: first into the internal indices, then to registered
//! listeners, and finally into the [`Events`] batch returned to the caller.
//! Listeners can therefore assume single-threaded execution and a graph
//! that already reflects the event.

use serde::Serialize;

use crate::model::TypeId;

/// What happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEventKind {
    New,
    Changed,
    Removed,
}

/// Detail of a node event. Removals carry no detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeEventDetail {
    /// The node became initialized (its own fragment arrived).
    Initialized,
    /// A stub node was created for a referenced, not yet observed FQN.
    NotInitialized,
    /// A new content hash was recorded on an initialized node.
    HashAdded,
    /// The merged modifier set changed.
    ModifiersChanged,
    /// A method was added or its metadata changed.
    MethodChangedOrAdded,
}

/// A node-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEvent {
    pub id: TypeId,
    pub fqn: String,
    pub kind: NodeEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<NodeEventDetail>,
}

impl NodeEvent {
    pub fn new(
        id: TypeId,
        fqn: impl Into<String>,
        kind: NodeEventKind,
        detail: Option<NodeEventDetail>,
    ) -> Self {
        NodeEvent {
            id,
            fqn: fqn.into(),
            kind,
            detail,
        }
    }
}

/// Kind of edge a [`ReferenceEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRelation {
    Annotation,
    Superclass,
    RealizeInterface,
    SuperInterface,
}

/// A newly wired edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceEvent {
    pub from: TypeId,
    pub to: TypeId,
    pub relation: ReferenceRelation,
}

/// All events produced by one merge call, in firing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Events {
    pub node_events: Vec<NodeEvent>,
    pub reference_events: Vec<ReferenceEvent>,
}

impl Events {
    pub fn new() -> Self {
        Events::default()
    }

    pub fn is_empty(&self) -> bool {
        self.node_events.is_empty() && self.reference_events.is_empty()
    }

    /// Node events matching the given kind and detail.
    pub fn node_events_with(
        &self,
        kind: NodeEventKind,
        detail: Option<NodeEventDetail>,
    ) -> Vec<&NodeEvent> {
        self.node_events
            .iter()
            .filter(|e| e.kind == kind && e.detail == detail)
            .collect()
    }
}

/// Receiver for change notifications, invoked synchronously while the write
/// lock is held. Implementations must not call back into the cache.
pub trait CacheUpdateListener: Send + Sync {
    fn node_changed(&mut self, event: &NodeEvent);
    fn reference_changed(&mut self, event: &ReferenceEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_serializes_without_detail() {
        let event = NodeEvent::new(TypeId::new(3), "com.acme.Foo", NodeEventKind::Removed, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("detail"));
        assert!(json.contains("\"kind\":\"removed\""));
    }

    #[test]
    fn empty_batch_reports_empty() {
        assert!(Events::new().is_empty());
    }

    #[test]
    fn filters_node_events_by_kind_and_detail() {
        let mut events = Events::new();
        events.node_events.push(NodeEvent::new(
            TypeId::new(0),
            "a.B",
            NodeEventKind::New,
            Some(NodeEventDetail::Initialized),
        ));
        events.node_events.push(NodeEvent::new(
            TypeId::new(1),
            "a.C",
            NodeEventKind::New,
            Some(NodeEventDetail::NotInitialized),
        ));

        let stubs =
            events.node_events_with(NodeEventKind::New, Some(NodeEventDetail::NotInitialized));
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].fqn, "a.C");
    }
}
