//! Model invariant violations

use crate::edge::EdgeKind;
use crate::id::{NodeId, NodeKind, StableKey, UploadId};
use crate::node::AttachTarget;

/// A provenance model invariant was violated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Edge endpoint was never interned
    #[error("dangling {kind} edge {from} -> {to}: {missing} is not in the trace")]
    DanglingEdge {
        /// Relation kind
        kind: EdgeKind,
        /// Dependent endpoint
        from: NodeId,
        /// Depended-on endpoint
        to: NodeId,
        /// The endpoint that does not exist
        missing: NodeId,
    },

    /// Edge endpoint has the wrong kind for the relation
    #[error("{kind} edge {from} -> {to}: endpoint {node} is a {found}")]
    EndpointKind {
        /// Relation kind
        kind: EdgeKind,
        /// Dependent endpoint
        from: NodeId,
        /// Depended-on endpoint
        to: NodeId,
        /// Offending endpoint
        node: NodeId,
        /// Its actual kind
        found: NodeKind,
    },

    /// Item derived from itself
    #[error("item {node} derived from itself")]
    SelfDerivation {
        /// The item
        node: NodeId,
    },

    /// Part registration on a non-collection
    #[error("item {key} is not a collection")]
    NotACollection {
        /// Item key
        key: StableKey,
    },

    /// Attempt to re-parent a part or replace a well's part
    #[error("part {key} already registered as {existing}, refusing {attempted}")]
    ParentConflict {
        /// Part key
        key: StableKey,
        /// Registered part
        existing: NodeId,
        /// Rejected part
        attempted: NodeId,
    },

    /// Second attach of a data association
    #[error("association {upload} already attached to {existing:?}, refusing {attempted:?}")]
    AssociationTargetConflict {
        /// Upload id
        upload: UploadId,
        /// Existing target
        existing: AttachTarget,
        /// Rejected target
        attempted: AttachTarget,
    },

    /// Node id outside the arena
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

impl ModelError {
    /// Whether the error reflects inconsistent source data rather than a
    /// programming error in a fix-up or the engine
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::ParentConflict { .. } | Self::AssociationTargetConflict { .. }
        )
    }
}
