//! labtrace provenance model
//!
//! Data structures for PROV-style provenance of laboratory execution traces
//! and the invariant checks that guard them.
//!
//! # Core Concepts
//!
//! - [`Node`]: items, collections, parts, activities, data associations, agents
//! - [`Edge`]: usage, generation, derivation, attribution, membership, attachment
//! - [`ProvenanceGraph`]: frozen, validated result of one assembly pass
//! - [`UnresolvedDerivation`]: outputs that could not be linked to an input
//!
//! # Example
//!
//! ```rust,ignore
//! use labtrace_model::{ItemId, Well};
//!
//! let graph = labtrace_core::assemble(&snapshot, &plans, &mut pipeline)?;
//! let part = graph.part(&ItemId::new("500"), "B2".parse::<Well>()?);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod annotation;
mod attributes;
mod edge;
mod error;
mod graph;
mod id;
mod node;
mod plan;
mod well;

pub use annotation::{Anomaly, UnresolvedDerivation, UnresolvedReason};
pub use attributes::Attributes;
pub use edge::{Edge, EdgeKind, EdgeOrigin};
pub use error::ModelError;
pub use graph::{GraphParts, ProvenanceGraph};
pub use id::{
    AgentId, ItemId, JobId, Namespace, NodeId, NodeKind, OperationId, PlanId, StableKey, UploadId,
};
pub use node::{
    part_key, ActivityNode, AgentNode, AssociationNode, AttachTarget, Binding, ItemNode,
    Membership, Node, ObjectType, OperationType, Parameter, RoutingTable, Sample, SampleType,
};
pub use plan::Plan;
pub use well::{Well, WellError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
