//! Consistency check of a frozen graph
//!
//! Read-only. Findings are logged at `warn` and returned; they never fail a
//! pass.

use crate::config::CheckConfig;
use labtrace_model::{EdgeKind, ItemId, ItemNode, NodeId, OperationId, ProvenanceGraph};
use labtrace_source::RecordSource;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Something in the graph that looks wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// An operation's input item is not a node
    MissingInput {
        /// Operation
        operation: OperationId,
        /// Input item
        item: ItemId,
    },
    /// An item or part has no sample type
    NoSampleType {
        /// Node
        item: NodeId,
    },
    /// An item has no generating activity but is not a trace input
    NoGenerator {
        /// Node
        item: NodeId,
    },
    /// A part has no derivation although its collection does
    PartNotDerived {
        /// Part node
        part: NodeId,
        /// Derived collection
        collection: NodeId,
    },
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput { operation, item } => {
                write!(f, "input {item} of operation {operation} is not in the trace")
            }
            Self::NoSampleType { item } => write!(f, "{item} has no sample type"),
            Self::NoGenerator { item } => write!(f, "{item} has no generator"),
            Self::PartNotDerived { part, collection } => {
                write!(f, "{part} has no sources, but its collection {collection} does")
            }
        }
    }
}

/// Result of a consistency check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Findings in graph order
    pub findings: Vec<Finding>,
}

impl CheckReport {
    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Check a graph against the records it was built from
#[must_use]
pub fn check_graph(graph: &ProvenanceGraph, source: &dyn RecordSource, config: &CheckConfig) -> CheckReport {
    let stop: HashSet<&ItemId> = config.stop_list.iter().collect();
    let mut findings = Vec::new();

    for plan in graph.plans() {
        for operation in source.operations(&plan.id) {
            for input in &operation.inputs {
                if graph.item_id(&input.item).is_none() && !stop.contains(&input.item) {
                    findings.push(Finding::MissingInput {
                        operation: operation.id.clone(),
                        item: input.item.clone(),
                    });
                }
            }
        }
    }

    for (id, node) in graph.iter() {
        let Some(item) = node.as_item() else {
            continue;
        };
        if is_stopped(graph, item, &stop) {
            continue;
        }
        if !item.is_collection() && item.sample_type.is_none() {
            findings.push(Finding::NoSampleType { item: id });
        }

        let generated = !graph.generated_by(id).is_empty();
        match item.collection_node() {
            None => {
                if !generated && !graph.is_input(id) {
                    findings.push(Finding::NoGenerator { item: id });
                }
            }
            Some(collection) => {
                if !generated && !graph.generated_by(collection).is_empty() {
                    findings.push(Finding::NoGenerator { item: id });
                }
                let part_derived = graph.outgoing(id).any(|e| e.kind == EdgeKind::Derivation);
                if !part_derived && !graph.derived_from(collection).is_empty() {
                    findings.push(Finding::PartNotDerived {
                        part: id,
                        collection,
                    });
                }
            }
        }
    }

    for finding in &findings {
        tracing::warn!(%finding, "consistency check");
    }
    tracing::info!(findings = findings.len(), "consistency check done");
    CheckReport { findings }
}

fn is_stopped(graph: &ProvenanceGraph, item: &ItemNode, stop: &HashSet<&ItemId>) -> bool {
    if item.item_id().is_some_and(|id| stop.contains(id)) {
        return true;
    }
    item.collection_node()
        .and_then(|c| graph.item_node(c))
        .and_then(ItemNode::item_id)
        .is_some_and(|id| stop.contains(id))
}
