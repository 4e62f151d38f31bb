//! Frozen provenance graph
//!
//! [`ProvenanceGraph`] can only be obtained through [`ProvenanceGraph::freeze`],
//! which validates every edge against the node arena. Once frozen the graph
//! is read-only.

use crate::annotation::{Anomaly, UnresolvedDerivation};
use crate::edge::{Edge, EdgeKind};
use crate::error::ModelError;
use crate::id::{AgentId, ItemId, Namespace, NodeId, NodeKind, OperationId, PlanId, StableKey, UploadId};
use crate::node::{part_key, ActivityNode, AgentNode, AssociationNode, ItemNode, Node};
use crate::plan::Plan;
use crate::well::Well;
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashMap, HashSet};

/// Raw material handed to [`ProvenanceGraph::freeze`]
#[derive(Debug, Default)]
pub struct GraphParts {
    /// Nodes in construction order; index is the [`NodeId`]
    pub nodes: Vec<Node>,
    /// Edges; duplicates are collapsed on freeze
    pub edges: Vec<Edge>,
    /// Plans in request order
    pub plans: Vec<Plan>,
    /// Outputs the resolver could not link
    pub unresolved: Vec<UnresolvedDerivation>,
}

/// Validated, deduplicated provenance graph
#[derive(Debug, Clone)]
pub struct ProvenanceGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    index: HashMap<(Namespace, StableKey), NodeId>,
    plans: Vec<Plan>,
    unresolved: Vec<UnresolvedDerivation>,
    anomalies: Vec<Anomaly>,
}

impl ProvenanceGraph {
    /// Validate and freeze
    ///
    /// Checks that every edge endpoint exists and has a kind the relation
    /// allows, and that no item is derived from itself. Duplicate edges are
    /// collapsed keeping the first origin. Unresolved annotations are kept as
    /// given, even when another activity derives the same output. Derivation
    /// cycles are recorded as [`Anomaly::DerivationCycle`].
    ///
    /// # Errors
    /// The first invariant violation found
    pub fn freeze(parts: GraphParts) -> Result<Self, ModelError> {
        let GraphParts {
            nodes,
            edges,
            plans,
            unresolved,
        } = parts;

        let mut seen = HashSet::with_capacity(edges.len());
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            validate_edge(&nodes, &edge)?;
            if seen.insert(edge.key()) {
                kept.push(edge);
            }
        }

        for plan in &plans {
            for activity in &plan.activities {
                match nodes.get(activity.index()) {
                    Some(Node::Activity(_)) => {}
                    Some(_) | None => return Err(ModelError::UnknownNode(*activity)),
                }
            }
        }

        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (i, edge) in kept.iter().enumerate() {
            outgoing[edge.from.index()].push(i);
            incoming[edge.to.index()].push(i);
        }

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.insert(
                (node.kind().namespace(), node.key().clone()),
                NodeId::from_index(i),
            );
        }

        let anomalies = derivation_cycles(&kept);
        for anomaly in &anomalies {
            tracing::warn!(%anomaly, "derivation cycle in trace");
        }

        Ok(Self {
            nodes,
            edges: kept,
            outgoing,
            incoming,
            index,
            plans,
            unresolved,
            anomalies,
        })
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node by id
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Node id by namespace and stable key
    #[must_use]
    pub fn lookup(&self, namespace: Namespace, key: &StableKey) -> Option<NodeId> {
        self.index.get(&(namespace, key.clone())).copied()
    }

    /// Activity node id by operation id
    #[must_use]
    pub fn activity_id(&self, operation: &OperationId) -> Option<NodeId> {
        self.lookup(Namespace::Activity, &StableKey::from(operation))
    }

    /// Activity by operation id
    #[must_use]
    pub fn activity(&self, operation: &OperationId) -> Option<&ActivityNode> {
        self.activity_id(operation)
            .and_then(|id| self.node(id))
            .and_then(Node::as_activity)
    }

    /// Item or collection node id by item id
    #[must_use]
    pub fn item_id(&self, item: &ItemId) -> Option<NodeId> {
        self.lookup(Namespace::Entity, &StableKey::from(item))
    }

    /// Item or collection by item id
    #[must_use]
    pub fn item(&self, item: &ItemId) -> Option<&ItemNode> {
        self.item_id(item)
            .and_then(|id| self.node(id))
            .and_then(Node::as_item)
    }

    /// Part node id by collection id and well
    #[must_use]
    pub fn part_id(&self, collection: &ItemId, well: Well) -> Option<NodeId> {
        self.lookup(Namespace::Entity, &part_key(collection, well))
    }

    /// Part by collection id and well
    #[must_use]
    pub fn part(&self, collection: &ItemId, well: Well) -> Option<&ItemNode> {
        self.part_id(collection, well)
            .and_then(|id| self.node(id))
            .and_then(Node::as_item)
    }

    /// Data association by upload id
    #[must_use]
    pub fn association(&self, upload: &UploadId) -> Option<&AssociationNode> {
        self.lookup(Namespace::Association, &StableKey::from(upload))
            .and_then(|id| self.node(id))
            .and_then(Node::as_association)
    }

    /// Agent by agent id
    #[must_use]
    pub fn agent(&self, agent: &AgentId) -> Option<&AgentNode> {
        self.lookup(Namespace::Agent, &StableKey::from(agent))
            .and_then(|id| self.node(id))
            .and_then(Node::as_agent)
    }

    /// Item view of a node id
    #[inline]
    #[must_use]
    pub fn item_node(&self, id: NodeId) -> Option<&ItemNode> {
        self.node(id).and_then(Node::as_item)
    }

    /// Activity view of a node id
    #[inline]
    #[must_use]
    pub fn activity_node(&self, id: NodeId) -> Option<&ActivityNode> {
        self.node(id).and_then(Node::as_activity)
    }

    /// Edges starting at a node
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id.index())
            .into_iter()
            .flatten()
            .map(|i| &self.edges[*i])
    }

    /// Edges ending at a node
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(id.index())
            .into_iter()
            .flatten()
            .map(|i| &self.edges[*i])
    }

    /// Inputs an item was derived from
    #[must_use]
    pub fn derived_from(&self, item: NodeId) -> Vec<NodeId> {
        self.outgoing(item)
            .filter(|e| e.kind == EdgeKind::Derivation)
            .map(|e| e.to)
            .collect()
    }

    /// Activities that generated an item
    #[must_use]
    pub fn generated_by(&self, item: NodeId) -> Vec<NodeId> {
        self.incoming(item)
            .filter(|e| e.kind == EdgeKind::Generation)
            .map(|e| e.from)
            .collect()
    }

    /// Nodes in construction order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_index(i), n))
    }

    /// All edges
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges of one kind
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Plans in request order
    #[inline]
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Plan by id
    #[must_use]
    pub fn plan(&self, id: &PlanId) -> Option<&Plan> {
        self.plans.iter().find(|p| &p.id == id)
    }

    /// Outputs left without a derivation
    #[inline]
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedDerivation] {
        &self.unresolved
    }

    /// Structural anomalies found while freezing
    #[inline]
    #[must_use]
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Whether an item is a trace input
    ///
    /// A trace input is a whole item or collection that no activity in the
    /// trace generated and that is not derived from anything in the trace.
    #[must_use]
    pub fn is_input(&self, id: NodeId) -> bool {
        let Some(item) = self.item_node(id) else {
            return false;
        };
        !item.is_part()
            && !self.incoming(id).any(|e| e.kind == EdgeKind::Generation)
            && !self.outgoing(id).any(|e| e.kind == EdgeKind::Derivation)
    }

    /// Trace inputs in construction order
    #[must_use]
    pub fn inputs(&self) -> Vec<NodeId> {
        self.iter()
            .map(|(id, _)| id)
            .filter(|id| self.is_input(*id))
            .collect()
    }

    /// Deterministic content fingerprint
    ///
    /// SHA-256 over sorted node keys and sorted edges expressed in keys, so
    /// two passes over the same data agree regardless of arena order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();

        let mut nodes: Vec<(&str, &str)> = self
            .nodes
            .iter()
            .map(|n| (n.kind().label(), n.key().as_str()))
            .collect();
        nodes.sort_unstable();
        for (kind, key) in nodes {
            hasher.update(kind.as_bytes());
            hasher.update([0u8]);
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
        }

        let mut edges: Vec<(&str, &str, &str, &str, &str)> = self
            .edges
            .iter()
            .map(|e| {
                let from = &self.nodes[e.from.index()];
                let to = &self.nodes[e.to.index()];
                (
                    e.kind.label(),
                    from.kind().label(),
                    from.key().as_str(),
                    to.kind().label(),
                    to.key().as_str(),
                )
            })
            .collect();
        edges.sort_unstable();
        for (kind, from_kind, from, to_kind, to) in edges {
            for part in [kind, from_kind, from, to_kind, to] {
                hasher.update(part.as_bytes());
                hasher.update([0u8]);
            }
        }

        hex::encode(hasher.finalize())
    }
}

fn validate_edge(nodes: &[Node], edge: &Edge) -> Result<(), ModelError> {
    let endpoint = |id: NodeId| {
        nodes.get(id.index()).ok_or(ModelError::DanglingEdge {
            kind: edge.kind,
            from: edge.from,
            to: edge.to,
            missing: id,
        })
    };
    let from = endpoint(edge.from)?.kind();
    let to = endpoint(edge.to)?.kind();

    let (from_ok, to_ok) = match edge.kind {
        EdgeKind::Usage | EdgeKind::Generation => (from == NodeKind::Activity, to.is_entity()),
        EdgeKind::Derivation => (from.is_entity(), to.is_entity()),
        EdgeKind::Attribution => (from == NodeKind::Activity, to == NodeKind::Agent),
        EdgeKind::Membership => (from == NodeKind::Part, to == NodeKind::Collection),
        EdgeKind::Attachment => (
            from == NodeKind::DataAssociation,
            to.is_entity() || to == NodeKind::Activity,
        ),
    };
    let bad = if !from_ok {
        Some((edge.from, from))
    } else if !to_ok {
        Some((edge.to, to))
    } else {
        None
    };
    if let Some((node, found)) = bad {
        return Err(ModelError::EndpointKind {
            kind: edge.kind,
            from: edge.from,
            to: edge.to,
            node,
            found,
        });
    }

    if edge.kind == EdgeKind::Derivation && edge.from == edge.to {
        return Err(ModelError::SelfDerivation { node: edge.from });
    }
    Ok(())
}

fn derivation_cycles(edges: &[Edge]) -> Vec<Anomaly> {
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for edge in edges.iter().filter(|e| e.kind == EdgeKind::Derivation) {
        graph.add_edge(edge.from, edge.to, ());
    }
    if !petgraph::algo::is_cyclic_directed(&graph) {
        return Vec::new();
    }
    petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|mut items| {
            items.sort_unstable();
            Anomaly::DerivationCycle { items }
        })
        .collect()
}
