//! Trace builder
//!
//! Wraps the [`IdentityRegistry`] with the edge set, plans and annotations
//! of a pass in progress. Every edge is checked against the arena when it is
//! added, so a dangling reference is caught where it is introduced rather
//! than at freeze time.

use crate::error::RegistryError;
use crate::registry::IdentityRegistry;
use labtrace_model::{
    part_key, ActivityNode, AgentNode, AssociationNode, AttachTarget, Edge, EdgeKind, EdgeOrigin,
    GraphParts, ItemId, ItemNode, ModelError, Namespace, Node, NodeId, NodeKind, Plan, PlanId,
    ProvenanceGraph, StableKey, UnresolvedDerivation, Well,
};
use std::collections::HashSet;

/// Mutable state of one assembly pass
#[derive(Debug, Default)]
pub struct TraceBuilder {
    registry: IdentityRegistry,
    edges: Vec<Edge>,
    edge_keys: HashSet<(EdgeKind, NodeId, NodeId)>,
    plans: Vec<Plan>,
    unresolved: Vec<UnresolvedDerivation>,
}

impl TraceBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Mutable underlying registry
    #[inline]
    pub fn registry_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.registry
    }

    /// Intern a whole item
    ///
    /// # Errors
    /// [`RegistryError::KeyConflict`] if the id is interned as a collection
    pub fn intern_item(&mut self, item_id: &ItemId) -> Result<NodeId, RegistryError> {
        let id = item_id.clone();
        self.registry.intern(NodeKind::Item, StableKey::from(item_id), || {
            Node::Item(ItemNode::whole(id))
        })
    }

    /// Intern a collection
    ///
    /// # Errors
    /// [`RegistryError::KeyConflict`] if the id is interned as a whole item
    pub fn intern_collection(&mut self, item_id: &ItemId) -> Result<NodeId, RegistryError> {
        let id = item_id.clone();
        self.registry
            .intern(NodeKind::Collection, StableKey::from(item_id), || {
                Node::Item(ItemNode::collection(id))
            })
    }

    /// Intern the part of a collection at a well
    ///
    /// Registers the part on the collection and records the membership edge.
    ///
    /// # Errors
    /// - [`ModelError::NotACollection`] if `collection` is not a collection
    /// - [`ModelError::ParentConflict`] if the well is held by another node
    pub fn intern_part(
        &mut self,
        collection: NodeId,
        well: Well,
        part_id: Option<ItemId>,
    ) -> Result<NodeId, RegistryError> {
        let collection_id = self
            .registry
            .item(collection)
            .filter(|c| c.is_collection())
            .and_then(ItemNode::item_id)
            .cloned()
            .ok_or_else(|| not_a_collection(&self.registry, collection))?;

        let part = self
            .registry
            .intern(NodeKind::Part, part_key(&collection_id, well), || {
                Node::Item(ItemNode::part(&collection_id, collection, well, part_id))
            })?;

        if let Some(coll) = self.registry.item_mut(collection) {
            coll.add_part(well, part)?;
        }
        self.add_edge(Edge::sourced(EdgeKind::Membership, part, collection))?;
        Ok(part)
    }

    /// Look up a part without interning it
    #[must_use]
    pub fn find_part(&self, collection: NodeId, well: Well) -> Option<NodeId> {
        self.registry.item(collection)?.part_at(well)
    }

    /// Look up an item or collection by platform id
    #[must_use]
    pub fn find_item(&self, item_id: &ItemId) -> Option<NodeId> {
        self.registry
            .lookup(Namespace::Entity, &StableKey::from(item_id))
    }

    /// Intern an activity; an existing activity under the same operation id
    /// is returned unchanged
    ///
    /// # Errors
    /// [`RegistryError::KeyConflict`] on kind mismatch
    pub fn intern_activity(&mut self, activity: ActivityNode) -> Result<NodeId, RegistryError> {
        let key = activity.key().clone();
        self.registry
            .intern(NodeKind::Activity, key, || Node::Activity(activity))
    }

    /// Intern an agent
    ///
    /// # Errors
    /// [`RegistryError::KeyConflict`] on kind mismatch
    pub fn intern_agent(&mut self, agent: AgentNode) -> Result<NodeId, RegistryError> {
        let key = agent.key().clone();
        self.registry.intern(NodeKind::Agent, key, || Node::Agent(agent))
    }

    /// Intern a data association
    ///
    /// # Errors
    /// [`RegistryError::KeyConflict`] on kind mismatch
    pub fn intern_association(
        &mut self,
        association: AssociationNode,
    ) -> Result<NodeId, RegistryError> {
        let key = association.key().clone();
        self.registry
            .intern(NodeKind::DataAssociation, key, || {
                Node::Association(association)
            })
    }

    /// Add an edge; returns `false` if it was already present
    ///
    /// # Errors
    /// - [`ModelError::DanglingEdge`] if an endpoint is not interned
    /// - [`ModelError::SelfDerivation`] for a derivation from an item to itself
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, RegistryError> {
        for endpoint in [edge.from, edge.to] {
            if !self.registry.contains(endpoint) {
                return Err(ModelError::DanglingEdge {
                    kind: edge.kind,
                    from: edge.from,
                    to: edge.to,
                    missing: endpoint,
                }
                .into());
            }
        }
        if edge.kind == EdgeKind::Derivation && edge.from == edge.to {
            return Err(ModelError::SelfDerivation { node: edge.from }.into());
        }
        if !self.edge_keys.insert(edge.key()) {
            return Ok(false);
        }
        if edge.origin.is_heuristic() {
            tracing::info!(kind = %edge.kind, from = %edge.from, to = %edge.to, origin = %edge.origin, "heuristic edge");
        }
        self.edges.push(edge);
        Ok(true)
    }

    /// Whether an edge is present
    #[inline]
    #[must_use]
    pub fn has_edge(&self, kind: EdgeKind, from: NodeId, to: NodeId) -> bool {
        self.edge_keys.contains(&(kind, from, to))
    }

    /// Edges of one kind starting at a node
    pub fn outgoing(&self, from: NodeId, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| e.from == from && e.kind == kind)
    }

    /// Edges of one kind ending at a node
    pub fn incoming(&self, to: NodeId, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(move |e| e.to == to && e.kind == kind)
    }

    /// Inputs an item is currently derived from
    #[must_use]
    pub fn derived_from(&self, item: NodeId) -> Vec<NodeId> {
        self.outgoing(item, EdgeKind::Derivation).map(|e| e.to).collect()
    }

    /// Add a derivation `output → input`
    ///
    /// # Errors
    /// As [`TraceBuilder::add_edge`]
    pub fn add_derivation(
        &mut self,
        output: NodeId,
        input: NodeId,
        origin: EdgeOrigin,
    ) -> Result<bool, RegistryError> {
        self.add_edge(Edge::derivation(output, input, origin))
    }

    /// Attach a data association to its target
    ///
    /// # Errors
    /// - [`ModelError::AssociationTargetConflict`] if already attached
    /// - [`ModelError::EndpointKind`] if the target has the wrong kind
    /// - [`ModelError::UnknownNode`] if either node is missing
    pub fn attach(&mut self, association: NodeId, target: AttachTarget) -> Result<(), RegistryError> {
        let target_kind = self
            .registry
            .get(target.node())
            .map(Node::kind)
            .ok_or(ModelError::UnknownNode(target.node()))?;
        let kind_ok = match target {
            AttachTarget::Item(_) => target_kind.is_entity(),
            AttachTarget::Activity(_) => target_kind == NodeKind::Activity,
        };
        if !kind_ok {
            return Err(ModelError::EndpointKind {
                kind: EdgeKind::Attachment,
                from: association,
                to: target.node(),
                node: target.node(),
                found: target_kind,
            }
            .into());
        }

        self.registry
            .association_mut(association)
            .ok_or(ModelError::UnknownNode(association))?
            .attach(target)?;
        self.add_edge(Edge::sourced(EdgeKind::Attachment, association, target.node()))?;
        Ok(())
    }

    /// Record an output the resolver could not link
    pub fn annotate_unresolved(&mut self, unresolved: UnresolvedDerivation) {
        tracing::warn!(
            activity = %unresolved.activity,
            output = %unresolved.output,
            role = %unresolved.role,
            reason = %unresolved.reason,
            "unresolved derivation"
        );
        self.unresolved.push(unresolved);
    }

    /// Outputs currently recorded as unresolved
    #[inline]
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedDerivation] {
        &self.unresolved
    }

    /// Whether an output is recorded as unresolved
    #[must_use]
    pub fn is_unresolved(&self, output: NodeId) -> bool {
        self.unresolved.iter().any(|u| u.output == output)
    }

    /// Register a plan
    pub fn add_plan(&mut self, plan: Plan) {
        self.plans.push(plan);
    }

    /// Plans registered so far
    #[inline]
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Mutable plan by id
    pub fn plan_mut(&mut self, id: &PlanId) -> Option<&mut Plan> {
        self.plans.iter_mut().find(|p| &p.id == id)
    }

    /// Validate and freeze into a [`ProvenanceGraph`]
    ///
    /// # Errors
    /// Any model invariant violation found by [`ProvenanceGraph::freeze`]
    pub fn freeze(self) -> Result<ProvenanceGraph, RegistryError> {
        let parts = GraphParts {
            nodes: self.registry.into_nodes(),
            edges: self.edges,
            plans: self.plans,
            unresolved: self.unresolved,
        };
        Ok(ProvenanceGraph::freeze(parts)?)
    }
}

fn not_a_collection(registry: &IdentityRegistry, id: NodeId) -> RegistryError {
    match registry.get(id) {
        Some(node) => ModelError::NotACollection {
            key: node.key().clone(),
        }
        .into(),
        None => ModelError::UnknownNode(id).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{OperationId, OperationType, UnresolvedReason, UploadId};
    use pretty_assertions::assert_eq;

    fn well(s: &str) -> Well {
        s.parse().unwrap()
    }

    fn activity(id: &str) -> ActivityNode {
        ActivityNode::new(OperationId::new(id), OperationType::named("Op"), PlanId::new("p"))
    }

    #[test]
    fn parts_are_interned_once_with_membership() {
        let mut b = TraceBuilder::new();
        let coll = b.intern_collection(&ItemId::new("500")).unwrap();
        let a1 = b.intern_part(coll, well("A1"), None).unwrap();
        let again = b.intern_part(coll, well("A1"), None).unwrap();
        assert_eq!(a1, again);
        assert_eq!(b.find_part(coll, well("A1")), Some(a1));
        assert!(b.has_edge(EdgeKind::Membership, a1, coll));

        let graph = b.freeze().unwrap();
        assert_eq!(graph.edges_of_kind(EdgeKind::Membership).count(), 1);
        assert!(graph.part(&ItemId::new("500"), well("A1")).is_some());
    }

    #[test]
    fn parts_need_a_collection() {
        let mut b = TraceBuilder::new();
        let item = b.intern_item(&ItemId::new("1")).unwrap();
        let err = b.intern_part(item, well("A1"), None).unwrap_err();
        assert!(matches!(err, RegistryError::Model(ModelError::NotACollection { .. })));
    }

    #[test]
    fn dangling_edges_are_rejected_on_add() {
        let mut b = TraceBuilder::new();
        let item = b.intern_item(&ItemId::new("1")).unwrap();
        let err = b
            .add_derivation(item, NodeId::from_index(9), EdgeOrigin::DeclaredRouting)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Model(ModelError::DanglingEdge { .. })));
    }

    #[test]
    fn self_derivation_is_rejected_on_add() {
        let mut b = TraceBuilder::new();
        let item = b.intern_item(&ItemId::new("1")).unwrap();
        assert!(b
            .add_derivation(item, item, EdgeOrigin::SampleTypeFallback)
            .is_err());
    }

    #[test]
    fn duplicate_edges_report_false() {
        let mut b = TraceBuilder::new();
        let x = b.intern_item(&ItemId::new("1")).unwrap();
        let y = b.intern_item(&ItemId::new("2")).unwrap();
        assert!(b.add_derivation(y, x, EdgeOrigin::DeclaredRouting).unwrap());
        assert!(!b.add_derivation(y, x, EdgeOrigin::PartRouting).unwrap());
        assert_eq!(b.derived_from(y), vec![x]);
    }

    #[test]
    fn second_attach_conflicts() {
        let mut b = TraceBuilder::new();
        let item = b.intern_item(&ItemId::new("1")).unwrap();
        let act = b.intern_activity(activity("10")).unwrap();
        let assoc = b
            .intern_association(AssociationNode::new(UploadId::new("u"), "SAMPLE_UPLOAD", "f.csv"))
            .unwrap();
        b.attach(assoc, AttachTarget::Item(item)).unwrap();
        let err = b.attach(assoc, AttachTarget::Activity(act)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Model(ModelError::AssociationTargetConflict { .. })
        ));
        assert_eq!(b.outgoing(assoc, EdgeKind::Attachment).count(), 1);
    }

    #[test]
    fn attach_checks_target_kind() {
        let mut b = TraceBuilder::new();
        let item = b.intern_item(&ItemId::new("1")).unwrap();
        let assoc = b
            .intern_association(AssociationNode::new(UploadId::new("u"), "k", "f"))
            .unwrap();
        let err = b.attach(assoc, AttachTarget::Activity(item)).unwrap_err();
        assert!(matches!(err, RegistryError::Model(ModelError::EndpointKind { .. })));
        assert!(b.registry().association(assoc).unwrap().target().is_none());
    }

    #[test]
    fn unresolved_annotations_survive_freeze() {
        let mut b = TraceBuilder::new();
        let act = b.intern_activity(activity("10")).unwrap();
        let out = b.intern_item(&ItemId::new("2")).unwrap();
        b.annotate_unresolved(UnresolvedDerivation {
            activity: act,
            output: out,
            role: "out".into(),
            reason: UnresolvedReason::NoRouting,
        });
        assert!(b.is_unresolved(out));
        let graph = b.freeze().unwrap();
        assert_eq!(graph.unresolved().len(), 1);
    }
}
