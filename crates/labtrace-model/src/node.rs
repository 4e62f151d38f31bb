//! Provenance nodes
//!
//! Every node lives in the trace arena and is referenced by [`NodeId`].
//! Cross-references (a part's collection, a binding's item, an association's
//! target) are ids, never owned copies.

use crate::attributes::Attributes;
use crate::error::ModelError;
use crate::id::{AgentId, ItemId, JobId, NodeId, NodeKind, OperationId, PlanId, StableKey, UploadId};
use crate::well::Well;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

/// Sample-type tag used for routing and fallback matching
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleType(String);

impl SampleType {
    /// Create tag
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SampleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The biological sample an item holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Platform sample id
    pub id: String,
    /// Human-readable sample name, when fetched
    pub name: Option<String>,
}

/// Container type of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    /// Platform object type id
    pub id: String,
    /// Container name (e.g. `96 U-bottom Well Plate`)
    pub name: String,
}

/// Whether an item stands alone, owns parts, or is one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Membership {
    /// Whole item
    Whole,
    /// Collection owning parts
    Collection,
    /// Part of a collection at a well
    Part {
        /// Owning collection
        collection: NodeId,
        /// Locator within the collection
        well: Well,
    },
}

/// Stable key of a part: `collection/well`
#[inline]
#[must_use]
pub fn part_key(collection: &ItemId, well: Well) -> StableKey {
    StableKey::new(format!("{collection}/{well}"))
}

/// Item, collection or part entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemNode {
    key: StableKey,
    item_id: Option<ItemId>,
    membership: Membership,
    parts: BTreeMap<Well, NodeId>,
    /// Sample-type tag, if known
    pub sample_type: Option<SampleType>,
    /// Sample, if known
    pub sample: Option<Sample>,
    /// Container type, if known
    pub object_type: Option<ObjectType>,
    /// Descriptive attributes
    pub attributes: Attributes,
}

impl ItemNode {
    fn with_membership(key: StableKey, item_id: Option<ItemId>, membership: Membership) -> Self {
        Self {
            key,
            item_id,
            membership,
            parts: BTreeMap::new(),
            sample_type: None,
            sample: None,
            object_type: None,
            attributes: Attributes::new(),
        }
    }

    /// Whole item keyed by its id
    #[must_use]
    pub fn whole(item_id: ItemId) -> Self {
        Self::with_membership(StableKey::from(&item_id), Some(item_id), Membership::Whole)
    }

    /// Collection keyed by its id
    #[must_use]
    pub fn collection(item_id: ItemId) -> Self {
        Self::with_membership(
            StableKey::from(&item_id),
            Some(item_id),
            Membership::Collection,
        )
    }

    /// Part keyed by `(collection id, well)`
    ///
    /// `part_id` is the platform's own id for the part when it has one;
    /// parts synthesized from routing data have none.
    #[must_use]
    pub fn part(
        collection_id: &ItemId,
        collection: NodeId,
        well: Well,
        part_id: Option<ItemId>,
    ) -> Self {
        Self::with_membership(
            part_key(collection_id, well),
            part_id,
            Membership::Part { collection, well },
        )
    }

    /// Builder: set sample type
    #[must_use]
    pub fn with_sample_type(mut self, sample_type: Option<SampleType>) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Deduplication key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &StableKey {
        &self.key
    }

    /// Platform id (absent for synthesized parts)
    #[inline]
    #[must_use]
    pub fn item_id(&self) -> Option<&ItemId> {
        self.item_id.as_ref()
    }

    /// Membership flag
    #[inline]
    #[must_use]
    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// Node kind derived from membership
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.membership {
            Membership::Whole => NodeKind::Item,
            Membership::Collection => NodeKind::Collection,
            Membership::Part { .. } => NodeKind::Part,
        }
    }

    /// Owning collection if this is a part
    #[inline]
    #[must_use]
    pub fn collection_node(&self) -> Option<NodeId> {
        match self.membership {
            Membership::Part { collection, .. } => Some(collection),
            _ => None,
        }
    }

    /// Well if this is a part
    #[inline]
    #[must_use]
    pub fn well(&self) -> Option<Well> {
        match self.membership {
            Membership::Part { well, .. } => Some(well),
            _ => None,
        }
    }

    /// Whether this is a collection
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.membership, Membership::Collection)
    }

    /// Whether this is a part
    #[inline]
    #[must_use]
    pub fn is_part(&self) -> bool {
        matches!(self.membership, Membership::Part { .. })
    }

    /// Register a part at a well of this collection
    ///
    /// Registering the same part twice is a no-op.
    ///
    /// # Errors
    /// - [`ModelError::NotACollection`] if this item has no parts
    /// - [`ModelError::ParentConflict`] if another part already holds the well
    pub fn add_part(&mut self, well: Well, part: NodeId) -> Result<(), ModelError> {
        if !self.is_collection() {
            return Err(ModelError::NotACollection {
                key: self.key.clone(),
            });
        }
        match self.parts.get(&well) {
            Some(existing) if *existing != part => Err(ModelError::ParentConflict {
                key: part_key_display(&self.key, well),
                existing: *existing,
                attempted: part,
            }),
            Some(_) => Ok(()),
            None => {
                self.parts.insert(well, part);
                Ok(())
            }
        }
    }

    /// Part at a well
    #[inline]
    #[must_use]
    pub fn part_at(&self, well: Well) -> Option<NodeId> {
        self.parts.get(&well).copied()
    }

    /// Parts ordered by well
    pub fn parts(&self) -> impl Iterator<Item = (Well, NodeId)> + '_ {
        self.parts.iter().map(|(w, n)| (*w, *n))
    }

    /// Whether any part is registered
    #[inline]
    #[must_use]
    pub fn has_parts(&self) -> bool {
        !self.parts.is_empty()
    }
}

fn part_key_display(collection: &StableKey, well: Well) -> StableKey {
    StableKey::new(format!("{collection}/{well}"))
}

/// Operation-type declared routing: input role → output roles
///
/// Routing is one-to-many: an input role may feed several output roles, and
/// several input roles may feed the same output role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: BTreeMap<String, BTreeSet<String>>,
}

impl RoutingTable {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from shared routing symbols
    ///
    /// The platform marks routing by giving an input field and an output
    /// field the same symbol; every input/output pair sharing a symbol is a
    /// route.
    #[must_use]
    pub fn from_shared_symbols<'a>(
        inputs: impl IntoIterator<Item = (&'a str, &'a str)>,
        outputs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut by_symbol: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (role, symbol) in inputs {
            by_symbol.entry(symbol).or_default().push(role);
        }

        let mut table = Self::new();
        for (output_role, symbol) in outputs {
            if let Some(input_roles) = by_symbol.get(symbol) {
                for input_role in input_roles {
                    table.declare(*input_role, output_role);
                }
            }
        }
        table
    }

    /// Declare a route
    pub fn declare(&mut self, input_role: impl Into<String>, output_role: impl Into<String>) {
        self.routes
            .entry(input_role.into())
            .or_default()
            .insert(output_role.into());
    }

    /// Builder: declare a route
    #[must_use]
    pub fn with_route(mut self, input_role: &str, output_role: &str) -> Self {
        self.declare(input_role, output_role);
        self
    }

    /// Input roles routed to an output role
    #[must_use]
    pub fn inputs_for(&self, output_role: &str) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|(_, outputs)| outputs.contains(output_role))
            .map(|(input, _)| input.as_str())
            .collect()
    }

    /// Output roles an input role is routed to
    #[must_use]
    pub fn outputs_for(&self, input_role: &str) -> Vec<&str> {
        self.routes
            .get(input_role)
            .map(|outputs| outputs.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether no route is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate `(input role, output role)` pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().flat_map(|(input, outputs)| {
            outputs
                .iter()
                .map(move |output| (input.as_str(), output.as_str()))
        })
    }
}

/// Operation type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationType {
    /// Operation type name (e.g. `Transform Cells`)
    pub name: String,
    /// Category (e.g. `Cloning`)
    pub category: Option<String>,
    /// Declared routing
    pub routing: RoutingTable,
}

impl OperationType {
    /// Operation type with no routing
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            routing: RoutingTable::new(),
        }
    }

    /// Builder: set routing
    #[must_use]
    pub fn with_routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }
}

/// An item bound to an input or output role of an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Role name on the operation type
    pub role: String,
    /// Bound item
    pub item: NodeId,
    /// Injected by a fix-up rather than read from the source
    pub synthetic: bool,
}

impl Binding {
    /// Binding read from the source
    #[must_use]
    pub fn new(role: impl Into<String>, item: NodeId) -> Self {
        Self {
            role: role.into(),
            item,
            synthetic: false,
        }
    }

    /// Binding injected by a fix-up
    #[must_use]
    pub fn synthetic(role: impl Into<String>, item: NodeId) -> Self {
        Self {
            role: role.into(),
            item,
            synthetic: true,
        }
    }
}

/// Non-item argument of an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Role name
    pub role: String,
    /// Raw value
    pub value: Value,
}

/// Executed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityNode {
    key: StableKey,
    operation_id: OperationId,
    /// Operation type definition
    pub operation_type: OperationType,
    /// Owning plan
    pub plan: PlanId,
    /// Position among the plan's activities
    pub ordinal: usize,
    /// Job the operation ran in
    pub job: Option<JobId>,
    /// Job start
    pub started_at: Option<DateTime<Utc>>,
    /// Job end
    pub ended_at: Option<DateTime<Utc>>,
    /// Person or account the job ran under
    pub agent: Option<NodeId>,
    inputs: Vec<Binding>,
    outputs: Vec<Binding>,
    /// Non-item arguments
    pub parameters: Vec<Parameter>,
    /// Descriptive attributes
    pub attributes: Attributes,
}

impl ActivityNode {
    /// New activity with no bindings
    #[must_use]
    pub fn new(operation_id: OperationId, operation_type: OperationType, plan: PlanId) -> Self {
        Self {
            key: StableKey::from(&operation_id),
            operation_id,
            operation_type,
            plan,
            ordinal: 0,
            job: None,
            started_at: None,
            ended_at: None,
            agent: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Deduplication key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &StableKey {
        &self.key
    }

    /// Platform operation id
    #[inline]
    #[must_use]
    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// Bind an input; duplicate `(role, item)` bindings are dropped
    pub fn add_input(&mut self, binding: Binding) {
        if !contains_binding(&self.inputs, &binding) {
            self.inputs.push(binding);
        }
    }

    /// Bind an output; duplicate `(role, item)` bindings are dropped
    pub fn add_output(&mut self, binding: Binding) {
        if !contains_binding(&self.outputs, &binding) {
            self.outputs.push(binding);
        }
    }

    /// Input bindings in role order
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[Binding] {
        &self.inputs
    }

    /// Output bindings in role order
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &[Binding] {
        &self.outputs
    }

    /// Whether the item is bound as an input
    #[must_use]
    pub fn has_input(&self, item: NodeId) -> bool {
        self.inputs.iter().any(|b| b.item == item)
    }

    /// Whether the item is bound as an output
    #[must_use]
    pub fn has_output(&self, item: NodeId) -> bool {
        self.outputs.iter().any(|b| b.item == item)
    }

    /// Inputs bound to a role
    pub fn inputs_with_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a Binding> {
        self.inputs.iter().filter(move |b| b.role == role)
    }
}

fn contains_binding(bindings: &[Binding], binding: &Binding) -> bool {
    bindings
        .iter()
        .any(|b| b.role == binding.role && b.item == binding.item)
}

/// What a data association is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachTarget {
    /// Item, collection or part
    Item(NodeId),
    /// Activity
    Activity(NodeId),
}

impl AttachTarget {
    /// Target node
    #[inline]
    #[must_use]
    pub const fn node(self) -> NodeId {
        match self {
            Self::Item(n) | Self::Activity(n) => n,
        }
    }
}

/// Uploaded file or measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationNode {
    key: StableKey,
    upload_id: UploadId,
    /// Association key on the platform (e.g. `SAMPLE_UPLOAD`)
    pub association_key: String,
    /// File name
    pub file_name: String,
    /// File size in bytes
    pub size: Option<u64>,
    /// MIME type
    pub content_type: Option<String>,
    /// Job the upload was produced in
    pub job: Option<JobId>,
    target: Option<AttachTarget>,
}

impl AssociationNode {
    /// Unattached association
    #[must_use]
    pub fn new(upload_id: UploadId, association_key: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            key: StableKey::from(&upload_id),
            upload_id,
            association_key: association_key.into(),
            file_name: file_name.into(),
            size: None,
            content_type: None,
            job: None,
            target: None,
        }
    }

    /// Deduplication key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &StableKey {
        &self.key
    }

    /// Platform upload id
    #[inline]
    #[must_use]
    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    /// Current target
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<AttachTarget> {
        self.target
    }

    /// Set the target
    ///
    /// # Errors
    /// [`ModelError::AssociationTargetConflict`] if a target is already set,
    /// even when it is the same one: an association is attached exactly once.
    pub fn attach(&mut self, target: AttachTarget) -> Result<(), ModelError> {
        if let Some(existing) = self.target {
            return Err(ModelError::AssociationTargetConflict {
                upload: self.upload_id.clone(),
                existing,
                attempted: target,
            });
        }
        self.target = Some(target);
        Ok(())
    }
}

/// Person or account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNode {
    key: StableKey,
    agent_id: AgentId,
    /// Login or display name
    pub name: String,
}

impl AgentNode {
    /// New agent
    #[must_use]
    pub fn new(agent_id: AgentId, name: impl Into<String>) -> Self {
        Self {
            key: StableKey::from(&agent_id),
            agent_id,
            name: name.into(),
        }
    }

    /// Deduplication key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &StableKey {
        &self.key
    }

    /// Platform agent id
    #[inline]
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }
}

/// Any provenance node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Item, collection or part
    Item(ItemNode),
    /// Executed operation
    Activity(ActivityNode),
    /// Upload
    Association(AssociationNode),
    /// Person or account
    Agent(AgentNode),
}

impl Node {
    /// Declared kind
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Item(item) => item.kind(),
            Self::Activity(_) => NodeKind::Activity,
            Self::Association(_) => NodeKind::DataAssociation,
            Self::Agent(_) => NodeKind::Agent,
        }
    }

    /// Deduplication key
    #[must_use]
    pub fn key(&self) -> &StableKey {
        match self {
            Self::Item(n) => n.key(),
            Self::Activity(n) => n.key(),
            Self::Association(n) => n.key(),
            Self::Agent(n) => n.key(),
        }
    }

    /// Item view
    #[inline]
    #[must_use]
    pub fn as_item(&self) -> Option<&ItemNode> {
        match self {
            Self::Item(n) => Some(n),
            _ => None,
        }
    }

    /// Mutable item view
    #[inline]
    pub fn as_item_mut(&mut self) -> Option<&mut ItemNode> {
        match self {
            Self::Item(n) => Some(n),
            _ => None,
        }
    }

    /// Activity view
    #[inline]
    #[must_use]
    pub fn as_activity(&self) -> Option<&ActivityNode> {
        match self {
            Self::Activity(n) => Some(n),
            _ => None,
        }
    }

    /// Mutable activity view
    #[inline]
    pub fn as_activity_mut(&mut self) -> Option<&mut ActivityNode> {
        match self {
            Self::Activity(n) => Some(n),
            _ => None,
        }
    }

    /// Association view
    #[inline]
    #[must_use]
    pub fn as_association(&self) -> Option<&AssociationNode> {
        match self {
            Self::Association(n) => Some(n),
            _ => None,
        }
    }

    /// Mutable association view
    #[inline]
    pub fn as_association_mut(&mut self) -> Option<&mut AssociationNode> {
        match self {
            Self::Association(n) => Some(n),
            _ => None,
        }
    }

    /// Agent view
    #[inline]
    #[must_use]
    pub fn as_agent(&self) -> Option<&AgentNode> {
        match self {
            Self::Agent(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn well(s: &str) -> Well {
        s.parse().unwrap()
    }

    #[test]
    fn part_key_is_collection_and_well() {
        let part = ItemNode::part(&ItemId::new("500"), NodeId::from_index(0), well("B2"), None);
        assert_eq!(part.key().as_str(), "500/B2");
        assert_eq!(part.kind(), NodeKind::Part);
        assert_eq!(part.collection_node(), Some(NodeId::from_index(0)));
        assert!(part.item_id().is_none());
    }

    #[test]
    fn whole_items_cannot_own_parts() {
        let mut item = ItemNode::whole(ItemId::new("1"));
        let err = item.add_part(well("A1"), NodeId::from_index(3)).unwrap_err();
        assert!(matches!(err, ModelError::NotACollection { .. }));
    }

    #[test]
    fn well_holds_one_part() {
        let mut coll = ItemNode::collection(ItemId::new("9"));
        coll.add_part(well("A1"), NodeId::from_index(1)).unwrap();
        coll.add_part(well("A1"), NodeId::from_index(1)).unwrap();
        let err = coll.add_part(well("A1"), NodeId::from_index(2)).unwrap_err();
        assert!(matches!(err, ModelError::ParentConflict { .. }));
        assert_eq!(coll.part_at(well("A1")), Some(NodeId::from_index(1)));
    }

    #[test]
    fn routing_from_shared_symbols_is_one_to_many() {
        let table = RoutingTable::from_shared_symbols(
            [("Plasmid", "P"), ("Buffer", "B")],
            [("Copy 1", "P"), ("Copy 2", "P"), ("Waste", "W")],
        );
        assert_eq!(table.outputs_for("Plasmid"), vec!["Copy 1", "Copy 2"]);
        assert_eq!(table.inputs_for("Copy 2"), vec!["Plasmid"]);
        assert!(table.inputs_for("Waste").is_empty());
        assert!(table.outputs_for("Buffer").is_empty());
        assert_eq!(table.pairs().count(), 2);
    }

    #[test]
    fn routing_many_inputs_to_one_output() {
        let table = RoutingTable::new()
            .with_route("one", "mix")
            .with_route("two", "mix");
        assert_eq!(table.inputs_for("mix"), vec!["one", "two"]);
    }

    #[test]
    fn duplicate_bindings_are_dropped() {
        let mut act = ActivityNode::new(
            OperationId::new("1"),
            OperationType::named("Mix"),
            PlanId::new("p"),
        );
        act.add_input(Binding::new("one", NodeId::from_index(1)));
        act.add_input(Binding::new("one", NodeId::from_index(1)));
        act.add_input(Binding::new("two", NodeId::from_index(1)));
        assert_eq!(act.inputs().len(), 2);
        assert!(act.has_input(NodeId::from_index(1)));
        assert_eq!(act.inputs_with_role("two").count(), 1);
    }

    #[test]
    fn association_attaches_once() {
        let mut assoc = AssociationNode::new(UploadId::new("u1"), "SAMPLE_UPLOAD", "a.fcs");
        assoc
            .attach(AttachTarget::Item(NodeId::from_index(0)))
            .unwrap();
        let err = assoc
            .attach(AttachTarget::Activity(NodeId::from_index(1)))
            .unwrap_err();
        assert!(matches!(err, ModelError::AssociationTargetConflict { .. }));
        assert_eq!(assoc.target(), Some(AttachTarget::Item(NodeId::from_index(0))));
    }
}
