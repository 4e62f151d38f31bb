//! Identity registry
//!
//! A keyed arena: nodes live in a `Vec` indexed by [`NodeId`], and a map from
//! `(namespace, stable key)` guarantees at most one node per key for the
//! lifetime of a pass.

use crate::error::RegistryError;
use labtrace_model::{
    ActivityNode, AssociationNode, ItemNode, Namespace, Node, NodeId, NodeKind, StableKey,
};
use std::collections::{HashMap, VecDeque};

/// Interns provenance nodes by stable key
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    nodes: Vec<Node>,
    index: HashMap<(Namespace, StableKey), NodeId>,
    interned_items: VecDeque<NodeId>,
}

impl IdentityRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the node for `key`, creating it with `factory` on first sight
    ///
    /// The factory is not invoked when the key is already interned.
    ///
    /// # Errors
    /// - [`RegistryError::KeyConflict`] if the key is interned under another
    ///   kind or the factory produces a node of another kind
    /// - [`RegistryError::FactoryKey`] if the factory produces a node under a
    ///   different key
    pub fn intern<F>(&mut self, kind: NodeKind, key: StableKey, factory: F) -> Result<NodeId, RegistryError>
    where
        F: FnOnce() -> Node,
    {
        let namespace = kind.namespace();
        if let Some(&id) = self.index.get(&(namespace, key.clone())) {
            let existing = self.nodes[id.index()].kind();
            if existing != kind {
                return Err(RegistryError::KeyConflict {
                    namespace,
                    key,
                    existing,
                    requested: kind,
                });
            }
            return Ok(id);
        }

        let node = factory();
        if node.kind() != kind {
            return Err(RegistryError::KeyConflict {
                namespace,
                key,
                existing: node.kind(),
                requested: kind,
            });
        }
        if node.key() != &key {
            return Err(RegistryError::FactoryKey {
                declared: key,
                produced: node.key().clone(),
            });
        }

        let id = NodeId::from_index(self.nodes.len());
        tracing::debug!(%id, %kind, %key, "interned node");
        self.nodes.push(node);
        self.index.insert((namespace, key), id);
        if kind.is_entity() {
            self.interned_items.push_back(id);
        }
        Ok(id)
    }

    /// Look up an interned node
    #[inline]
    #[must_use]
    pub fn lookup(&self, namespace: Namespace, key: &StableKey) -> Option<NodeId> {
        self.index.get(&(namespace, key.clone())).copied()
    }

    /// Node by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Mutable node by id
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Item view
    #[inline]
    #[must_use]
    pub fn item(&self, id: NodeId) -> Option<&ItemNode> {
        self.get(id).and_then(Node::as_item)
    }

    /// Mutable item view
    #[inline]
    pub fn item_mut(&mut self, id: NodeId) -> Option<&mut ItemNode> {
        self.get_mut(id).and_then(Node::as_item_mut)
    }

    /// Activity view
    #[inline]
    #[must_use]
    pub fn activity(&self, id: NodeId) -> Option<&ActivityNode> {
        self.get(id).and_then(Node::as_activity)
    }

    /// Mutable activity view
    #[inline]
    pub fn activity_mut(&mut self, id: NodeId) -> Option<&mut ActivityNode> {
        self.get_mut(id).and_then(Node::as_activity_mut)
    }

    /// Association view
    #[inline]
    #[must_use]
    pub fn association(&self, id: NodeId) -> Option<&AssociationNode> {
        self.get(id).and_then(Node::as_association)
    }

    /// Mutable association view
    #[inline]
    pub fn association_mut(&mut self, id: NodeId) -> Option<&mut AssociationNode> {
        self.get_mut(id).and_then(Node::as_association_mut)
    }

    /// Whether a node id is in the arena
    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Number of interned nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is interned
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in construction order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_index(i), n))
    }

    /// Next item interned since the last call
    #[inline]
    pub fn pop_interned_item(&mut self) -> Option<NodeId> {
        self.interned_items.pop_front()
    }

    /// Give up the arena
    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}
