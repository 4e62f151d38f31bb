//! Registry-backed context handed to fix-up units
//!
//! Units never hold nodes of their own: everything they create or inspect
//! goes through the pass's [`TraceBuilder`], so identities stay unique.

use crate::error::FixupError;
use labtrace_model::{ActivityNode, AssociationNode, ItemId, ItemNode, NodeId, Well};
use labtrace_registry::TraceBuilder;
use labtrace_source::{ItemRecord, PartRecord, RecordSource};

/// Access to the pass in progress and the records it reads
pub struct FixupContext<'a> {
    builder: &'a mut TraceBuilder,
    source: &'a dyn RecordSource,
}

impl std::fmt::Debug for FixupContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixupContext")
            .field("nodes", &self.builder.registry().len())
            .finish_non_exhaustive()
    }
}

impl<'a> FixupContext<'a> {
    /// Context over a builder and its source
    #[inline]
    #[must_use]
    pub fn new(builder: &'a mut TraceBuilder, source: &'a dyn RecordSource) -> Self {
        Self { builder, source }
    }

    /// The pass's builder
    #[inline]
    #[must_use]
    pub fn builder(&self) -> &TraceBuilder {
        &*self.builder
    }

    /// The pass's builder, mutably
    #[inline]
    pub fn builder_mut(&mut self) -> &mut TraceBuilder {
        &mut *self.builder
    }

    /// Normalized records the pass reads
    #[inline]
    #[must_use]
    pub fn source(&self) -> &'a dyn RecordSource {
        self.source
    }

    /// Item, collection or part node
    #[inline]
    #[must_use]
    pub fn item(&self, id: NodeId) -> Option<&ItemNode> {
        self.builder.registry().item(id)
    }

    /// Mutable item, collection or part node
    #[inline]
    pub fn item_mut(&mut self, id: NodeId) -> Option<&mut ItemNode> {
        self.builder.registry_mut().item_mut(id)
    }

    /// Activity node
    #[inline]
    #[must_use]
    pub fn activity(&self, id: NodeId) -> Option<&ActivityNode> {
        self.builder.registry().activity(id)
    }

    /// Mutable activity node
    #[inline]
    pub fn activity_mut(&mut self, id: NodeId) -> Option<&mut ActivityNode> {
        self.builder.registry_mut().activity_mut(id)
    }

    /// Data association node
    #[inline]
    #[must_use]
    pub fn association(&self, id: NodeId) -> Option<&AssociationNode> {
        self.builder.registry().association(id)
    }

    /// Interned item or collection by platform id
    #[inline]
    #[must_use]
    pub fn find_item(&self, item_id: &ItemId) -> Option<NodeId> {
        self.builder.find_item(item_id)
    }

    /// Intern an item or collection from its source record
    ///
    /// A collection's parts are interned with it. Descriptive fields are
    /// applied before the node is handed to `on_item_interned`, so an item
    /// already interned is returned as is.
    ///
    /// # Errors
    /// - [`FixupError::MissingRecord`] if the source has no such item
    /// - [`FixupError::Registry`] on a key conflict or membership violation
    pub fn intern_item(&mut self, item_id: &ItemId) -> Result<NodeId, FixupError> {
        if let Some(node) = self.builder.find_item(item_id) {
            return Ok(node);
        }
        let source = self.source;
        let record = source
            .item(item_id)
            .ok_or_else(|| FixupError::missing("item", item_id))?;
        self.intern_record(record)
    }

    /// Intern an item from a record already in hand
    ///
    /// # Errors
    /// As [`FixupContext::intern_item`]
    pub fn intern_record(&mut self, record: &ItemRecord) -> Result<NodeId, FixupError> {
        if let Some(node) = self.builder.find_item(&record.id) {
            return Ok(node);
        }
        let node = if record.is_collection {
            self.builder.intern_collection(&record.id)?
        } else {
            self.builder.intern_item(&record.id)?
        };
        if let Some(item) = self.item_mut(node) {
            item.sample_type.clone_from(&record.sample_type);
            item.sample.clone_from(&record.sample);
            item.object_type.clone_from(&record.object_type);
            item.attributes.extend(&record.attributes);
        }
        tracing::debug!(item = %record.id, node = %node, parts = record.parts.len(), "item interned");

        if record.is_collection {
            for part in &record.parts {
                self.intern_part_record(node, part)?;
            }
        }
        Ok(node)
    }

    fn intern_part_record(&mut self, collection: NodeId, record: &PartRecord) -> Result<NodeId, FixupError> {
        let part = self
            .builder
            .intern_part(collection, record.well, record.part_id.clone())?;
        if let Some(item) = self.item_mut(part) {
            if record.sample_type.is_some() {
                item.sample_type.clone_from(&record.sample_type);
            }
            if record.sample.is_some() {
                item.sample.clone_from(&record.sample);
            }
            if record.object_type.is_some() {
                item.object_type.clone_from(&record.object_type);
            }
            item.attributes.extend(&record.attributes);
        }
        Ok(part)
    }

    /// The part of a collection at a well, interning it if needed
    ///
    /// # Errors
    /// [`FixupError::Registry`] if `collection` is not a collection
    pub fn intern_part(&mut self, collection: NodeId, well: Well) -> Result<NodeId, FixupError> {
        if let Some(part) = self.builder.find_part(collection, well) {
            return Ok(part);
        }
        Ok(self.builder.intern_part(collection, well, None)?)
    }
}
