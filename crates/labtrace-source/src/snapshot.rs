//! Materialized trace snapshot

use crate::error::SourceError;
use crate::records::{ItemRecord, OperationRecord, PlanRecord, UploadRecord};
use crate::session::RecordSource;
use indexmap::IndexMap;
use labtrace_model::{ItemId, OperationId, PlanId, UploadId};
use serde::{Deserialize, Serialize};

/// Every normalized record one pass needs
///
/// Insertion order is kept so that iteration and serialization are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    plans: IndexMap<PlanId, PlanRecord>,
    operations: IndexMap<OperationId, OperationRecord>,
    items: IndexMap<ItemId, ItemRecord>,
    uploads: IndexMap<UploadId, UploadRecord>,
}

impl TraceSnapshot {
    /// Empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a snapshot saved with [`TraceSnapshot::to_json`]
    ///
    /// # Errors
    /// [`SourceError::Json`] on malformed input
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as pretty JSON
    ///
    /// # Errors
    /// [`SourceError::Json`] if a value cannot be encoded
    pub fn to_json(&self) -> Result<String, SourceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Add or replace a plan
    pub fn insert_plan(&mut self, plan: PlanRecord) {
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Add or replace an operation
    pub fn insert_operation(&mut self, operation: OperationRecord) {
        self.operations.insert(operation.id.clone(), operation);
    }

    /// Add or replace an item
    pub fn insert_item(&mut self, item: ItemRecord) {
        self.items.insert(item.id.clone(), item);
    }

    /// Add or replace an upload
    pub fn insert_upload(&mut self, upload: UploadRecord) {
        self.uploads.insert(upload.id.clone(), upload);
    }

    /// Whether an item is present
    #[inline]
    #[must_use]
    pub fn has_item(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of uploads
    #[inline]
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }
}

impl RecordSource for TraceSnapshot {
    fn plan(&self, id: &PlanId) -> Option<&PlanRecord> {
        self.plans.get(id)
    }

    fn operations(&self, plan: &PlanId) -> Vec<&OperationRecord> {
        let Some(record) = self.plans.get(plan) else {
            return Vec::new();
        };
        record
            .operations
            .iter()
            .filter_map(|id| self.operations.get(id))
            .collect()
    }

    fn item(&self, id: &ItemId) -> Option<&ItemRecord> {
        self.items.get(id)
    }

    fn upload(&self, id: &UploadId) -> Option<&UploadRecord> {
        self.uploads.get(id)
    }
}
