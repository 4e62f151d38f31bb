//! In-memory session
//!
//! Serves raw records from memory. Used for offline conversion of a saved
//! platform dump and in tests.

use crate::error::SourceError;
use crate::raw::{RawItem, RawOperation, RawPlan, RawUpload};
use crate::session::RemoteSession;
use async_trait::async_trait;
use labtrace_model::{ItemId, PlanId, UploadId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A platform dump: every raw record, flat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDump {
    /// Plans
    #[serde(default)]
    pub plans: Vec<RawPlan>,
    /// Operations of all plans
    #[serde(default)]
    pub operations: Vec<RawOperation>,
    /// Items and collections
    #[serde(default)]
    pub items: Vec<RawItem>,
    /// Uploads
    #[serde(default)]
    pub uploads: Vec<RawUpload>,
}

/// [`RemoteSession`] over records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    plans: HashMap<PlanId, RawPlan>,
    operations: HashMap<PlanId, Vec<RawOperation>>,
    items: HashMap<ItemId, RawItem>,
    uploads: HashMap<UploadId, RawUpload>,
}

impl InMemorySession {
    /// Empty session
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session over a dump
    #[must_use]
    pub fn from_dump(dump: RawDump) -> Self {
        let mut session = Self::new();
        for plan in dump.plans {
            session.add_plan(plan);
        }
        for operation in dump.operations {
            session.add_operation(operation);
        }
        for item in dump.items {
            session.add_item(item);
        }
        for upload in dump.uploads {
            session.add_upload(upload);
        }
        session
    }

    /// Session over a JSON-encoded [`RawDump`]
    ///
    /// # Errors
    /// [`SourceError::Json`] if the document does not decode
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let dump: RawDump = serde_json::from_str(json)?;
        Ok(Self::from_dump(dump))
    }

    /// Add a plan
    pub fn add_plan(&mut self, plan: RawPlan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    /// Add an operation to its plan
    pub fn add_operation(&mut self, operation: RawOperation) {
        self.operations
            .entry(operation.plan_id.clone())
            .or_default()
            .push(operation);
    }

    /// Add an item
    ///
    /// Parts embedded in a collection's part associations are also served
    /// by id.
    pub fn add_item(&mut self, item: RawItem) {
        for association in &item.part_associations {
            if let Some(part) = &association.part {
                self.items
                    .entry(part.id.clone())
                    .or_insert_with(|| part.as_ref().clone());
            }
        }
        self.items.insert(item.id.clone(), item);
    }

    /// Add an upload
    pub fn add_upload(&mut self, upload: RawUpload) {
        self.uploads.insert(upload.id.clone(), upload);
    }
}

#[async_trait]
impl RemoteSession for InMemorySession {
    async fn plan(&self, id: &PlanId) -> Result<Option<RawPlan>, SourceError> {
        Ok(self.plans.get(id).cloned())
    }

    async fn operations(&self, plan: &PlanId) -> Result<Vec<RawOperation>, SourceError> {
        Ok(self.operations.get(plan).cloned().unwrap_or_default())
    }

    async fn item(&self, id: &ItemId) -> Result<Option<RawItem>, SourceError> {
        Ok(self.items.get(id).cloned())
    }

    async fn upload(&self, id: &UploadId) -> Result<Option<RawUpload>, SourceError> {
        Ok(self.uploads.get(id).cloned())
    }
}
