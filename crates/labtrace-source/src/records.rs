//! Normalized records
//!
//! Plain data the assembler consumes. Produced from raw platform records by
//! [`crate::adapter`]; everything here is already decided (routing tables,
//! the job an operation ran in, which associations are uploads).

use chrono::{DateTime, Utc};
use labtrace_model::{
    AgentId, Attributes, ItemId, JobId, ObjectType, OperationId, OperationType, Parameter, PlanId,
    Sample, SampleType, UploadId, Well,
};
use serde::{Deserialize, Serialize};

/// Upload linked from a plan, operation, item or part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLink {
    /// Association key the upload was found under
    pub key: String,
    /// Upload id
    pub upload: UploadId,
}

/// Normalized plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Plan id
    pub id: PlanId,
    /// Plan name
    pub name: String,
    /// Platform status
    pub status: Option<String>,
    /// Operations in the plan
    pub operations: Vec<OperationId>,
    /// Attributes from non-upload associations
    pub attributes: Attributes,
    /// Linked uploads
    pub uploads: Vec<UploadLink>,
}

/// An item bound to an operation role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBinding {
    /// Role name
    pub role: String,
    /// Bound item (the collection, for part bindings)
    pub item: ItemId,
    /// Well when the binding names a part
    pub well: Option<Well>,
}

/// Agent a job ran under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Account id
    pub id: AgentId,
    /// Login name
    pub name: String,
}

/// The job an operation completed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id
    pub id: JobId,
    /// Start time
    pub started_at: Option<DateTime<Utc>>,
    /// End time
    pub ended_at: Option<DateTime<Utc>>,
    /// Account
    pub agent: Option<AgentRecord>,
}

/// Normalized operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation id
    pub id: OperationId,
    /// Owning plan
    pub plan: PlanId,
    /// Type with declared routing
    pub operation_type: OperationType,
    /// Item inputs in role order
    pub inputs: Vec<ItemBinding>,
    /// Item outputs in role order
    pub outputs: Vec<ItemBinding>,
    /// Non-item arguments
    pub parameters: Vec<Parameter>,
    /// Latest completed job
    pub job: Option<JobRecord>,
    /// Attributes from non-upload associations
    pub attributes: Attributes,
    /// Linked uploads
    pub uploads: Vec<UploadLink>,
}

/// Where a part's content came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRef {
    /// A whole item or collection
    Item(ItemId),
    /// A well of a collection
    Part {
        /// Source collection
        collection: ItemId,
        /// Source well
        well: Well,
    },
}

impl SourceRef {
    /// Id of the item or collection referenced
    #[inline]
    #[must_use]
    pub fn item_id(&self) -> &ItemId {
        match self {
            Self::Item(id) | Self::Part { collection: id, .. } => id,
        }
    }
}

/// Normalized part of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    /// Position in the collection
    pub well: Well,
    /// Platform id, when the part is a first-class item
    pub part_id: Option<ItemId>,
    /// Sample held
    pub sample: Option<Sample>,
    /// Sample type
    pub sample_type: Option<SampleType>,
    /// Container type
    pub object_type: Option<ObjectType>,
    /// Attributes from associations and routing entries
    pub attributes: Attributes,
    /// Linked uploads
    pub uploads: Vec<UploadLink>,
    /// Routing sources
    pub sources: Vec<SourceRef>,
}

impl PartRecord {
    /// Empty part record at a well
    #[must_use]
    pub fn at(well: Well) -> Self {
        Self {
            well,
            part_id: None,
            sample: None,
            sample_type: None,
            object_type: None,
            attributes: Attributes::new(),
            uploads: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// Normalized item or collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Item id
    pub id: ItemId,
    /// Whether the item is a collection
    pub is_collection: bool,
    /// Sample held
    pub sample: Option<Sample>,
    /// Sample type
    pub sample_type: Option<SampleType>,
    /// Container type
    pub object_type: Option<ObjectType>,
    /// Attributes from non-upload associations
    pub attributes: Attributes,
    /// Linked uploads
    pub uploads: Vec<UploadLink>,
    /// Parts ordered by well, for collections
    pub parts: Vec<PartRecord>,
}

impl ItemRecord {
    /// Part record at a well
    #[must_use]
    pub fn part(&self, well: Well) -> Option<&PartRecord> {
        self.parts.iter().find(|p| p.well == well)
    }
}

/// Normalized upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Upload id
    pub id: UploadId,
    /// File name
    pub file_name: String,
    /// Size in bytes
    pub size: Option<u64>,
    /// MIME type
    pub content_type: Option<String>,
    /// Job that produced the upload
    pub job: Option<JobId>,
}
