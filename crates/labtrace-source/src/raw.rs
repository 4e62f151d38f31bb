//! Raw platform records
//!
//! Serde mirrors of the JSON the lab platform returns. Only the fields the
//! trace engine reads are modelled; unknown fields are ignored.

use chrono::{DateTime, Utc};
use labtrace_model::{AgentId, ItemId, JobId, OperationId, PlanId, UploadId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key set that identifies an association value as an upload
pub const UPLOAD_KEYS: [&str; 8] = [
    "created_at",
    "id",
    "job_id",
    "updated_at",
    "upload_content_type",
    "upload_file_name",
    "upload_file_size",
    "upload_updated_at",
];

/// Job `pc` value of a completed job
pub const JOB_COMPLETED: i64 = -2;

/// Plan as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlan {
    /// Plan id
    pub id: PlanId,
    /// Plan name
    #[serde(default)]
    pub name: String,
    /// Platform status
    #[serde(default)]
    pub status: Option<String>,
    /// Data associations
    #[serde(default)]
    pub data_associations: Vec<RawAssociation>,
}

/// Operation type reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperationType {
    /// Operation type name
    pub name: String,
    /// Category
    #[serde(default)]
    pub category: Option<String>,
}

/// Operation as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOperation {
    /// Operation id
    pub id: OperationId,
    /// Owning plan
    pub plan_id: PlanId,
    /// Operation type
    pub operation_type: RawOperationType,
    /// Inputs, outputs and parameters
    #[serde(default)]
    pub field_values: Vec<RawFieldValue>,
    /// Jobs the operation was scheduled in
    #[serde(default)]
    pub job_associations: Vec<RawJobAssociation>,
    /// Data associations
    #[serde(default)]
    pub data_associations: Vec<RawAssociation>,
}

/// Direction of a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    /// Operation input
    Input,
    /// Operation output
    Output,
}

/// Field type of a field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFieldType {
    /// Field name
    #[serde(default)]
    pub name: String,
    /// Routing symbol shared by routed inputs and outputs
    #[serde(default)]
    pub routing: Option<String>,
}

/// One input, output or parameter of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFieldValue {
    /// Role name
    pub name: String,
    /// Direction
    pub role: FieldRole,
    /// Bound item, absent for parameters
    #[serde(default)]
    pub child_item_id: Option<ItemId>,
    /// Row when the binding is a part of a collection
    #[serde(default)]
    pub row: Option<u16>,
    /// Column when the binding is a part of a collection
    #[serde(default)]
    pub column: Option<u16>,
    /// Parameter value
    #[serde(default)]
    pub value: Option<Value>,
    /// Field type
    #[serde(default)]
    pub field_type: Option<RawFieldType>,
}

/// Job association of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJobAssociation {
    /// The job
    pub job: RawJob,
}

/// Job as returned by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJob {
    /// Job id
    pub id: JobId,
    /// Program counter; [`JOB_COMPLETED`] when done
    pub pc: i64,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// Start time
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// End time
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Account the job ran under
    #[serde(default)]
    pub user: Option<RawUser>,
}

/// Platform account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUser {
    /// Account id
    pub id: AgentId,
    /// Login name
    pub login: String,
}

/// Sample type reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSampleType {
    /// Sample type name
    pub name: String,
}

/// Sample reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// Sample id
    pub id: ItemId,
    /// Sample name
    #[serde(default)]
    pub name: Option<String>,
    /// Sample type
    #[serde(default)]
    pub sample_type: Option<RawSampleType>,
}

/// Object type reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObjectType {
    /// Object type id
    pub id: ItemId,
    /// Container name
    pub name: String,
}

/// Item or collection as returned by the platform
///
/// Items without a sample are collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Item id
    pub id: ItemId,
    /// Sample held
    #[serde(default)]
    pub sample: Option<RawSample>,
    /// Container type
    #[serde(default)]
    pub object_type: Option<RawObjectType>,
    /// Data associations
    #[serde(default)]
    pub data_associations: Vec<RawAssociation>,
    /// Parts, for collections
    #[serde(default)]
    pub part_associations: Vec<RawPartAssociation>,
    /// Sample id per well, for collections; non-positive means empty
    #[serde(default)]
    pub matrix: Vec<Vec<i64>>,
}

impl RawItem {
    /// Whether the platform treats this item as a collection
    #[inline]
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.sample.is_none()
    }
}

/// Part of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPartAssociation {
    /// Part item id
    pub part_id: ItemId,
    /// Collection id
    pub collection_id: ItemId,
    /// Zero-based row
    pub row: u16,
    /// Zero-based column
    pub column: u16,
    /// The part item
    #[serde(default)]
    pub part: Option<Box<RawItem>>,
}

/// Upload reference inside an association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUploadRef {
    /// Upload id
    pub id: UploadId,
}

/// Key/value data association
///
/// The value lives under `object[key]`. An association carries an upload
/// either through `upload` or through an upload-shaped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAssociation {
    /// Association key
    pub key: String,
    /// `{key: value}` object
    #[serde(default)]
    pub object: Option<Value>,
    /// Linked upload
    #[serde(default)]
    pub upload: Option<RawUploadRef>,
}

impl RawAssociation {
    /// The associated value
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.object.as_ref()?.get(&self.key)
    }

    /// Whether the value has exactly the upload key set
    #[must_use]
    pub fn is_upload(&self) -> bool {
        match self.value() {
            Some(Value::Object(map)) => {
                map.len() == UPLOAD_KEYS.len() && UPLOAD_KEYS.iter().all(|k| map.contains_key(*k))
            }
            _ => false,
        }
    }

    /// Upload id carried by the association, either linked or embedded
    #[must_use]
    pub fn upload_id(&self) -> Option<UploadId> {
        if let Some(upload) = &self.upload {
            return Some(upload.id.clone());
        }
        if self.is_upload() {
            return self
                .value()
                .and_then(|v| v.get("id"))
                .and_then(|id| serde_json::from_value(id.clone()).ok());
        }
        None
    }
}

/// Uploaded file as returned by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUpload {
    /// Upload id
    pub id: UploadId,
    /// File name
    pub upload_file_name: String,
    /// Size in bytes
    #[serde(default)]
    pub upload_file_size: Option<u64>,
    /// MIME type
    #[serde(default)]
    pub upload_content_type: Option<String>,
    /// Job that produced the upload
    #[serde(default)]
    pub job_id: Option<JobId>,
}
