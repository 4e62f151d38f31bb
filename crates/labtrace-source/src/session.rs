//! Session interfaces
//!
//! [`RemoteSession`] is what a platform client implements; it is async and
//! returns raw records. [`RecordSource`] is what the assembler reads; it is
//! synchronous and serves normalized records from a materialized snapshot.

use crate::error::SourceError;
use crate::raw::{RawItem, RawOperation, RawPlan, RawUpload};
use crate::records::{ItemRecord, OperationRecord, PlanRecord, UploadRecord};
use async_trait::async_trait;
use labtrace_model::{ItemId, PlanId, UploadId};

/// Access to the remote lab platform
///
/// Lookups return `Ok(None)` for records that do not exist and `Err` for
/// transport or decoding failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Plan by id
    async fn plan(&self, id: &PlanId) -> Result<Option<RawPlan>, SourceError>;

    /// Operations of a plan
    async fn operations(&self, plan: &PlanId) -> Result<Vec<RawOperation>, SourceError>;

    /// Item or collection by id; collections include part associations
    async fn item(&self, id: &ItemId) -> Result<Option<RawItem>, SourceError>;

    /// Upload by id
    async fn upload(&self, id: &UploadId) -> Result<Option<RawUpload>, SourceError>;
}

/// Normalized records for one assembly pass
pub trait RecordSource {
    /// Plan by id
    fn plan(&self, id: &PlanId) -> Option<&PlanRecord>;

    /// Operations of a plan in source order
    fn operations(&self, plan: &PlanId) -> Vec<&OperationRecord>;

    /// Item or collection by id
    fn item(&self, id: &ItemId) -> Option<&ItemRecord>;

    /// Upload by id
    fn upload(&self, id: &UploadId) -> Option<&UploadRecord>;
}
