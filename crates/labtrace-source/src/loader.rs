//! Snapshot loading
//!
//! Fetches everything a set of plans references from a [`RemoteSession`]
//! and normalizes it into a [`TraceSnapshot`]. Requests within a stage are
//! issued concurrently; the snapshot is complete before it is returned.

use crate::adapter::{normalize_item, normalize_operation, normalize_plan};
use crate::error::SourceError;
use crate::raw::{RawOperation, RawPlan, RawUpload};
use crate::records::{ItemRecord, UploadLink, UploadRecord};
use crate::session::{RecordSource, RemoteSession};
use crate::snapshot::TraceSnapshot;
use futures::future::try_join_all;
use labtrace_model::{ItemId, PlanId, UploadId};
use std::collections::HashSet;

/// Loads a [`TraceSnapshot`] from a remote session
#[derive(Debug)]
pub struct SnapshotLoader<'a, S: ?Sized> {
    session: &'a S,
}

impl<'a, S: RemoteSession + ?Sized> SnapshotLoader<'a, S> {
    /// Loader over a session
    #[inline]
    #[must_use]
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Fetch and normalize all records reachable from `plans`
    ///
    /// Items bound to operations must exist. Items named only as routing
    /// sources of collection parts, and uploads, are skipped with a warning
    /// when missing.
    ///
    /// # Errors
    /// - [`SourceError::NotFound`] for a missing plan or bound item
    /// - any session or normalization error
    pub async fn load(&self, plans: &[PlanId]) -> Result<TraceSnapshot, SourceError> {
        let mut snapshot = TraceSnapshot::new();
        let mut seen_plans = HashSet::new();
        let plans: Vec<&PlanId> = plans.iter().filter(|p| seen_plans.insert(*p)).collect();

        let fetched = try_join_all(plans.iter().map(|id| self.fetch_plan(id))).await?;

        let mut bound = Vec::new();
        for (plan, operations) in fetched {
            snapshot.insert_plan(normalize_plan(&plan, &operations));
            for raw in &operations {
                let record = normalize_operation(raw)?;
                bound.extend(record.inputs.iter().map(|b| b.item.clone()));
                bound.extend(record.outputs.iter().map(|b| b.item.clone()));
                snapshot.insert_operation(record);
            }
        }

        let mut requested: HashSet<ItemId> = HashSet::new();
        let mut pending: Vec<(ItemId, bool)> = dedup_new(&mut requested, bound)
            .into_iter()
            .map(|id| (id, true))
            .collect();
        let mut uploads: Vec<UploadLink> = Vec::new();

        while !pending.is_empty() {
            tracing::debug!(count = pending.len(), "fetching items");
            let fetched = try_join_all(
                pending
                    .iter()
                    .map(|(id, required)| self.fetch_item(id, *required)),
            )
            .await?;

            let mut sources = Vec::new();
            for record in fetched.into_iter().flatten() {
                sources.extend(routing_sources(&record));
                uploads.extend(record.uploads.iter().cloned());
                for part in &record.parts {
                    uploads.extend(part.uploads.iter().cloned());
                }
                snapshot.insert_item(record);
            }
            pending = dedup_new(&mut requested, sources)
                .into_iter()
                .map(|id| (id, false))
                .collect();
        }

        for plan in &plans {
            if let Some(record) = snapshot.plan(plan) {
                uploads.extend(record.uploads.iter().cloned());
            }
            for op in snapshot.operations(plan) {
                uploads.extend(op.uploads.iter().cloned());
            }
        }

        let mut requested_uploads = HashSet::new();
        let upload_ids: Vec<UploadId> = uploads
            .into_iter()
            .map(|link| link.upload)
            .filter(|id| requested_uploads.insert(id.clone()))
            .collect();
        let fetched = try_join_all(upload_ids.iter().map(|id| self.fetch_upload(id))).await?;
        for upload in fetched.into_iter().flatten() {
            snapshot.insert_upload(UploadRecord {
                id: upload.id,
                file_name: upload.upload_file_name,
                size: upload.upload_file_size,
                content_type: upload.upload_content_type,
                job: upload.job_id,
            });
        }

        tracing::info!(
            plans = plans.len(),
            items = snapshot.item_count(),
            uploads = snapshot.upload_count(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    async fn fetch_plan(&self, id: &PlanId) -> Result<(RawPlan, Vec<RawOperation>), SourceError> {
        let plan = self
            .session
            .plan(id)
            .await?
            .ok_or_else(|| SourceError::not_found("plan", id))?;
        let operations = self.session.operations(id).await?;
        Ok((plan, operations))
    }

    async fn fetch_item(&self, id: &ItemId, required: bool) -> Result<Option<ItemRecord>, SourceError> {
        match self.session.item(id).await? {
            Some(raw) => Ok(Some(normalize_item(&raw))),
            None if required => Err(SourceError::not_found("item", id)),
            None => {
                tracing::warn!(item = %id, "routing source not found, skipping");
                Ok(None)
            }
        }
    }

    async fn fetch_upload(&self, id: &UploadId) -> Result<Option<RawUpload>, SourceError> {
        let upload = self.session.upload(id).await?;
        if upload.is_none() {
            tracing::warn!(upload = %id, "upload not found, skipping");
        }
        Ok(upload)
    }
}

fn routing_sources(record: &ItemRecord) -> impl Iterator<Item = ItemId> + '_ {
    record
        .parts
        .iter()
        .flat_map(|part| part.sources.iter().map(|s| s.item_id().clone()))
}

fn dedup_new(requested: &mut HashSet<ItemId>, ids: Vec<ItemId>) -> Vec<ItemId> {
    ids.into_iter()
        .filter(|id| requested.insert(id.clone()))
        .collect()
}
