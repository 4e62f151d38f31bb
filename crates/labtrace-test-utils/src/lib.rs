//! Testing utilities for the labtrace workspace
//!
//! Shared fixtures for record sources, a recording fix-up, and tracing setup.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use labtrace_fixup::{DerivationSet, Fixup, FixupContext, FixupError, HookSet};
use labtrace_model::{
    AgentId, AttachTarget, Attributes, ItemId, JobId, NodeId, OperationId, OperationType,
    Parameter, PlanId, Sample, SampleType, UploadId, Well,
};
use labtrace_source::{
    AgentRecord, ItemBinding, ItemRecord, JobRecord, OperationRecord, PartRecord, PlanRecord,
    SourceRef, TraceSnapshot, UploadLink, UploadRecord,
};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Install a `RUST_LOG`-filtered subscriber once per test binary
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn well(s: &str) -> Well {
    s.parse().unwrap()
}

/// Builds a [`TraceSnapshot`] record by record
///
/// Operations are added to the current plan, which starts as plan `1`.
#[derive(Debug, Clone)]
pub struct TraceFixture {
    plans: IndexMap<PlanId, PlanRecord>,
    current: PlanId,
    operations: Vec<OperationRecord>,
    items: IndexMap<ItemId, ItemRecord>,
    uploads: Vec<UploadRecord>,
}

impl Default for TraceFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceFixture {
    pub fn new() -> Self {
        let fixture = Self {
            plans: IndexMap::new(),
            current: PlanId::new("1"),
            operations: Vec::new(),
            items: IndexMap::new(),
            uploads: Vec::new(),
        };
        fixture.plan("1")
    }

    /// Start (or switch to) a plan
    pub fn plan(mut self, id: &str) -> Self {
        let plan_id = PlanId::new(id);
        self.plans
            .entry(plan_id.clone())
            .or_insert_with(|| PlanRecord {
                id: plan_id.clone(),
                name: format!("plan {id}"),
                status: Some("done".to_string()),
                operations: Vec::new(),
                attributes: Attributes::new(),
                uploads: Vec::new(),
            });
        self.current = plan_id;
        self
    }

    pub fn plan_attribute(mut self, key: &str, value: Value) -> Self {
        self.current_plan().attributes.insert(key, value);
        self
    }

    pub fn plan_upload(mut self, key: &str, upload: &str) -> Self {
        self.current_plan().uploads.push(link(key, upload));
        self
    }

    /// Whole item with an optional sample type
    pub fn item(mut self, id: &str, sample_type: Option<&str>) -> Self {
        self.items.insert(
            ItemId::new(id),
            ItemRecord {
                id: ItemId::new(id),
                is_collection: false,
                sample: Some(Sample {
                    id: format!("s{id}"),
                    name: None,
                }),
                sample_type: sample_type.map(SampleType::new),
                object_type: None,
                attributes: Attributes::new(),
                uploads: Vec::new(),
                parts: Vec::new(),
            },
        );
        self
    }

    /// Collection with parts at the given wells
    pub fn collection(mut self, id: &str, wells: &[&str]) -> Self {
        self.items.insert(
            ItemId::new(id),
            ItemRecord {
                id: ItemId::new(id),
                is_collection: true,
                sample: None,
                sample_type: None,
                object_type: None,
                attributes: Attributes::new(),
                uploads: Vec::new(),
                parts: wells.iter().map(|w| PartRecord::at(well(w))).collect(),
            },
        );
        self
    }

    pub fn item_attribute(mut self, item: &str, key: &str, value: Value) -> Self {
        self.item_mut(item).attributes.insert(key, value);
        self
    }

    /// Sample type of a part
    pub fn part_type(mut self, collection: &str, at: &str, sample_type: &str) -> Self {
        self.part_mut(collection, at).sample_type = Some(SampleType::new(sample_type));
        self
    }

    /// Per-well source of a part (`id` or `id/well`)
    pub fn part_source(mut self, collection: &str, at: &str, source: &str) -> Self {
        let source = match source.split_once('/') {
            Some((id, w)) => SourceRef::Part {
                collection: ItemId::new(id),
                well: well(w),
            },
            None => SourceRef::Item(ItemId::new(source)),
        };
        self.part_mut(collection, at).sources.push(source);
        self
    }

    pub fn item_upload(mut self, item: &str, key: &str, upload: &str) -> Self {
        self.item_mut(item).uploads.push(link(key, upload));
        self
    }

    pub fn part_upload(mut self, collection: &str, at: &str, key: &str, upload: &str) -> Self {
        self.part_mut(collection, at).uploads.push(link(key, upload));
        self
    }

    pub fn upload(mut self, id: &str, file_name: &str) -> Self {
        self.uploads.push(UploadRecord {
            id: UploadId::new(id),
            file_name: file_name.to_string(),
            size: None,
            content_type: None,
            job: None,
        });
        self
    }

    /// Add an operation to the current plan
    pub fn operation(mut self, operation: OperationFixture) -> Self {
        let mut record = operation.0;
        record.plan = self.current.clone();
        self.current_plan().operations.push(record.id.clone());
        self.operations.push(record);
        self
    }

    pub fn build(self) -> TraceSnapshot {
        let mut snapshot = TraceSnapshot::new();
        for (_, plan) in self.plans {
            snapshot.insert_plan(plan);
        }
        for operation in self.operations {
            snapshot.insert_operation(operation);
        }
        for (_, item) in self.items {
            snapshot.insert_item(item);
        }
        for upload in self.uploads {
            snapshot.insert_upload(upload);
        }
        snapshot
    }

    fn current_plan(&mut self) -> &mut PlanRecord {
        self.plans.get_mut(&self.current).unwrap()
    }

    fn item_mut(&mut self, id: &str) -> &mut ItemRecord {
        self.items
            .get_mut(&ItemId::new(id))
            .unwrap_or_else(|| panic!("fixture item {id} not declared"))
    }

    fn part_mut(&mut self, collection: &str, at: &str) -> &mut PartRecord {
        let at = well(at);
        let record = self.item_mut(collection);
        if !record.parts.iter().any(|p| p.well == at) {
            record.parts.push(PartRecord::at(at));
        }
        record.parts.iter_mut().find(|p| p.well == at).unwrap()
    }
}

fn link(key: &str, upload: &str) -> UploadLink {
    UploadLink {
        key: key.to_string(),
        upload: UploadId::new(upload),
    }
}

/// Builds one [`OperationRecord`]
#[derive(Debug, Clone)]
pub struct OperationFixture(OperationRecord);

impl OperationFixture {
    pub fn new(id: &str, operation_type: &str) -> Self {
        Self(OperationRecord {
            id: OperationId::new(id),
            plan: PlanId::new(""),
            operation_type: OperationType::named(operation_type),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            job: None,
            attributes: Attributes::new(),
            uploads: Vec::new(),
        })
    }

    pub fn input(mut self, role: &str, item: &str) -> Self {
        self.0.inputs.push(binding(role, item, None));
        self
    }

    pub fn output(mut self, role: &str, item: &str) -> Self {
        self.0.outputs.push(binding(role, item, None));
        self
    }

    pub fn input_part(mut self, role: &str, collection: &str, at: &str) -> Self {
        self.0.inputs.push(binding(role, collection, Some(well(at))));
        self
    }

    pub fn output_part(mut self, role: &str, collection: &str, at: &str) -> Self {
        self.0.outputs.push(binding(role, collection, Some(well(at))));
        self
    }

    /// Declare routing from an input role to an output role
    pub fn route(mut self, input_role: &str, output_role: &str) -> Self {
        self.0.operation_type.routing.declare(input_role, output_role);
        self
    }

    pub fn parameter(mut self, role: &str, value: Value) -> Self {
        self.0.parameters.push(Parameter {
            role: role.to_string(),
            value,
        });
        self
    }

    pub fn attribute(mut self, key: &str, value: Value) -> Self {
        self.0.attributes.insert(key, value);
        self
    }

    /// Completed job started at an RFC 3339 time
    pub fn job(mut self, id: &str, started_at: &str) -> Self {
        let started_at: DateTime<Utc> = started_at.parse().unwrap();
        let agent = self.0.job.take().and_then(|j| j.agent);
        self.0.job = Some(JobRecord {
            id: JobId::new(id),
            started_at: Some(started_at),
            ended_at: None,
            agent,
        });
        self
    }

    /// Person the job ran under; adds a job if there is none
    pub fn agent(mut self, id: &str, name: &str) -> Self {
        let job_id = JobId::new(format!("job-{}", self.0.id));
        let job = self.0.job.get_or_insert_with(|| JobRecord {
            id: job_id,
            started_at: None,
            ended_at: None,
            agent: None,
        });
        job.agent = Some(AgentRecord {
            id: AgentId::new(id),
            name: name.to_string(),
        });
        self
    }

    pub fn upload(mut self, key: &str, upload: &str) -> Self {
        self.0.uploads.push(link(key, upload));
        self
    }

    pub fn build(self) -> OperationRecord {
        self.0
    }
}

fn binding(role: &str, item: &str, well: Option<Well>) -> ItemBinding {
    ItemBinding {
        role: role.to_string(),
        item: ItemId::new(item),
        well,
    }
}

/// One observed hook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    BeforeResolve(NodeId),
    AfterResolve { activity: NodeId, proposed: usize },
    ItemInterned(NodeId),
    Attach { association: NodeId, target: Option<AttachTarget> },
}

/// Shared log of `(unit name, call)` pairs
pub type CallLog = Rc<RefCell<Vec<(String, HookCall)>>>;

/// Fix-up that records every call and changes nothing
#[derive(Debug, Clone)]
pub struct RecordingFixup {
    name: String,
    hooks: HookSet,
    log: CallLog,
}

impl RecordingFixup {
    pub fn new(name: &str, hooks: HookSet, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            hooks,
            log: Rc::clone(log),
        }
    }

    /// Recorder on every hook with its own log
    pub fn all(name: &str) -> (Self, CallLog) {
        let log = CallLog::default();
        (Self::new(name, HookSet::ALL, &log), log)
    }

    fn record(&self, call: HookCall) {
        self.log.borrow_mut().push((self.name.clone(), call));
    }
}

impl Fixup for RecordingFixup {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn before_resolve(&mut self, _ctx: &mut FixupContext<'_>, activity: NodeId) -> Result<(), FixupError> {
        self.record(HookCall::BeforeResolve(activity));
        Ok(())
    }

    fn after_resolve(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        activity: NodeId,
        derivations: &mut DerivationSet,
    ) -> Result<(), FixupError> {
        self.record(HookCall::AfterResolve {
            activity,
            proposed: derivations.len(),
        });
        Ok(())
    }

    fn on_item_interned(&mut self, _ctx: &mut FixupContext<'_>, item: NodeId) -> Result<(), FixupError> {
        self.record(HookCall::ItemInterned(item));
        Ok(())
    }

    fn on_attach(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        association: NodeId,
        target: &mut Option<AttachTarget>,
    ) -> Result<(), FixupError> {
        self.record(HookCall::Attach {
            association,
            target: *target,
        });
        Ok(())
    }
}
