//! Trace assembly
//!
//! One pass over a set of plans:
//!
//! 1. intern activities, agents and bound items, in plan order and then by
//!    job start time
//! 2. resolve each activity's derivations through the fix-up hooks and
//!    commit usage, generation and derivation edges
//! 3. attach uploads of items, parts and activities; record plan uploads as
//!    plan attributes
//! 4. freeze and optionally check
//!
//! Newly interned items reach `on_item_interned` after their source
//! attributes are applied.

use crate::check::{check_graph, CheckReport};
use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::resolver::{resolve, ResolverOptions};
use labtrace_fixup::{Fixup, FixupContext, HookSet};
use labtrace_model::{
    ActivityNode, AgentNode, AssociationNode, AttachTarget, Binding, Edge, EdgeKind, ItemNode,
    Namespace, Node, NodeId, OperationId, Plan, PlanId, ProvenanceGraph, StableKey,
};
use labtrace_registry::TraceBuilder;
use labtrace_source::{
    ItemBinding, OperationRecord, PlanRecord, RecordSource, UploadLink, UploadRecord,
};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Assembles provenance graphs from a record source
pub struct TraceAssembler<'s> {
    source: &'s dyn RecordSource,
    config: TraceConfig,
}

impl std::fmt::Debug for TraceAssembler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceAssembler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'s> TraceAssembler<'s> {
    /// Assembler with the default configuration
    #[inline]
    #[must_use]
    pub fn new(source: &'s dyn RecordSource) -> Self {
        Self {
            source,
            config: TraceConfig::default(),
        }
    }

    /// Builder: configuration
    #[must_use]
    pub fn with_config(mut self, config: TraceConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Assemble the graph of `plans`
    ///
    /// Duplicate plan ids are ignored. The source is only read. Consistency
    /// findings are only logged; use [`TraceAssembler::assemble_checked`] to
    /// keep them.
    ///
    /// # Errors
    /// - [`TraceError::NoPlans`] if `plans` is empty
    /// - [`TraceError::EmptyTrace`] if a plan is unknown or has no operations
    /// - [`TraceError::MissingRecord`] if a bound item is not in the source
    /// - [`TraceError::Fixup`] if a unit fails
    /// - [`TraceError::Registry`] on any identity or model invariant violation
    /// - [`TraceError::Config`] if the configuration is invalid
    pub fn assemble(&self, plans: &[PlanId], fixups: &mut dyn Fixup) -> Result<ProvenanceGraph, TraceError> {
        self.assemble_checked(plans, fixups).map(|(graph, _)| graph)
    }

    /// Assemble the graph of `plans` and return the consistency check too
    ///
    /// The report is `None` when the check is disabled.
    ///
    /// # Errors
    /// As [`TraceAssembler::assemble`]
    pub fn assemble_checked(
        &self,
        plans: &[PlanId],
        fixups: &mut dyn Fixup,
    ) -> Result<(ProvenanceGraph, Option<CheckReport>), TraceError> {
        let span = tracing::info_span!("assemble", plans = plans.len());
        let _guard = span.enter();

        self.config.validate()?;
        let plans = self.requested_plans(plans)?;

        let mut builder = TraceBuilder::new();
        let mut pass = Pass {
            ctx: FixupContext::new(&mut builder, self.source),
            fixups,
            config: &self.config,
            interned_hook: false,
        };
        pass.interned_hook = pass.fixups.hooks().contains(HookSet::ITEM_INTERNED);

        let mut activities = Vec::new();
        for (record, operations) in &plans {
            activities.extend(pass.intern_plan(record, operations)?);
        }
        tracing::info!(activities = activities.len(), "activities interned");

        for activity in &activities {
            pass.resolve_activity(*activity)?;
        }
        pass.attach_uploads()?;
        for (record, _) in &plans {
            pass.record_plan_uploads(record);
        }

        let graph = builder.freeze()?;
        tracing::info!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            unresolved = graph.unresolved().len(),
            anomalies = graph.anomalies().len(),
            "trace assembled"
        );
        let report = self
            .config
            .check
            .enabled
            .then(|| check_graph(&graph, self.source, &self.config.check));
        Ok((graph, report))
    }

    fn requested_plans(
        &self,
        plans: &[PlanId],
    ) -> Result<Vec<(&'s PlanRecord, Vec<&'s OperationRecord>)>, TraceError> {
        if plans.is_empty() {
            return Err(TraceError::NoPlans);
        }
        let source = self.source;
        let mut seen = HashSet::new();
        let mut requested = Vec::new();
        for id in plans {
            if !seen.insert(id) {
                continue;
            }
            let record = source
                .plan(id)
                .ok_or_else(|| TraceError::EmptyTrace { plan: id.clone() })?;
            let mut operations = source.operations(id);
            if operations.is_empty() {
                return Err(TraceError::EmptyTrace { plan: id.clone() });
            }
            operations.sort_by(|a, b| execution_order(a, b));
            requested.push((record, operations));
        }
        Ok(requested)
    }
}

/// Assemble with the default configuration
///
/// # Errors
/// As [`TraceAssembler::assemble`]
pub fn assemble(
    source: &dyn RecordSource,
    plans: &[PlanId],
    fixups: &mut dyn Fixup,
) -> Result<ProvenanceGraph, TraceError> {
    TraceAssembler::new(source).assemble(plans, fixups)
}

/// Job start time, unknown last, then operation id
fn execution_order(a: &OperationRecord, b: &OperationRecord) -> Ordering {
    let start = |op: &OperationRecord| op.job.as_ref().and_then(|j| j.started_at);
    match (start(a), start(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| id_order(&a.id, &b.id))
}

/// Numeric ids compare as numbers
fn id_order(a: &OperationId, b: &OperationId) -> Ordering {
    match (a.as_str().parse::<u64>(), b.as_str().parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.as_str().cmp(b.as_str()),
    }
}

struct Pass<'a, 'f> {
    ctx: FixupContext<'a>,
    fixups: &'f mut dyn Fixup,
    config: &'a TraceConfig,
    interned_hook: bool,
}

impl Pass<'_, '_> {
    fn options(&self) -> ResolverOptions {
        ResolverOptions {
            sample_type_fallback: self.config.sample_type_fallback,
            part_derivations: self.config.part_derivations,
        }
    }

    /// Hand every newly interned item to the fix-ups
    fn drain_interned(&mut self) -> Result<(), TraceError> {
        while let Some(item) = self.ctx.builder_mut().registry_mut().pop_interned_item() {
            if self.interned_hook {
                self.fixups.on_item_interned(&mut self.ctx, item)?;
            }
        }
        Ok(())
    }

    fn intern_plan(&mut self, record: &PlanRecord, operations: &[&OperationRecord]) -> Result<Vec<NodeId>, TraceError> {
        let mut plan = Plan::new(record.id.clone(), record.name.clone());
        plan.status.clone_from(&record.status);
        plan.attributes.extend(&record.attributes);
        if let Some(lab) = &self.config.lab {
            plan.attributes.insert("lab", Value::String(lab.clone()));
        }
        if let Some(experiment) = &self.config.experiment_id {
            if !plan.attributes.contains("experiment_reference") {
                tracing::debug!(plan = %record.id, "adding experiment reference");
                plan.attributes
                    .insert("experiment_reference", Value::String(experiment.clone()));
            }
        }

        for (ordinal, operation) in operations.iter().enumerate() {
            if let Some(activity) = self.intern_activity(operation, ordinal)? {
                plan.activities.push(activity);
            }
        }
        tracing::debug!(plan = %record.id, activities = plan.activities.len(), "plan interned");
        let activities = plan.activities.clone();
        self.ctx.builder_mut().add_plan(plan);
        Ok(activities)
    }

    fn intern_activity(&mut self, operation: &OperationRecord, ordinal: usize) -> Result<Option<NodeId>, TraceError> {
        let key = StableKey::from(&operation.id);
        if let Some(existing) = self.ctx.builder().registry().lookup(Namespace::Activity, &key) {
            tracing::warn!(operation = %operation.id, activity = %existing, "operation listed twice, keeping first");
            return Ok(None);
        }

        let mut node = ActivityNode::new(
            operation.id.clone(),
            operation.operation_type.clone(),
            operation.plan.clone(),
        );
        node.ordinal = ordinal;
        node.parameters.clone_from(&operation.parameters);
        node.attributes.extend(&operation.attributes);
        if let Some(job) = &operation.job {
            node.job = Some(job.id.clone());
            node.started_at = job.started_at;
            node.ended_at = job.ended_at;
        }
        let activity = self.ctx.builder_mut().intern_activity(node)?;

        if let Some(agent) = operation.job.as_ref().and_then(|j| j.agent.as_ref()) {
            let agent = self
                .ctx
                .builder_mut()
                .intern_agent(AgentNode::new(agent.id.clone(), agent.name.clone()))?;
            if let Some(node) = self.ctx.activity_mut(activity) {
                node.agent = Some(agent);
            }
            self.ctx
                .builder_mut()
                .add_edge(Edge::sourced(EdgeKind::Attribution, activity, agent))?;
        }

        for binding in &operation.inputs {
            let item = self.bind_item(binding)?;
            if let Some(node) = self.ctx.activity_mut(activity) {
                node.add_input(Binding::new(binding.role.clone(), item));
            }
        }
        for binding in &operation.outputs {
            let item = self.bind_item(binding)?;
            if let Some(node) = self.ctx.activity_mut(activity) {
                node.add_output(Binding::new(binding.role.clone(), item));
            }
        }
        tracing::debug!(operation = %operation.id, activity = %activity, "activity interned");
        Ok(Some(activity))
    }

    /// Node an item binding refers to: the item, or its part at the bound well
    fn bind_item(&mut self, binding: &ItemBinding) -> Result<NodeId, TraceError> {
        let item = self.ctx.intern_item(&binding.item)?;
        let node = match binding.well {
            Some(well) if self.ctx.item(item).is_some_and(ItemNode::is_collection) => {
                self.ctx.intern_part(item, well)?
            }
            Some(well) => {
                tracing::warn!(item = %binding.item, well = %well, "well bound on a non-collection, using the item");
                item
            }
            None => item,
        };
        self.drain_interned()?;
        Ok(node)
    }

    fn resolve_activity(&mut self, activity: NodeId) -> Result<(), TraceError> {
        let span = tracing::debug_span!("resolve", activity = %activity);
        let _guard = span.enter();

        let hooks = self.fixups.hooks();
        if hooks.contains(HookSet::BEFORE_RESOLVE) {
            self.fixups.before_resolve(&mut self.ctx, activity)?;
            self.drain_interned()?;
        }

        let options = self.options();
        let mut derivations = resolve(&mut self.ctx, activity, options)?;
        self.drain_interned()?;

        if hooks.contains(HookSet::AFTER_RESOLVE) {
            self.fixups
                .after_resolve(&mut self.ctx, activity, &mut derivations)?;
            self.drain_interned()?;
        }

        let Some(node) = self.ctx.activity(activity) else {
            return Ok(());
        };
        let inputs: Vec<NodeId> = node.inputs().iter().map(|b| b.item).collect();
        let outputs: Vec<NodeId> = node.outputs().iter().map(|b| b.item).collect();

        let builder = self.ctx.builder_mut();
        for input in inputs {
            builder.add_edge(Edge::sourced(EdgeKind::Usage, activity, input))?;
        }
        for output in outputs {
            builder.add_edge(Edge::sourced(EdgeKind::Generation, activity, output))?;
            let parts: Vec<NodeId> = builder
                .registry()
                .item(output)
                .map(|item| item.parts().map(|(_, part)| part).collect())
                .unwrap_or_default();
            for part in parts {
                builder.add_edge(Edge::sourced(EdgeKind::Generation, activity, part))?;
            }
        }

        let (proposed, unresolved) = derivations.into_parts();
        for derivation in proposed {
            builder.add_derivation(derivation.output, derivation.input, derivation.origin)?;
        }
        for entry in unresolved {
            builder.annotate_unresolved(entry);
        }
        Ok(())
    }

    /// Attach every upload of items, parts and activities in construction order
    fn attach_uploads(&mut self) -> Result<(), TraceError> {
        let source = self.ctx.source();
        let mut pending: Vec<(AttachTarget, &UploadLink)> = Vec::new();
        for (id, node) in self.ctx.builder().registry().iter() {
            match node {
                Node::Item(item) => {
                    pending.extend(item_uploads(source, self.ctx.builder(), item).map(|l| (AttachTarget::Item(id), l)));
                }
                Node::Activity(activity) => {
                    if let Some(record) = operation_record(source, activity) {
                        pending.extend(record.uploads.iter().map(|l| (AttachTarget::Activity(id), l)));
                    }
                }
                Node::Association(_) | Node::Agent(_) => {}
            }
        }

        let attach_hook = self.fixups.hooks().contains(HookSet::ATTACH);
        let mut attached = HashSet::new();
        for (target, link) in pending {
            if !attached.insert((link.upload.clone(), target)) {
                continue;
            }
            let Some(upload) = source.upload(&link.upload) else {
                tracing::warn!(upload = %link.upload, key = %link.key, "upload not in source, skipping");
                continue;
            };
            let association = self
                .ctx
                .builder_mut()
                .intern_association(association_node(link, upload))?;

            let mut target = Some(target);
            if attach_hook {
                self.fixups
                    .on_attach(&mut self.ctx, association, &mut target)?;
                self.drain_interned()?;
            }
            match target {
                Some(target) => self.ctx.builder_mut().attach(association, target)?,
                None => tracing::debug!(upload = %link.upload, "attachment skipped by fix-up"),
            }
        }
        Ok(())
    }

    /// Plan uploads become `bead_files` and `uploads` plan attributes
    fn record_plan_uploads(&mut self, record: &PlanRecord) {
        if record.uploads.is_empty() {
            return;
        }
        let source = self.ctx.source();
        let mut beads = Vec::new();
        let mut others = Vec::new();
        for link in &record.uploads {
            let entry = json!({
                "id": link.upload.as_str(),
                "key": link.key,
                "file_name": source.upload(&link.upload).map(|u| u.file_name.as_str()),
            });
            if link.key.ends_with("BEAD_UPLOAD") || link.key.starts_with("BEADS_") {
                beads.push(entry);
            } else {
                others.push(entry);
            }
        }
        if let Some(plan) = self.ctx.builder_mut().plan_mut(&record.id) {
            plan.attributes.insert("bead_files", Value::Array(beads));
            plan.attributes.insert("uploads", Value::Array(others));
        }
    }
}

fn item_uploads<'r>(
    source: &'r dyn RecordSource,
    builder: &TraceBuilder,
    item: &ItemNode,
) -> impl Iterator<Item = &'r UploadLink> {
    let links: &'r [UploadLink] = match (item.collection_node(), item.well()) {
        (Some(collection), Some(well)) => builder
            .registry()
            .item(collection)
            .and_then(ItemNode::item_id)
            .and_then(|id| source.item(id))
            .and_then(|record| record.part(well))
            .map(|part| part.uploads.as_slice())
            .unwrap_or_default(),
        _ => item
            .item_id()
            .and_then(|id| source.item(id))
            .map(|record| record.uploads.as_slice())
            .unwrap_or_default(),
    };
    links.iter()
}

fn operation_record<'r>(source: &'r dyn RecordSource, activity: &ActivityNode) -> Option<&'r OperationRecord> {
    source
        .operations(&activity.plan)
        .into_iter()
        .find(|op| &op.id == activity.operation_id())
}

fn association_node(link: &UploadLink, upload: &UploadRecord) -> AssociationNode {
    let mut node = AssociationNode::new(upload.id.clone(), link.key.clone(), upload.file_name.clone());
    node.size = upload.size;
    node.content_type.clone_from(&upload.content_type);
    node.job.clone_from(&upload.job);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_test_utils::OperationFixture;

    #[test]
    fn operation_ids_compare_numerically() {
        assert_eq!(id_order(&OperationId::new("9"), &OperationId::new("10")), Ordering::Less);
        assert_eq!(id_order(&OperationId::new("b"), &OperationId::new("a")), Ordering::Greater);
        assert_eq!(id_order(&OperationId::new("10"), &OperationId::new("a")), Ordering::Less);
    }

    #[test]
    fn jobs_without_start_run_last() {
        let started = OperationFixture::new("20", "Step")
            .job("1", "2019-05-01T09:00:00Z")
            .build();
        let earlier = OperationFixture::new("30", "Step")
            .job("2", "2019-05-01T08:00:00Z")
            .build();
        let unscheduled = OperationFixture::new("10", "Step").build();

        assert_eq!(execution_order(&started, &unscheduled), Ordering::Less);
        assert_eq!(execution_order(&earlier, &started), Ordering::Less);
        assert_eq!(execution_order(&unscheduled, &unscheduled.clone()), Ordering::Equal);
    }
}
