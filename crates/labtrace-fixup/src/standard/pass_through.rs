//! Wells that keep their part across an activity

use crate::context::FixupContext;
use crate::derivations::DerivationSet;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use labtrace_model::{EdgeOrigin, NodeId, Sample, SampleType, Well};
use std::collections::HashSet;

/// Well-to-well derivations for operations that keep the plate layout
///
/// For a configured operation type, every output collection derived from an
/// input collection gains, for each part of the input, a part at the same
/// well derived from it. Parts that already have a derivation are left
/// alone.
#[derive(Debug, Clone, Default)]
pub struct PassThroughWells {
    operation_types: HashSet<String>,
}

impl PassThroughWells {
    /// Unit name
    pub const NAME: &'static str = "pass_through_wells";

    /// Apply to the given operation types
    #[must_use]
    pub fn new(operation_types: impl IntoIterator<Item = String>) -> Self {
        Self {
            operation_types: operation_types.into_iter().collect(),
        }
    }
}

impl Fixup for PassThroughWells {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::AFTER_RESOLVE
    }

    fn after_resolve(
        &mut self,
        ctx: &mut FixupContext<'_>,
        activity: NodeId,
        derivations: &mut DerivationSet,
    ) -> Result<(), FixupError> {
        let applies = ctx
            .activity(activity)
            .is_some_and(|a| self.operation_types.contains(&a.operation_type.name));
        if !applies {
            return Ok(());
        }

        let collection_pairs: Vec<(NodeId, NodeId)> = derivations
            .iter()
            .filter(|d| is_collection(ctx, d.output) && is_collection(ctx, d.input))
            .map(|d| (d.output, d.input))
            .collect();

        for (output, input) in collection_pairs {
            let source_parts: Vec<(Well, NodeId)> = ctx
                .item(input)
                .map(|c| c.parts().collect())
                .unwrap_or_default();
            for (well, source_part) in source_parts {
                let part = ctx.intern_part(output, well)?;
                if !derivations.inputs_of(part).is_empty()
                    || !ctx.builder().derived_from(part).is_empty()
                {
                    continue;
                }
                let (sample_type, sample): (Option<SampleType>, Option<Sample>) = ctx
                    .item(source_part)
                    .map(|p| (p.sample_type.clone(), p.sample.clone()))
                    .unwrap_or_default();
                if let Some(node) = ctx.item_mut(part) {
                    if node.sample_type.is_none() {
                        node.sample_type = sample_type;
                    }
                    if node.sample.is_none() {
                        node.sample = sample;
                    }
                }
                derivations.add(part, source_part, EdgeOrigin::Fixup(Self::NAME.into()));
            }
        }
        Ok(())
    }
}

fn is_collection(ctx: &FixupContext<'_>, id: NodeId) -> bool {
    ctx.item(id).is_some_and(labtrace_model::ItemNode::is_collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{ActivityNode, ItemId, OperationId, OperationType, PlanId};
    use labtrace_registry::TraceBuilder;
    use labtrace_source::TraceSnapshot;
    use pretty_assertions::assert_eq;

    fn well(s: &str) -> Well {
        s.parse().unwrap()
    }

    #[test]
    fn parts_follow_source_wells() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let op = builder
            .intern_activity(ActivityNode::new(
                OperationId::new("1"),
                OperationType::named("Transfer"),
                PlanId::new("p"),
            ))
            .unwrap();
        let input = builder.intern_collection(&ItemId::new("100")).unwrap();
        let output = builder.intern_collection(&ItemId::new("200")).unwrap();
        let a1 = builder.intern_part(input, well("A1"), None).unwrap();
        let b2 = builder.intern_part(input, well("B2"), None).unwrap();
        builder.registry_mut().item_mut(a1).unwrap().sample_type = Some(SampleType::new("Yeast"));

        let mut derivations = DerivationSet::new(op);
        derivations.add(output, input, EdgeOrigin::DeclaredRouting);

        let mut unit = PassThroughWells::new(["Transfer".to_string()]);
        let mut ctx = FixupContext::new(&mut builder, &source);
        unit.after_resolve(&mut ctx, op, &mut derivations).unwrap();

        let out_a1 = ctx.builder().find_part(output, well("A1")).unwrap();
        let out_b2 = ctx.builder().find_part(output, well("B2")).unwrap();
        assert_eq!(derivations.inputs_of(out_a1), vec![a1]);
        assert_eq!(derivations.inputs_of(out_b2), vec![b2]);
        assert_eq!(
            ctx.item(out_a1).unwrap().sample_type,
            Some(SampleType::new("Yeast"))
        );
    }

    #[test]
    fn other_operation_types_are_ignored() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let op = builder
            .intern_activity(ActivityNode::new(
                OperationId::new("1"),
                OperationType::named("Dilute"),
                PlanId::new("p"),
            ))
            .unwrap();
        let input = builder.intern_collection(&ItemId::new("100")).unwrap();
        let output = builder.intern_collection(&ItemId::new("200")).unwrap();
        builder.intern_part(input, well("A1"), None).unwrap();

        let mut derivations = DerivationSet::new(op);
        derivations.add(output, input, EdgeOrigin::DeclaredRouting);
        let mut unit = PassThroughWells::new(["Transfer".to_string()]);
        let mut ctx = FixupContext::new(&mut builder, &source);
        unit.after_resolve(&mut ctx, op, &mut derivations).unwrap();

        assert_eq!(derivations.len(), 1);
        assert!(ctx.builder().find_part(output, well("A1")).is_none());
    }
}
