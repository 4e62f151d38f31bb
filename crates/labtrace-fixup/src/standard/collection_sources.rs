//! Collection sources inferred from part routing

use crate::context::FixupContext;
use crate::derivations::DerivationSet;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use labtrace_model::{EdgeOrigin, ItemNode, NodeId};

/// Collection-level sources inferred from part-level ones
///
/// An output collection left unresolved, whose parts are derived from
/// other items or parts, is derived from each distinct source: the source
/// item itself, or the collection owning a source part.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionSourceInference;

impl CollectionSourceInference {
    /// Unit name
    pub const NAME: &'static str = "collection_source_inference";
}

impl Fixup for CollectionSourceInference {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::AFTER_RESOLVE
    }

    fn after_resolve(
        &mut self,
        ctx: &mut FixupContext<'_>,
        _activity: NodeId,
        derivations: &mut DerivationSet,
    ) -> Result<(), FixupError> {
        let outputs: Vec<NodeId> = derivations
            .unresolved()
            .iter()
            .map(|u| u.output)
            .filter(|output| derivations.is_unresolved(*output))
            .collect();

        for output in outputs {
            let Some(collection) = ctx.item(output).filter(|c| c.is_collection()) else {
                continue;
            };
            if !collection.has_parts() {
                tracing::debug!(collection = %output, "collection has no parts");
                continue;
            }

            let mut sources: Vec<NodeId> = Vec::new();
            for (_, part) in collection.parts() {
                let mut inputs = derivations.inputs_of(part);
                inputs.extend(ctx.builder().derived_from(part));
                for input in inputs {
                    let source = ctx
                        .item(input)
                        .and_then(ItemNode::collection_node)
                        .unwrap_or(input);
                    if source != output && !sources.contains(&source) {
                        sources.push(source);
                    }
                }
            }

            for source in sources {
                tracing::info!(collection = %output, source = %source, "collection source from part routing");
                derivations.add(output, source, EdgeOrigin::Fixup(Self::NAME.into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{ItemId, UnresolvedDerivation, UnresolvedReason, Well};
    use labtrace_registry::TraceBuilder;
    use labtrace_source::TraceSnapshot;
    use pretty_assertions::assert_eq;

    fn well(s: &str) -> Well {
        s.parse().unwrap()
    }

    #[test]
    fn unresolved_collection_gets_part_sources() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let op = NodeId::from_index(0);
        let plate = builder.intern_collection(&ItemId::new("500")).unwrap();
        let strain = builder.intern_item(&ItemId::new("100")).unwrap();
        let other_plate = builder.intern_collection(&ItemId::new("600")).unwrap();
        let other_a1 = builder.intern_part(other_plate, well("A1"), None).unwrap();
        let a1 = builder.intern_part(plate, well("A1"), None).unwrap();
        let a2 = builder.intern_part(plate, well("A2"), None).unwrap();
        let a3 = builder.intern_part(plate, well("A3"), None).unwrap();

        let mut derivations = DerivationSet::new(op);
        derivations.add(a1, strain, EdgeOrigin::PartRouting);
        derivations.add(a2, other_a1, EdgeOrigin::PartRouting);
        derivations.add(a3, strain, EdgeOrigin::PartRouting);
        derivations.mark_unresolved(UnresolvedDerivation {
            activity: op,
            output: plate,
            role: "Plate".into(),
            reason: UnresolvedReason::NoRouting,
        });

        let mut ctx = FixupContext::new(&mut builder, &source);
        CollectionSourceInference
            .after_resolve(&mut ctx, op, &mut derivations)
            .unwrap();

        assert_eq!(derivations.inputs_of(plate), vec![strain, other_plate]);
        assert!(!derivations.is_unresolved(plate));
    }

    #[test]
    fn resolved_outputs_are_left_alone() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let op = NodeId::from_index(0);
        let plate = builder.intern_collection(&ItemId::new("500")).unwrap();
        let strain = builder.intern_item(&ItemId::new("100")).unwrap();
        let a1 = builder.intern_part(plate, well("A1"), None).unwrap();

        let mut derivations = DerivationSet::new(op);
        derivations.add(a1, strain, EdgeOrigin::PartRouting);

        let mut ctx = FixupContext::new(&mut builder, &source);
        CollectionSourceInference
            .after_resolve(&mut ctx, op, &mut derivations)
            .unwrap();
        assert!(derivations.inputs_of(plate).is_empty());
    }
}
