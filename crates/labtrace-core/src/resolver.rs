//! Derivation resolution
//!
//! Proposes, for one activity, which outputs were derived from which
//! inputs:
//!
//! 1. declared routing, kept only where sample types agree
//! 2. otherwise the single input sharing the output's sample type
//! 3. otherwise nothing, and the output is marked unresolved
//!
//! Output collections whose source record carries per-well sources also get
//! part-level derivations. Nothing is committed here.

use labtrace_fixup::{DerivationSet, FixupContext, FixupError};
use labtrace_model::{
    Binding, EdgeOrigin, ItemNode, NodeId, SampleType, UnresolvedDerivation, UnresolvedReason,
};
use labtrace_source::SourceRef;

/// Resolution switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Use the sample-type fallback when no routing is declared
    pub sample_type_fallback: bool,
    /// Follow part-level routing data of output collections
    pub part_derivations: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            sample_type_fallback: true,
            part_derivations: true,
        }
    }
}

/// Propose the derivations of one activity
///
/// Items named only as part-level sources are interned from the source when
/// present and skipped with a warning otherwise.
///
/// # Errors
/// [`FixupError::Registry`] on a key conflict while interning a source item
pub fn resolve(
    ctx: &mut FixupContext<'_>,
    activity: NodeId,
    options: ResolverOptions,
) -> Result<DerivationSet, FixupError> {
    let mut derivations = DerivationSet::new(activity);
    let Some(node) = ctx.activity(activity) else {
        return Ok(derivations);
    };
    let routing = node.operation_type.routing.clone();
    let inputs = node.inputs().to_vec();
    let outputs = node.outputs().to_vec();

    for output in &outputs {
        let output_type = sample_type(ctx, output.item);
        let routed_roles = routing.inputs_for(&output.role);

        if routed_roles.is_empty() {
            resolve_by_sample_type(ctx, &mut derivations, &inputs, output, output_type, options);
            continue;
        }

        let routed = distinct_items(
            inputs
                .iter()
                .filter(|b| routed_roles.contains(&b.role.as_str()) && b.item != output.item),
        );
        let matching: Vec<NodeId> = routed
            .iter()
            .copied()
            .filter(|input| sample_type(ctx, *input) == output_type)
            .collect();

        if !matching.is_empty() {
            for input in matching {
                derivations.add(output.item, input, EdgeOrigin::DeclaredRouting);
            }
        } else if routed.is_empty() {
            mark(&mut derivations, output, UnresolvedReason::NoRouting);
        } else {
            mark(
                &mut derivations,
                output,
                UnresolvedReason::RoutingTypeMismatch { routed },
            );
        }
    }

    if options.part_derivations {
        for output in &outputs {
            resolve_parts(ctx, &mut derivations, output.item)?;
        }
    }

    tracing::debug!(
        activity = %activity,
        proposed = derivations.len(),
        unresolved = derivations.unresolved().len(),
        "derivations resolved"
    );
    Ok(derivations)
}

fn resolve_by_sample_type(
    ctx: &FixupContext<'_>,
    derivations: &mut DerivationSet,
    inputs: &[Binding],
    output: &Binding,
    output_type: Option<SampleType>,
    options: ResolverOptions,
) {
    if !options.sample_type_fallback {
        mark(derivations, output, UnresolvedReason::NoRouting);
        return;
    }
    let candidates: Vec<NodeId> = distinct_items(inputs.iter().filter(|b| b.item != output.item))
        .into_iter()
        .filter(|input| sample_type(ctx, *input) == output_type)
        .collect();
    match candidates.as_slice() {
        [single] => {
            derivations.add(output.item, *single, EdgeOrigin::SampleTypeFallback);
        }
        [] => mark(derivations, output, UnresolvedReason::NoRouting),
        _ => mark(derivations, output, UnresolvedReason::Ambiguous { candidates }),
    }
}

/// Part-level derivations of an output collection from its source record
fn resolve_parts(
    ctx: &mut FixupContext<'_>,
    derivations: &mut DerivationSet,
    output: NodeId,
) -> Result<(), FixupError> {
    let Some(collection) = ctx.item(output).filter(|c| c.is_collection()) else {
        return Ok(());
    };
    let Some(item_id) = collection.item_id() else {
        return Ok(());
    };
    let source = ctx.source();
    let Some(record) = source.item(item_id) else {
        return Ok(());
    };

    for part_record in &record.parts {
        if part_record.sources.is_empty() {
            continue;
        }
        let part = ctx.intern_part(output, part_record.well)?;
        for source_ref in &part_record.sources {
            let Some(input) = source_node(ctx, source_ref)? else {
                continue;
            };
            if input == part {
                continue;
            }
            derivations.add(part, input, EdgeOrigin::PartRouting);
        }
    }
    Ok(())
}

/// Node for a part-level source, interned if the source has its record
fn source_node(ctx: &mut FixupContext<'_>, source_ref: &SourceRef) -> Result<Option<NodeId>, FixupError> {
    let item_id = source_ref.item_id();
    if ctx.find_item(item_id).is_none() && ctx.source().item(item_id).is_none() {
        tracing::warn!(item = %item_id, "part source not in source records, skipping");
        return Ok(None);
    }
    let item = ctx.intern_item(item_id)?;
    match source_ref {
        SourceRef::Item(_) => Ok(Some(item)),
        SourceRef::Part { well, .. } => {
            if ctx.item(item).is_some_and(ItemNode::is_collection) {
                Ok(Some(ctx.intern_part(item, *well)?))
            } else {
                tracing::warn!(item = %item_id, well = %well, "part source names a well of a non-collection, using the item");
                Ok(Some(item))
            }
        }
    }
}

fn sample_type(ctx: &FixupContext<'_>, item: NodeId) -> Option<SampleType> {
    ctx.item(item).and_then(|i| i.sample_type.clone())
}

fn distinct_items<'a>(bindings: impl Iterator<Item = &'a Binding>) -> Vec<NodeId> {
    let mut items = Vec::new();
    for binding in bindings {
        if !items.contains(&binding.item) {
            items.push(binding.item);
        }
    }
    items
}

fn mark(derivations: &mut DerivationSet, output: &Binding, reason: UnresolvedReason) {
    let activity = derivations.activity();
    derivations.mark_unresolved(UnresolvedDerivation {
        activity,
        output: output.item,
        role: output.role.clone(),
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{
        ActivityNode, ItemId, OperationId, OperationType, PlanId, RoutingTable, Well,
    };
    use labtrace_registry::TraceBuilder;
    use labtrace_source::{ItemRecord, PartRecord, TraceSnapshot};
    use pretty_assertions::assert_eq;

    struct Fixture {
        builder: TraceBuilder,
        activity: NodeId,
    }

    impl Fixture {
        fn new(routing: RoutingTable) -> Self {
            let mut builder = TraceBuilder::new();
            let activity = builder
                .intern_activity(ActivityNode::new(
                    OperationId::new("1"),
                    OperationType::named("Op").with_routing(routing),
                    PlanId::new("p"),
                ))
                .unwrap();
            Self { builder, activity }
        }

        fn item(&mut self, id: &str, sample_type: Option<&str>) -> NodeId {
            let node = self.builder.intern_item(&ItemId::new(id)).unwrap();
            self.builder.registry_mut().item_mut(node).unwrap().sample_type =
                sample_type.map(SampleType::new);
            node
        }

        fn input(&mut self, role: &str, item: NodeId) {
            self.builder
                .registry_mut()
                .activity_mut(self.activity)
                .unwrap()
                .add_input(Binding::new(role, item));
        }

        fn output(&mut self, role: &str, item: NodeId) {
            self.builder
                .registry_mut()
                .activity_mut(self.activity)
                .unwrap()
                .add_output(Binding::new(role, item));
        }

        fn resolve(&mut self, source: &TraceSnapshot) -> DerivationSet {
            let activity = self.activity;
            let mut ctx = FixupContext::new(&mut self.builder, source);
            resolve(&mut ctx, activity, ResolverOptions::default()).unwrap()
        }
    }

    #[test]
    fn routing_links_matching_outputs_only() {
        let routing = RoutingTable::new()
            .with_route("in", "out1")
            .with_route("in", "out2")
            .with_route("in", "other");
        let mut f = Fixture::new(routing);
        let input = f.item("1", Some("X"));
        let out1 = f.item("2", Some("X"));
        let out2 = f.item("3", Some("X"));
        let other = f.item("4", Some("Y"));
        f.input("in", input);
        f.output("out1", out1);
        f.output("out2", out2);
        f.output("other", other);

        let set = f.resolve(&TraceSnapshot::new());
        assert_eq!(set.inputs_of(out1), vec![input]);
        assert_eq!(set.inputs_of(out2), vec![input]);
        assert!(set.inputs_of(other).is_empty());
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.unresolved()[0].reason,
            UnresolvedReason::RoutingTypeMismatch {
                routed: vec![input]
            }
        );
    }

    #[test]
    fn single_same_type_input_is_fallback() {
        let mut f = Fixture::new(RoutingTable::new());
        let plasmid = f.item("1", Some("Plasmid"));
        let cells = f.item("2", Some("Yeast"));
        let out = f.item("3", Some("Yeast"));
        f.input("plasmid", plasmid);
        f.input("cells", cells);
        f.output("out", out);

        let set = f.resolve(&TraceSnapshot::new());
        let proposed: Vec<_> = set.iter().collect();
        assert_eq!(proposed.len(), 1);
        assert_eq!(proposed[0].input, cells);
        assert_eq!(proposed[0].origin, EdgeOrigin::SampleTypeFallback);
    }

    #[test]
    fn ambiguity_is_flagged_not_guessed() {
        let mut f = Fixture::new(RoutingTable::new());
        let a = f.item("1", Some("Yeast"));
        let b = f.item("2", Some("Yeast"));
        let out = f.item("3", Some("Yeast"));
        f.input("a", a);
        f.input("b", b);
        f.output("out", out);

        let set = f.resolve(&TraceSnapshot::new());
        assert!(set.is_empty());
        assert_eq!(
            set.unresolved()[0].reason,
            UnresolvedReason::Ambiguous {
                candidates: vec![a, b]
            }
        );
    }

    #[test]
    fn never_derives_from_itself() {
        let mut f = Fixture::new(RoutingTable::new().with_route("plate", "plate"));
        let plate = f.item("1", Some("Yeast"));
        f.input("plate", plate);
        f.output("plate", plate);

        let set = f.resolve(&TraceSnapshot::new());
        assert!(set.is_empty());
        assert_eq!(set.unresolved()[0].reason, UnresolvedReason::NoRouting);
    }

    #[test]
    fn untyped_items_match_each_other_but_not_typed_ones() {
        let mut f = Fixture::new(RoutingTable::new());
        let typed = f.item("1", Some("Yeast"));
        let untyped = f.item("2", None);
        let out = f.item("3", None);
        f.input("typed", typed);
        f.input("untyped", untyped);
        f.output("out", out);

        let set = f.resolve(&TraceSnapshot::new());
        assert_eq!(set.inputs_of(out), vec![untyped]);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let mut f = Fixture::new(RoutingTable::new());
        let input = f.item("1", Some("Yeast"));
        let out = f.item("2", Some("Yeast"));
        f.input("in", input);
        f.output("out", out);

        let activity = f.activity;
        let source = TraceSnapshot::new();
        let mut ctx = FixupContext::new(&mut f.builder, &source);
        let options = ResolverOptions {
            sample_type_fallback: false,
            ..ResolverOptions::default()
        };
        let set = resolve(&mut ctx, activity, options).unwrap();
        assert!(set.is_empty());
        assert!(set.is_unresolved(out));
    }

    #[test]
    fn part_routing_from_collection_record() {
        let well: Well = "A1".parse().unwrap();
        let mut source = TraceSnapshot::new();
        let mut part = PartRecord::at(well);
        part.sources = vec![
            SourceRef::Item(ItemId::new("100")),
            SourceRef::Part {
                collection: ItemId::new("600"),
                well,
            },
            SourceRef::Item(ItemId::new("404")),
        ];
        source.insert_item(collection_record("500", vec![part]));
        source.insert_item(collection_record("600", Vec::new()));
        source.insert_item(ItemRecord {
            is_collection: false,
            ..collection_record("100", Vec::new())
        });

        let mut f = Fixture::new(RoutingTable::new());
        let plate = f.builder.intern_collection(&ItemId::new("500")).unwrap();
        f.output("plate", plate);
        let set = f.resolve(&source);

        let a1 = f.builder.find_part(plate, well).unwrap();
        let strain = f.builder.find_item(&ItemId::new("100")).unwrap();
        let other = f.builder.find_item(&ItemId::new("600")).unwrap();
        let other_a1 = f.builder.find_part(other, well).unwrap();
        assert_eq!(set.inputs_of(a1), vec![strain, other_a1]);
        assert!(set.iter().all(|d| d.output != a1 || d.origin == EdgeOrigin::PartRouting));
        assert!(set.is_unresolved(plate));
    }

    fn collection_record(id: &str, parts: Vec<PartRecord>) -> ItemRecord {
        ItemRecord {
            id: ItemId::new(id),
            is_collection: true,
            sample: None,
            sample_type: None,
            object_type: None,
            attributes: labtrace_model::Attributes::new(),
            uploads: Vec::new(),
            parts,
        }
    }
}
