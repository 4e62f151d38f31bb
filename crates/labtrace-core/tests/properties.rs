//! Graph invariants over generated traces

use labtrace_core::assemble;
use labtrace_fixup::FixupPipeline;
use labtrace_model::{EdgeKind, Node, OperationId, PlanId};
use labtrace_test_utils::{OperationFixture, TraceFixture};
use proptest::prelude::*;

const TYPES: [Option<&str>; 3] = [Some("Yeast"), Some("Plasmid"), None];

#[derive(Debug, Clone)]
struct Step {
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    routed: bool,
}

fn step(items: usize) -> impl Strategy<Value = Step> {
    (
        proptest::collection::vec(0..items, 0..4),
        proptest::collection::vec(0..items, 1..3),
        any::<bool>(),
    )
        .prop_map(|(inputs, outputs, routed)| Step {
            inputs,
            outputs,
            routed,
        })
}

fn trace() -> impl Strategy<Value = (Vec<usize>, Vec<Step>)> {
    (2..8usize).prop_flat_map(|items| {
        (
            proptest::collection::vec(0..TYPES.len(), items),
            proptest::collection::vec(step(items), 1..6),
        )
    })
}

fn build(types: &[usize], steps: &[Step]) -> labtrace_source::TraceSnapshot {
    let mut fixture = TraceFixture::new();
    for (i, t) in types.iter().enumerate() {
        fixture = fixture.item(&i.to_string(), TYPES[*t]);
    }
    for (n, step) in steps.iter().enumerate() {
        let mut op = OperationFixture::new(&(100 + n).to_string(), "Step");
        for (k, input) in step.inputs.iter().enumerate() {
            op = op.input(&format!("in{k}"), &input.to_string());
        }
        for (k, output) in step.outputs.iter().enumerate() {
            op = op.output(&format!("out{k}"), &output.to_string());
            if step.routed {
                for j in 0..step.inputs.len() {
                    op = op.route(&format!("in{j}"), &format!("out{k}"));
                }
            }
        }
        fixture = fixture.operation(op);
    }
    fixture.build()
}

proptest! {
    /// Tenet: assembled graphs are closed, free of self-derivation, and stable
    #[test]
    fn prop_assembled_graph_is_well_formed((types, steps) in trace()) {
        let snapshot = build(&types, &steps);
        let plans = [PlanId::new("1")];

        let graph = assemble(&snapshot, &plans, &mut FixupPipeline::new()).unwrap();

        for edge in graph.edges() {
            prop_assert!(graph.node(edge.from).is_some());
            prop_assert!(graph.node(edge.to).is_some());
            if edge.kind == EdgeKind::Derivation {
                prop_assert_ne!(edge.from, edge.to);
            }
        }

        for n in 0..steps.len() {
            prop_assert!(graph.activity(&OperationId::new((100 + n).to_string())).is_some());
        }
        let activities = graph.iter().filter(|(_, node)| matches!(node, Node::Activity(_))).count();
        prop_assert_eq!(activities, steps.len());

        for unresolved in graph.unresolved() {
            prop_assert!(graph.generated_by(unresolved.output).contains(&unresolved.activity));
        }

        let again = assemble(&snapshot, &plans, &mut FixupPipeline::new()).unwrap();
        prop_assert_eq!(graph.fingerprint(), again.fingerprint());
    }
}
