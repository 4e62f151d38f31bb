//! Platform dump to provenance graph

use labtrace_core::{TraceAssembler, TraceConfig};
use labtrace_fixup::standard::standard_pipeline;
use labtrace_model::{EdgeKind, EdgeOrigin, ItemId, OperationId, PlanId, Well};
use labtrace_source::{InMemorySession, SnapshotLoader};
use labtrace_test_utils::init_tracing;
use pretty_assertions::assert_eq;

const DUMP: &str = r#"{
  "plans": [
    { "id": 1, "name": "growth", "status": "done" }
  ],
  "operations": [
    { "id": 10, "plan_id": 1,
      "operation_type": { "name": "Plate Cells", "category": "Yeast" },
      "field_values": [
        { "name": "Strain", "role": "input", "child_item_id": 100,
          "field_type": { "routing": "S" } },
        { "name": "Plate", "role": "output", "child_item_id": 500 }
      ],
      "job_associations": [
        { "job": { "id": 70, "pc": -2, "updated_at": "2019-05-01T10:00:00Z",
                   "start_time": "2019-05-01T09:00:00Z",
                   "user": { "id": 4, "login": "tech" } } }
      ] }
  ],
  "items": [
    { "id": 100, "sample": { "id": 7, "name": "W303",
                             "sample_type": { "name": "Yeast Strain" } } },
    { "id": 500,
      "object_type": { "id": 3, "name": "96 Deep Well Plate" },
      "data_associations": [
        { "key": "routing_matrix",
          "object": { "routing_matrix": { "rows": [[ { "source": "100" }, null ]] } } },
        { "key": "plate_reading",
          "object": { "plate_reading": { "id": 31, "job_id": 70,
            "created_at": "x", "updated_at": "x", "upload_updated_at": "x",
            "upload_content_type": "text/csv", "upload_file_name": "od.csv",
            "upload_file_size": 120 } } }
      ] }
  ],
  "uploads": [
    { "id": 31, "upload_file_name": "od.csv", "upload_file_size": 120, "job_id": 70 }
  ]
}"#;

/// Tenet: a loaded snapshot assembles into a complete trace
#[tokio::test]
async fn dump_assembles_into_trace() {
    init_tracing();
    let plans = [PlanId::new("1")];
    let session = InMemorySession::from_json_str(DUMP).unwrap();
    let snapshot = SnapshotLoader::new(&session).load(&plans).await.unwrap();

    let config = TraceConfig::from_toml_str("lab = \"example_lab\"\n").unwrap();
    let mut fixups = standard_pipeline(&config.fixups).unwrap();
    let graph = TraceAssembler::new(&snapshot)
        .with_config(config)
        .assemble(&plans, &mut fixups)
        .unwrap();

    let strain = graph.item_id(&ItemId::new("100")).unwrap();
    let plate = graph.item_id(&ItemId::new("500")).unwrap();
    let a1: Well = "A1".parse().unwrap();
    let part = graph.part_id(&ItemId::new("500"), a1).unwrap();

    assert_eq!(graph.derived_from(part), vec![strain]);
    assert_eq!(graph.derived_from(plate), vec![strain]);
    let origins: Vec<&EdgeOrigin> = graph
        .outgoing(plate)
        .filter(|e| e.kind == EdgeKind::Derivation)
        .map(|e| &e.origin)
        .collect();
    assert_eq!(
        origins,
        vec![&EdgeOrigin::Fixup("collection_source_inference".into())]
    );

    let activity = graph.activity(&OperationId::new("10")).unwrap();
    assert_eq!(activity.job.as_ref().map(|j| j.as_str()), Some("70"));
    assert_eq!(graph.agent(&"4".into()).unwrap().name, "tech");

    let reading = graph.association(&"31".into()).unwrap();
    assert_eq!(reading.file_name, "od.csv");
    assert_eq!(reading.target().map(|t| t.node()), Some(plate));

    assert_eq!(graph.inputs(), vec![strain]);
    assert!(graph.unresolved().is_empty());
    assert!(graph.anomalies().is_empty());
    assert_eq!(
        graph.plan(&PlanId::new("1")).unwrap().attributes.get("lab").unwrap(),
        "example_lab"
    );
}
