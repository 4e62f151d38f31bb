//! Loading a snapshot from a saved platform dump

use labtrace_model::{ItemId, PlanId, Well};
use labtrace_source::{InMemorySession, RecordSource, SnapshotLoader, SourceRef};
use pretty_assertions::assert_eq;

const DUMP: &str = r#"{
  "plans": [
    { "id": 1, "name": "growth", "status": "done",
      "data_associations": [
        { "key": "experiment", "object": { "experiment": "NOR gate" } }
      ] }
  ],
  "operations": [
    { "id": 10, "plan_id": 1,
      "operation_type": { "name": "Inoculate", "category": "Yeast" },
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

/// Tenet: a dump round-trips into a complete, normalized snapshot
#[tokio::test]
async fn dump_loads_into_snapshot() {
    let session = InMemorySession::from_json_str(DUMP).unwrap();
    let snapshot = SnapshotLoader::new(&session)
        .load(&[PlanId::new("1")])
        .await
        .unwrap();

    let plan = snapshot.plan(&PlanId::new("1")).unwrap();
    assert_eq!(plan.attributes.get("experiment").unwrap(), "NOR gate");

    let ops = snapshot.operations(&PlanId::new("1"));
    assert_eq!(ops.len(), 1);
    let job = ops[0].job.as_ref().unwrap();
    assert_eq!(job.id.as_str(), "70");
    assert_eq!(job.agent.as_ref().unwrap().name, "tech");

    let plate = snapshot.item(&ItemId::new("500")).unwrap();
    assert!(plate.is_collection);
    assert_eq!(plate.uploads.len(), 1);
    assert_eq!(plate.uploads[0].key, "plate_reading");
    let a1: Well = "A1".parse().unwrap();
    assert_eq!(
        plate.part(a1).unwrap().sources,
        vec![SourceRef::Item(ItemId::new("100"))]
    );

    assert!(snapshot.upload(&"31".into()).is_some());
}

/// Tenet: a saved snapshot decodes to the same records
#[tokio::test]
async fn snapshot_json_roundtrip() {
    let session = InMemorySession::from_json_str(DUMP).unwrap();
    let snapshot = SnapshotLoader::new(&session)
        .load(&[PlanId::new("1")])
        .await
        .unwrap();
    let json = snapshot.to_json().unwrap();
    let decoded = labtrace_source::TraceSnapshot::from_json_str(&json).unwrap();
    assert_eq!(decoded, snapshot);
}
