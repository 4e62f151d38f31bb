//! Raw record adapter
//!
//! Translates platform records into the normalized records of
//! [`crate::records`]. All platform conventions live here: routing symbols,
//! completed-job selection, upload detection, and the collection matrices
//! that describe parts.

use crate::error::SourceError;
use crate::raw::{
    FieldRole, RawAssociation, RawFieldValue, RawItem, RawJob, RawJobAssociation, RawOperation,
    RawPlan, RawSample, JOB_COMPLETED,
};
use crate::records::{
    AgentRecord, ItemBinding, ItemRecord, JobRecord, OperationRecord, PartRecord, PlanRecord,
    SourceRef, UploadLink,
};
use labtrace_model::{
    Attributes, ItemId, ObjectType, OperationType, Parameter, RoutingTable, Sample, SampleType,
    UploadId, Well,
};
use serde_json::Value;

/// Wells per row when laying out an upload list
pub const UPLOADS_PER_ROW: usize = 12;

/// Split associations into attributes and upload links
///
/// Associations carrying an upload (linked or upload-shaped) become links;
/// everything else is merged into the attribute map.
#[must_use]
pub fn split_associations(associations: &[RawAssociation]) -> (Attributes, Vec<UploadLink>) {
    let mut attributes = Attributes::new();
    let mut uploads = Vec::new();
    for association in associations {
        if let Some(upload) = association.upload_id() {
            uploads.push(UploadLink {
                key: association.key.clone(),
                upload,
            });
        } else if let Some(object) = &association.object {
            attributes.merge_object(object);
        }
    }
    (attributes, uploads)
}

/// Latest completed job of an operation
#[must_use]
pub fn select_job(associations: &[RawJobAssociation]) -> Option<&RawJob> {
    associations
        .iter()
        .map(|a| &a.job)
        .filter(|job| job.pc == JOB_COMPLETED)
        .max_by_key(|job| job.updated_at)
}

/// Normalize a plan
#[must_use]
pub fn normalize_plan(raw: &RawPlan, operations: &[RawOperation]) -> PlanRecord {
    let (attributes, uploads) = split_associations(&raw.data_associations);
    PlanRecord {
        id: raw.id.clone(),
        name: raw.name.clone(),
        status: raw.status.clone(),
        operations: operations.iter().map(|op| op.id.clone()).collect(),
        attributes,
        uploads,
    }
}

fn role_order(field_value: &RawFieldValue) -> u8 {
    match field_value.role {
        FieldRole::Input => 0,
        FieldRole::Output => 1,
    }
}

fn routing_symbol(field_value: &RawFieldValue) -> Option<&str> {
    field_value
        .field_type
        .as_ref()
        .and_then(|t| t.routing.as_deref())
        .filter(|s| !s.is_empty())
}

/// Normalize an operation
///
/// Field values are taken inputs first, preserving source order within each
/// direction. Input and output fields sharing a routing symbol become the
/// declared routing of the operation type.
///
/// # Errors
/// [`SourceError::Malformed`] if a part binding has an invalid well
pub fn normalize_operation(raw: &RawOperation) -> Result<OperationRecord, SourceError> {
    let mut field_values: Vec<&RawFieldValue> = raw.field_values.iter().collect();
    field_values.sort_by_key(|fv| role_order(fv));

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut parameters = Vec::new();
    let mut input_symbols = Vec::new();
    let mut output_symbols = Vec::new();

    for fv in field_values {
        let Some(item) = &fv.child_item_id else {
            if fv.role == FieldRole::Input {
                parameters.push(Parameter {
                    role: fv.name.clone(),
                    value: fv.value.clone().unwrap_or(Value::Null),
                });
            }
            continue;
        };

        let well = match (fv.row, fv.column) {
            (Some(row), Some(column)) => Some(Well::new(row, column).map_err(|e| {
                SourceError::malformed(format!("operation {} field {}", raw.id, fv.name), e)
            })?),
            _ => None,
        };
        let binding = ItemBinding {
            role: fv.name.clone(),
            item: item.clone(),
            well,
        };
        let symbol = routing_symbol(fv);
        match fv.role {
            FieldRole::Input => {
                if let Some(symbol) = symbol {
                    input_symbols.push((fv.name.as_str(), symbol));
                }
                inputs.push(binding);
            }
            FieldRole::Output => {
                if let Some(symbol) = symbol {
                    output_symbols.push((fv.name.as_str(), symbol));
                }
                outputs.push(binding);
            }
        }
    }

    let routing = RoutingTable::from_shared_symbols(input_symbols, output_symbols);
    let job = select_job(&raw.job_associations).map(|job| JobRecord {
        id: job.id.clone(),
        started_at: job.start_time,
        ended_at: job.end_time,
        agent: job.user.as_ref().map(|user| AgentRecord {
            id: user.id.clone(),
            name: user.login.clone(),
        }),
    });
    if job.is_none() {
        tracing::debug!(operation = %raw.id, "no completed job");
    }

    let (attributes, uploads) = split_associations(&raw.data_associations);
    Ok(OperationRecord {
        id: raw.id.clone(),
        plan: raw.plan_id.clone(),
        operation_type: OperationType {
            name: raw.operation_type.name.clone(),
            category: raw.operation_type.category.clone(),
            routing,
        },
        inputs,
        outputs,
        parameters,
        job,
        attributes,
        uploads,
    })
}

fn sample_of(raw: &RawSample) -> (Sample, Option<SampleType>) {
    (
        Sample {
            id: raw.id.to_string(),
            name: raw.name.clone(),
        },
        raw.sample_type.as_ref().map(|t| SampleType::new(&t.name)),
    )
}

fn object_type_of(raw: &RawItem) -> Option<ObjectType> {
    raw.object_type.as_ref().map(|o| ObjectType {
        id: o.id.to_string(),
        name: o.name.clone(),
    })
}

/// Normalize an item or collection
///
/// Parts of a collection are gathered, in order, from its part associations,
/// the sample matrix, the routing matrix and the upload matrix.
#[must_use]
pub fn normalize_item(raw: &RawItem) -> ItemRecord {
    let (attributes, uploads) = split_associations(&raw.data_associations);
    let (sample, sample_type) = raw.sample.as_ref().map(sample_of).unzip();

    let mut parts = PartTable::default();
    if raw.is_collection() {
        parts.collect_part_associations(raw);
        parts.collect_sample_matrix(raw);
        if let Some(rows) = routing_matrix(&attributes) {
            parts.collect_routing(&raw.id, rows);
        }
        parts.collect_upload_matrix(&attributes);
    }

    ItemRecord {
        id: raw.id.clone(),
        is_collection: raw.is_collection(),
        sample,
        sample_type: sample_type.flatten(),
        object_type: object_type_of(raw),
        attributes,
        uploads,
        parts: parts.into_sorted(),
    }
}

/// Routing rows of a collection, if it carries any
///
/// Looks for `routing_matrix` and `routing_dilution_matrix` (both shaped
/// `{"rows": [...]}`) and then for a bare `part_data` matrix.
#[must_use]
pub fn routing_matrix(attributes: &Attributes) -> Option<&[Value]> {
    for key in ["routing_matrix", "routing_dilution_matrix"] {
        if let Some(value) = attributes.get(key) {
            return value.get("rows").and_then(Value::as_array).map(Vec::as_slice);
        }
    }
    attributes
        .get("part_data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Source id of a routing entry
///
/// The source is either a plain id string or a list of `{"id": ...}`
/// objects, of which the first is used.
#[must_use]
pub fn routing_source(entry: &Value) -> Option<String> {
    match entry.get("source")? {
        Value::Array(list) => list.first()?.get("id").and_then(id_text),
        other => id_text(other),
    }
}

/// Parse a routing source id
///
/// Accepted forms:
/// - `item_id`
/// - `item_id/well` (the well may be `[[row, column]]`)
/// - `object_type/item_id/sample_id/well`, used for items whose subparts are
///   not modelled; the assembler falls back to the item when it is not a
///   collection
#[must_use]
pub fn parse_source_ref(source: &str) -> Option<SourceRef> {
    let components: Vec<&str> = source.split('/').collect();
    let (item, well) = if source.starts_with(|c: char| c.is_ascii_digit()) {
        match components.as_slice() {
            [item] => (*item, None),
            [item, well] => (*item, Some(*well)),
            _ => {
                tracing::warn!(source, "unrecognized source id");
                return None;
            }
        }
    } else if let [_, item, _, well] = components.as_slice() {
        (*item, Some(*well))
    } else {
        tracing::warn!(source, "unrecognized source id");
        return None;
    };

    let item = ItemId::new(item);
    match well.map(str::parse::<Well>) {
        None => Some(SourceRef::Item(item)),
        Some(Ok(well)) => Some(SourceRef::Part {
            collection: item,
            well,
        }),
        Some(Err(e)) => {
            tracing::warn!(source, error = %e, "bad well in source id, using item");
            Some(SourceRef::Item(item))
        }
    }
}

/// Upload ids laid out by well, with the association key they came from
///
/// `SAMPLE_UPLOADs` carries an explicit `upload_matrix`. The older
/// `SAMPLE_uploads` is a flat list of uploads, laid out by file name,
/// [`UPLOADS_PER_ROW`] to a row.
#[must_use]
pub fn upload_matrix(attributes: &Attributes) -> Option<(&'static str, Vec<Vec<Option<UploadId>>>)> {
    if let Some(value) = attributes.get("SAMPLE_UPLOADs") {
        let rows = value.get("upload_matrix").and_then(Value::as_array)?;
        let matrix = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(upload_cell).collect())
                    .unwrap_or_default()
            })
            .collect();
        return Some(("SAMPLE_UPLOADs", matrix));
    }

    let list = attributes.get("SAMPLE_uploads").and_then(Value::as_array)?;
    let mut uploads: Vec<(&str, Option<UploadId>)> = list
        .iter()
        .map(|upload| {
            let name = upload
                .get("upload_file_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (name, upload.get("id").and_then(upload_cell))
        })
        .collect();
    uploads.sort_by(|a, b| a.0.cmp(b.0));
    let matrix = uploads
        .chunks(UPLOADS_PER_ROW)
        .map(|row| row.iter().map(|(_, id)| id.clone()).collect())
        .collect();
    Some(("SAMPLE_uploads", matrix))
}

fn upload_cell(value: &Value) -> Option<UploadId> {
    match value {
        Value::Number(n) if n.as_i64().is_some_and(|n| n > 0) => Some(UploadId::new(n.to_string())),
        Value::String(s) if !s.is_empty() => Some(UploadId::new(s.clone())),
        _ => None,
    }
}

fn well_at(i: usize, j: usize) -> Option<Well> {
    let row = u16::try_from(i).ok()?;
    let column = u16::try_from(j).ok()?;
    match Well::new(row, column) {
        Ok(well) => Some(well),
        Err(e) => {
            tracing::warn!(row = i, column = j, error = %e, "matrix position has no well");
            None
        }
    }
}

/// Parts of a collection under construction, keyed by well
#[derive(Debug, Default)]
struct PartTable {
    parts: Vec<PartRecord>,
}

impl PartTable {
    fn entry(&mut self, well: Well) -> &mut PartRecord {
        let index = match self.parts.iter().position(|p| p.well == well) {
            Some(index) => index,
            None => {
                self.parts.push(PartRecord::at(well));
                self.parts.len() - 1
            }
        };
        &mut self.parts[index]
    }

    fn collect_part_associations(&mut self, collection: &RawItem) {
        for association in &collection.part_associations {
            if association.collection_id != collection.id {
                tracing::warn!(
                    collection = %collection.id,
                    association = %association.collection_id,
                    "part association names another collection"
                );
                continue;
            }
            let well = match Well::new(association.row, association.column) {
                Ok(well) => well,
                Err(e) => {
                    tracing::warn!(part = %association.part_id, error = %e, "part has no well");
                    continue;
                }
            };

            let part = self.entry(well);
            part.part_id = Some(association.part_id.clone());
            if let Some(raw) = &association.part {
                let (attributes, uploads) = split_associations(&raw.data_associations);
                if let Some((sample, sample_type)) = raw.sample.as_ref().map(sample_of) {
                    part.sample = Some(sample);
                    part.sample_type = sample_type;
                }
                part.object_type = object_type_of(raw);
                part.attributes.extend(&attributes);
                part.uploads.extend(uploads);
            }
        }
    }

    fn collect_sample_matrix(&mut self, collection: &RawItem) {
        for (i, row) in collection.matrix.iter().enumerate() {
            for (j, sample_id) in row.iter().enumerate() {
                if *sample_id <= 0 {
                    continue;
                }
                let Some(well) = well_at(i, j) else { continue };
                let part = self.entry(well);
                if part.sample.is_none() {
                    part.sample = Some(Sample {
                        id: sample_id.to_string(),
                        name: None,
                    });
                }
            }
        }
    }

    fn collect_routing(&mut self, collection: &ItemId, rows: &[Value]) {
        for (i, row) in rows.iter().enumerate() {
            let Some(cells) = row.as_array() else { continue };
            for (j, entry) in cells.iter().enumerate() {
                if !entry.is_object() {
                    continue;
                }
                let Some(source) = routing_source(entry) else {
                    continue;
                };
                let Some(well) = well_at(i, j) else { continue };

                let part = self.entry(well);
                if let Some(source_ref) = parse_source_ref(&source) {
                    if matches!(source_ref, SourceRef::Item(_)) {
                        part.attributes
                            .insert("source_reference", Value::String(source.clone()));
                    }
                    if !part.sources.contains(&source_ref) {
                        part.sources.push(source_ref);
                    }
                }
                if let Some(attributes) = entry.get("attributes") {
                    part.attributes.merge_object(attributes);
                }
                tracing::debug!(%collection, %well, %source, "routing entry");
            }
        }
    }

    fn collect_upload_matrix(&mut self, attributes: &Attributes) {
        let Some((key, matrix)) = upload_matrix(attributes) else {
            return;
        };
        for (i, row) in matrix.into_iter().enumerate() {
            for (j, upload) in row.into_iter().enumerate() {
                let Some(upload) = upload else { continue };
                let Some(well) = well_at(i, j) else { continue };
                let part = self.entry(well);
                if !part.uploads.iter().any(|u| u.upload == upload) {
                    part.uploads.push(UploadLink {
                        key: key.to_string(),
                        upload,
                    });
                }
            }
        }
    }

    fn into_sorted(mut self) -> Vec<PartRecord> {
        self.parts.sort_by_key(|p| p.well);
        self.parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn well(s: &str) -> Well {
        s.parse().unwrap()
    }

    fn operation(value: Value) -> RawOperation {
        serde_json::from_value(value).unwrap()
    }

    fn job(id: u64, pc: i64, updated: &str) -> Value {
        json!({ "job": { "id": id, "pc": pc, "updated_at": updated,
                         "user": { "id": 4, "login": "tech" } } })
    }

    #[test]
    fn latest_completed_job_is_selected() {
        let op = operation(json!({
            "id": 1, "plan_id": 9,
            "operation_type": { "name": "Mix" },
            "job_associations": [
                job(10, -2, "2019-01-01T00:00:00Z"),
                job(11, -2, "2019-02-01T00:00:00Z"),
                job(12, 3, "2019-03-01T00:00:00Z")
            ]
        }));
        let record = normalize_operation(&op).unwrap();
        let job = record.job.unwrap();
        assert_eq!(job.id.as_str(), "11");
        assert_eq!(job.agent.unwrap().name, "tech");
    }

    #[test]
    fn shared_routing_symbols_become_routes() {
        let op = operation(json!({
            "id": 1, "plan_id": 9,
            "operation_type": { "name": "Mix" },
            "field_values": [
                { "name": "mix", "role": "output", "child_item_id": 3,
                  "field_type": { "routing": "M" } },
                { "name": "one", "role": "input", "child_item_id": 1,
                  "field_type": { "routing": "M" } },
                { "name": "two", "role": "input", "child_item_id": 2,
                  "field_type": { "routing": "M" } },
                { "name": "volume", "role": "input", "value": 5 }
            ]
        }));
        let record = normalize_operation(&op).unwrap();
        let roles: Vec<_> = record.inputs.iter().map(|b| b.role.as_str()).collect();
        assert_eq!(roles, vec!["one", "two"]);
        assert_eq!(record.outputs[0].item, ItemId::new("3"));
        assert_eq!(record.operation_type.routing.inputs_for("mix"), vec!["one", "two"]);
        assert_eq!(record.parameters.len(), 1);
        assert_eq!(record.parameters[0].value, json!(5));
    }

    #[test]
    fn part_bindings_carry_wells() {
        let op = operation(json!({
            "id": 1, "plan_id": 9,
            "operation_type": { "name": "Pick" },
            "field_values": [
                { "name": "plate", "role": "input", "child_item_id": 50, "row": 1, "column": 2 }
            ]
        }));
        let record = normalize_operation(&op).unwrap();
        assert_eq!(record.inputs[0].well, Some(well("B3")));
    }

    #[test]
    fn last_column_is_malformed() {
        let op = operation(json!({
            "id": 1, "plan_id": 9,
            "operation_type": { "name": "Pick" },
            "field_values": [
                { "name": "plate", "role": "input", "child_item_id": 50, "row": 0, "column": 65535 }
            ]
        }));
        let err = normalize_operation(&op).unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }), "{err}");
    }

    #[test]
    fn source_id_forms() {
        assert_eq!(parse_source_ref("123"), Some(SourceRef::Item(ItemId::new("123"))));
        assert_eq!(
            parse_source_ref("123/B2"),
            Some(SourceRef::Part {
                collection: ItemId::new("123"),
                well: well("B2")
            })
        );
        assert_eq!(
            parse_source_ref("123/[[1, 1]]"),
            Some(SourceRef::Part {
                collection: ItemId::new("123"),
                well: well("B2")
            })
        );
        assert_eq!(
            parse_source_ref("Yeast Plate/77/1234/C1"),
            Some(SourceRef::Part {
                collection: ItemId::new("77"),
                well: well("C1")
            })
        );
        assert_eq!(parse_source_ref("garbage"), None);
    }

    #[test]
    fn routing_source_accepts_lists() {
        assert_eq!(routing_source(&json!({ "source": [{ "id": 5 }] })), Some("5".to_string()));
        assert_eq!(routing_source(&json!({ "source": "5/A1" })), Some("5/A1".to_string()));
        assert_eq!(routing_source(&json!({ "attributes": {} })), None);
    }

    #[test]
    fn collection_parts_from_routing_matrix() {
        let raw: RawItem = serde_json::from_value(json!({
            "id": 500,
            "data_associations": [{
                "key": "routing_matrix",
                "object": { "routing_matrix": { "rows": [
                    [ { "source": "100", "attributes": { "od": 0.5 } }, null ],
                    [ null, { "source": "200/[[0, 1]]" } ]
                ] } }
            }]
        }))
        .unwrap();
        let record = normalize_item(&raw);
        assert!(record.is_collection);
        assert_eq!(record.parts.len(), 2);

        let a1 = record.part(well("A1")).unwrap();
        assert_eq!(a1.sources, vec![SourceRef::Item(ItemId::new("100"))]);
        assert_eq!(a1.attributes.get("od"), Some(&json!(0.5)));
        assert_eq!(a1.attributes.get("source_reference"), Some(&json!("100")));

        let b2 = record.part(well("B2")).unwrap();
        assert_eq!(
            b2.sources,
            vec![SourceRef::Part {
                collection: ItemId::new("200"),
                well: well("A2")
            }]
        );
    }

    #[test]
    fn part_data_matrix_is_accepted() {
        let raw: RawItem = serde_json::from_value(json!({
            "id": 500,
            "data_associations": [{
                "key": "part_data",
                "object": { "part_data": [[ { "source": [{ "id": 7 }] } ]] }
            }]
        }))
        .unwrap();
        let record = normalize_item(&raw);
        assert_eq!(record.parts[0].sources, vec![SourceRef::Item(ItemId::new("7"))]);
    }

    #[test]
    fn upload_list_is_laid_out_by_file_name() {
        let uploads: Vec<Value> = (0..14)
            .rev()
            .map(|i| json!({ "id": 100 + i, "upload_file_name": format!("f{i:02}.fcs") }))
            .collect();
        let mut attributes = Attributes::new();
        attributes.insert("SAMPLE_uploads", Value::Array(uploads));
        let (key, matrix) = upload_matrix(&attributes).unwrap();
        assert_eq!(key, "SAMPLE_uploads");
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].len(), 12);
        assert_eq!(matrix[0][0], Some(UploadId::new("100")));
        assert_eq!(matrix[1][1], Some(UploadId::new("113")));
    }

    #[test]
    fn upload_matrix_skips_empty_wells() {
        let mut attributes = Attributes::new();
        attributes.insert(
            "SAMPLE_UPLOADs",
            json!({ "upload_matrix": [[5, -1], [0, 6]] }),
        );
        let (_, matrix) = upload_matrix(&attributes).unwrap();
        assert_eq!(matrix, vec![vec![Some(UploadId::new("5")), None], vec![None, Some(UploadId::new("6"))]]);
    }

    #[test]
    fn part_associations_and_sample_matrix() {
        let raw: RawItem = serde_json::from_value(json!({
            "id": 500,
            "matrix": [[11, -1], [12, 0]],
            "part_associations": [{
                "part_id": 900, "collection_id": 500, "row": 0, "column": 0,
                "part": { "id": 900,
                          "sample": { "id": 11, "name": "pUC19",
                                      "sample_type": { "name": "Plasmid" } },
                          "data_associations": [
                              { "key": "note", "object": { "note": "ok" } }
                          ] }
            }]
        }))
        .unwrap();
        let record = normalize_item(&raw);
        assert_eq!(record.parts.len(), 2);
        let a1 = record.part(well("A1")).unwrap();
        assert_eq!(a1.part_id, Some(ItemId::new("900")));
        assert_eq!(a1.sample_type, Some(SampleType::new("Plasmid")));
        assert_eq!(a1.attributes.get("note"), Some(&json!("ok")));
        let b1 = record.part(well("B1")).unwrap();
        assert_eq!(b1.sample.as_ref().unwrap().id, "12");
        assert!(b1.part_id.is_none());
    }
}
