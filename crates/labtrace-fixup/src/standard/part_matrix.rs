//! Part matrices copied onto part attributes

use crate::context::FixupContext;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use labtrace_model::NodeId;
use serde_json::Value;

/// Spreads per-well matrices on a collection onto its parts
///
/// A collection attribute `<name>_mat` holding rows of cells gives each part
/// the cell at its well under `<name>`. Null cells are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartMatrixAttributes;

impl PartMatrixAttributes {
    /// Unit name
    pub const NAME: &'static str = "part_matrix_attributes";
}

impl Fixup for PartMatrixAttributes {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::ITEM_INTERNED
    }

    fn on_item_interned(
        &mut self,
        ctx: &mut FixupContext<'_>,
        item: NodeId,
    ) -> Result<(), FixupError> {
        let Some(part) = ctx.item(item) else {
            return Ok(());
        };
        let (Some(collection), Some(well)) = (part.collection_node(), part.well()) else {
            return Ok(());
        };
        let Some(collection) = ctx.item(collection) else {
            return Ok(());
        };

        let cells: Vec<(String, Value)> = collection
            .attributes
            .iter()
            .filter_map(|(key, matrix)| {
                let name = key.strip_suffix("_mat")?;
                let cell = matrix
                    .get(usize::from(well.row()))?
                    .get(usize::from(well.column()))?;
                Some((name.to_string(), cell.clone()))
            })
            .collect();

        if let Some(part) = ctx.item_mut(item) {
            for (name, cell) in cells {
                part.attributes.insert(name, cell);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{ItemId, Well};
    use labtrace_registry::TraceBuilder;
    use labtrace_source::TraceSnapshot;
    use serde_json::json;

    #[test]
    fn parts_take_their_cell() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let plate = builder.intern_collection(&ItemId::new("500")).unwrap();
        builder
            .registry_mut()
            .item_mut(plate)
            .unwrap()
            .attributes
            .insert("media_mat", json!([["SC", null], ["YPAD", "SC"]]));
        let b1 = builder.intern_part(plate, "B1".parse::<Well>().unwrap(), None).unwrap();
        let a2 = builder.intern_part(plate, "A2".parse::<Well>().unwrap(), None).unwrap();

        let mut ctx = FixupContext::new(&mut builder, &source);
        PartMatrixAttributes.on_item_interned(&mut ctx, b1).unwrap();
        PartMatrixAttributes.on_item_interned(&mut ctx, a2).unwrap();
        PartMatrixAttributes.on_item_interned(&mut ctx, plate).unwrap();

        assert_eq!(ctx.item(b1).unwrap().attributes.get("media"), Some(&json!("YPAD")));
        assert!(ctx.item(a2).unwrap().attributes.is_empty());
        assert!(!ctx.item(plate).unwrap().attributes.contains("media"));
    }
}
