//! Upload targets picked by file name

use crate::context::FixupContext;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use labtrace_model::{AttachTarget, ItemId, NodeId};
use regex::Regex;

/// Attaches an upload to the item its file name names
///
/// Plate reader exports are named `item_<id>_...` or `item<id>_...`; when
/// that item is in the trace the upload is attached to it instead of
/// wherever the association was found. An upload that is already attached
/// is skipped rather than attached twice.
#[derive(Debug, Clone)]
pub struct FileSourcePruning {
    pattern: Regex,
}

impl FileSourcePruning {
    /// Unit name
    pub const NAME: &'static str = "file_source_pruning";

    /// Build the unit
    ///
    /// # Errors
    /// [`FixupError::Config`] if the file name pattern does not compile
    pub fn new() -> Result<Self, FixupError> {
        let pattern = Regex::new(r"item_?([0-9]+)_").map_err(|e| FixupError::Config(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Item id named in a file name
    #[must_use]
    pub fn item_in_file_name(&self, file_name: &str) -> Option<ItemId> {
        self.pattern
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| ItemId::new(m.as_str()))
    }
}

impl Fixup for FileSourcePruning {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::ATTACH
    }

    fn on_attach(
        &mut self,
        ctx: &mut FixupContext<'_>,
        association: NodeId,
        target: &mut Option<AttachTarget>,
    ) -> Result<(), FixupError> {
        let Some(node) = ctx.association(association) else {
            return Ok(());
        };
        if let Some(existing) = node.target() {
            tracing::debug!(upload = %node.upload_id(), target = %existing.node(), "upload already attached, skipping");
            *target = None;
            return Ok(());
        }
        let Some(item_id) = self.item_in_file_name(&node.file_name) else {
            return Ok(());
        };
        match ctx.find_item(&item_id) {
            Some(item) => {
                if *target != Some(AttachTarget::Item(item)) {
                    tracing::info!(upload = %node.upload_id(), file = %node.file_name, item = %item_id, "upload attached to item named in file");
                }
                *target = Some(AttachTarget::Item(item));
            }
            None => {
                tracing::warn!(upload = %node.upload_id(), file = %node.file_name, item = %item_id, "item named in file is not in the trace");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::{AssociationNode, UploadId};
    use labtrace_registry::TraceBuilder;
    use labtrace_source::TraceSnapshot;

    #[test]
    fn item_ids_in_file_names() {
        let unit = FileSourcePruning::new().unwrap();
        assert_eq!(
            unit.item_in_file_name("jid_1_item_123_0519.csv"),
            Some(ItemId::new("123"))
        );
        assert_eq!(unit.item_in_file_name("item77_gfp.csv"), Some(ItemId::new("77")));
        assert_eq!(unit.item_in_file_name("A01.fcs"), None);
    }

    #[test]
    fn redirects_to_named_item() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let plate = builder.intern_collection(&ItemId::new("123")).unwrap();
        let other = builder.intern_item(&ItemId::new("9")).unwrap();
        let upload = builder
            .intern_association(AssociationNode::new(
                UploadId::new("31"),
                "plate_reading",
                "jid_1_item_123_0519.csv",
            ))
            .unwrap();

        let mut unit = FileSourcePruning::new().unwrap();
        let mut ctx = FixupContext::new(&mut builder, &source);
        let mut target = Some(AttachTarget::Item(other));
        unit.on_attach(&mut ctx, upload, &mut target).unwrap();
        assert_eq!(target, Some(AttachTarget::Item(plate)));
    }

    #[test]
    fn attached_upload_is_skipped() {
        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let item = builder.intern_item(&ItemId::new("9")).unwrap();
        let upload = builder
            .intern_association(AssociationNode::new(UploadId::new("31"), "raw", "raw.csv"))
            .unwrap();
        builder.attach(upload, AttachTarget::Item(item)).unwrap();

        let mut unit = FileSourcePruning::new().unwrap();
        let mut ctx = FixupContext::new(&mut builder, &source);
        let mut target = Some(AttachTarget::Item(item));
        unit.on_attach(&mut ctx, upload, &mut target).unwrap();
        assert_eq!(target, None);
    }
}
