//! Measurement operations tagged on their activities

use crate::context::FixupContext;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use indexmap::IndexMap;
use labtrace_model::{Attributes, NodeId};
use serde_json::Value;

/// Tags activities of measurement operation types
///
/// Sets `measurement_operation = true` plus the attributes configured for
/// the operation type.
#[derive(Debug, Clone, Default)]
pub struct MeasurementTagging {
    operations: IndexMap<String, Attributes>,
}

impl MeasurementTagging {
    /// Unit name
    pub const NAME: &'static str = "measurement_tagging";

    /// Tag the given operation types
    #[must_use]
    pub fn new(operations: IndexMap<String, Attributes>) -> Self {
        Self { operations }
    }
}

impl Fixup for MeasurementTagging {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn hooks(&self) -> HookSet {
        HookSet::BEFORE_RESOLVE
    }

    fn before_resolve(
        &mut self,
        ctx: &mut FixupContext<'_>,
        activity: NodeId,
    ) -> Result<(), FixupError> {
        let Some(node) = ctx.activity_mut(activity) else {
            return Ok(());
        };
        let Some(attributes) = self.operations.get(&node.operation_type.name) else {
            return Ok(());
        };
        node.attributes
            .insert("measurement_operation", Value::Bool(true));
        node.attributes.extend(attributes);
        tracing::debug!(activity = %activity, operation_type = %node.operation_type.name, "measurement tagged");
        Ok(())
    }
}
