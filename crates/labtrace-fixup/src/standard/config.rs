//! Configuration of the standard units

use indexmap::IndexMap;
use labtrace_model::Attributes;
use serde::{Deserialize, Serialize};

/// Which standard units run, and with what
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardFixupConfig {
    /// Operation types whose output collections keep the input layout
    pub pass_through_operations: Vec<String>,
    /// Measurement operation types and the attributes to tag them with
    pub measurement_operations: IndexMap<String, Attributes>,
    /// Attach uploads to the item named in their file name
    pub file_source_pruning: bool,
    /// Spread `_mat` collection attributes onto parts
    pub part_matrix_attributes: bool,
    /// Derive unresolved collections from their parts' sources
    pub collection_source_inference: bool,
}

impl Default for StandardFixupConfig {
    fn default() -> Self {
        Self {
            pass_through_operations: Vec::new(),
            measurement_operations: IndexMap::new(),
            file_source_pruning: true,
            part_matrix_attributes: true,
            collection_source_inference: true,
        }
    }
}

impl StandardFixupConfig {
    /// Builder: add a pass-through operation type
    #[must_use]
    pub fn with_pass_through(mut self, operation_type: impl Into<String>) -> Self {
        self.pass_through_operations.push(operation_type.into());
        self
    }

    /// Builder: add a measurement operation type
    #[must_use]
    pub fn with_measurement(mut self, operation_type: impl Into<String>, attributes: Attributes) -> Self {
        self.measurement_operations
            .insert(operation_type.into(), attributes);
        self
    }

    /// Builder: toggle file-source pruning
    #[must_use]
    pub fn with_file_source_pruning(mut self, enabled: bool) -> Self {
        self.file_source_pruning = enabled;
        self
    }

    /// Builder: toggle part matrix attributes
    #[must_use]
    pub fn with_part_matrix_attributes(mut self, enabled: bool) -> Self {
        self.part_matrix_attributes = enabled;
        self
    }

    /// Builder: toggle collection source inference
    #[must_use]
    pub fn with_collection_source_inference(mut self, enabled: bool) -> Self {
        self.collection_source_inference = enabled;
        self
    }

    /// Disable every unit
    #[must_use]
    pub fn none() -> Self {
        Self {
            file_source_pruning: false,
            part_matrix_attributes: false,
            collection_source_inference: false,
            ..Self::default()
        }
    }
}
