//! Standard fix-up units
//!
//! Heuristics every lab deployment needs, composed by [`standard_pipeline`]
//! in this order:
//!
//! 1. [`MeasurementTagging`]
//! 2. [`PassThroughWells`]
//! 3. [`CollectionSourceInference`]
//! 4. [`FileSourcePruning`]
//! 5. [`PartMatrixAttributes`]

mod collection_sources;
mod config;
mod file_pruning;
mod measurement;
mod part_matrix;
mod pass_through;

pub use collection_sources::CollectionSourceInference;
pub use config::StandardFixupConfig;
pub use file_pruning::FileSourcePruning;
pub use measurement::MeasurementTagging;
pub use part_matrix::PartMatrixAttributes;
pub use pass_through::PassThroughWells;

use crate::error::FixupError;
use crate::pipeline::FixupPipeline;

/// Pipeline of the standard units enabled in `config`
///
/// # Errors
/// [`FixupError::Config`] if a unit cannot be built
pub fn standard_pipeline(config: &StandardFixupConfig) -> Result<FixupPipeline, FixupError> {
    let mut pipeline = FixupPipeline::new();
    if !config.measurement_operations.is_empty() {
        pipeline.push(Box::new(MeasurementTagging::new(
            config.measurement_operations.clone(),
        )));
    }
    if !config.pass_through_operations.is_empty() {
        pipeline.push(Box::new(PassThroughWells::new(
            config.pass_through_operations.iter().cloned(),
        )));
    }
    if config.collection_source_inference {
        pipeline.push(Box::new(CollectionSourceInference));
    }
    if config.file_source_pruning {
        pipeline.push(Box::new(FileSourcePruning::new()?));
    }
    if config.part_matrix_attributes {
        pipeline.push(Box::new(PartMatrixAttributes));
    }
    tracing::debug!(units = ?pipeline.names(), "standard pipeline built");
    Ok(pipeline)
}
