//! Trace errors
//!
//! Every variant aborts the pass: no partial graph is returned.

use crate::config::ConfigError;
use labtrace_fixup::FixupError;
use labtrace_model::{ModelError, PlanId};
use labtrace_registry::RegistryError;
use labtrace_source::SourceError;

/// Errors raised while assembling a trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// No plan was requested
    #[error("no plans requested")]
    NoPlans,

    /// A requested plan is unknown or has no operations
    #[error("plan {plan} has no activities")]
    EmptyTrace {
        /// Offending plan
        plan: PlanId,
    },

    /// A record referenced by the trace is absent from the source
    #[error("{kind} {id} is referenced by the trace but missing from the source")]
    MissingRecord {
        /// Record kind (`item`, `upload`, ...)
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Identity or model invariant violated
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A fix-up unit failed
    #[error("fix-up {unit} failed: {source}")]
    Fixup {
        /// Failing unit
        unit: String,
        /// What went wrong
        source: FixupError,
    },

    /// Loading records failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<FixupError> for TraceError {
    fn from(err: FixupError) -> Self {
        match err {
            FixupError::MissingRecord { kind, id } => Self::MissingRecord { kind, id },
            FixupError::Registry(err) => Self::Registry(err),
            FixupError::Unit { unit, source } => Self::Fixup {
                unit,
                source: *source,
            },
            err => Self::Fixup {
                unit: "pipeline".to_string(),
                source: err,
            },
        }
    }
}

impl From<ModelError> for TraceError {
    fn from(err: ModelError) -> Self {
        Self::Registry(err.into())
    }
}

impl TraceError {
    /// Whether the pass cannot be retried as is
    ///
    /// Only transient session failures while loading are worth retrying.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Source(err) if err.is_transient())
    }

    /// Whether the failure comes from the trace data rather than the code or
    /// configuration
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::EmptyTrace { .. } | Self::MissingRecord { .. } => true,
            Self::Registry(err) => err.is_data_error(),
            Self::Fixup { source, .. } => source.is_data_error(),
            Self::Source(err) => !err.is_transient(),
            Self::NoPlans | Self::Config(_) => false,
        }
    }

    /// Underlying model invariant violation, if any
    #[must_use]
    pub fn model_error(&self) -> Option<&ModelError> {
        let registry = match self {
            Self::Registry(err) => err,
            Self::Fixup {
                source: FixupError::Registry(err),
                ..
            } => err,
            _ => return None,
        };
        match registry {
            RegistryError::Model(err) => Some(err),
            _ => None,
        }
    }
}
