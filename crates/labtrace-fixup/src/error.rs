//! Fix-up errors

use labtrace_registry::RegistryError;

/// Errors raised by fix-up units and the context they work through
#[derive(Debug, thiserror::Error)]
pub enum FixupError {
    /// A record the unit needs is absent from the source
    #[error("{kind} {id} not in source")]
    MissingRecord {
        /// Record kind (`item`, `upload`, ...)
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Registry or model invariant violated
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Unit could not be built from its configuration
    #[error("invalid fix-up configuration: {0}")]
    Config(String),

    /// Failure inside a named unit
    #[error("fix-up {unit} failed: {source}")]
    Unit {
        /// Unit name
        unit: String,
        /// Underlying failure
        source: Box<FixupError>,
    },

    /// Failure of a third-party unit
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FixupError {
    /// Record missing from the source
    #[must_use]
    pub fn missing(kind: &'static str, id: impl ToString) -> Self {
        Self::MissingRecord {
            kind,
            id: id.to_string(),
        }
    }

    /// Attribute the error to a unit; an error already attributed keeps its
    /// innermost unit
    #[must_use]
    pub fn in_unit(self, unit: &str) -> Self {
        match self {
            err @ Self::Unit { .. } => err,
            err => Self::Unit {
                unit: unit.to_string(),
                source: Box::new(err),
            },
        }
    }

    /// Name of the failing unit, if known
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Unit { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Whether the failure comes from the trace data rather than the code
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::MissingRecord { .. } => true,
            Self::Registry(err) => err.is_data_error(),
            Self::Unit { source, .. } => source.is_data_error(),
            Self::Config(_) | Self::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_unit_keeps_innermost_name() {
        let err = FixupError::missing("item", 7).in_unit("inner").in_unit("outer");
        assert_eq!(err.unit(), Some("inner"));
        assert!(err.is_data_error());
        assert_eq!(err.to_string(), "fix-up inner failed: item 7 not in source");
    }

    #[test]
    fn third_party_errors_are_not_data_errors() {
        let err = FixupError::from(anyhow::anyhow!("boom")).in_unit("custom");
        assert!(!err.is_data_error());
    }
}
