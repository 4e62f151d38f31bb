//! Registry errors

use labtrace_model::{ModelError, Namespace, NodeKind, StableKey};

/// Errors raised while interning or linking nodes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Key already interned under a different kind, or factory produced the
    /// wrong kind
    #[error("key conflict on {namespace:?}/{key}: existing {existing}, requested {requested}")]
    KeyConflict {
        /// Key namespace
        namespace: Namespace,
        /// Conflicting key
        key: StableKey,
        /// Kind already interned (or produced by the factory)
        existing: NodeKind,
        /// Kind the caller declared
        requested: NodeKind,
    },

    /// Factory produced a node with a different key than declared
    #[error("factory for {declared} produced node keyed {produced}")]
    FactoryKey {
        /// Key passed to `intern`
        declared: StableKey,
        /// Key of the produced node
        produced: StableKey,
    },

    /// Model invariant violated
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RegistryError {
    /// Whether the error is caused by inconsistent source data
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        match self {
            Self::KeyConflict { .. } => true,
            Self::FactoryKey { .. } => false,
            Self::Model(e) => e.is_data_error(),
        }
    }
}
