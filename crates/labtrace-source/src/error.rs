//! Source errors

/// Errors raised while fetching or normalizing raw records
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Referenced record does not exist on the platform
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind (`plan`, `item`, ...)
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Record could not be normalized
    #[error("malformed {context}: {reason}")]
    Malformed {
        /// Where the problem was found
        context: String,
        /// What is wrong
        reason: String,
    },

    /// JSON decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote session failure
    #[error("session error: {0}")]
    Session(#[from] anyhow::Error),
}

impl SourceError {
    /// Record not found
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Malformed record
    #[must_use]
    pub fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the fetch could help
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}
