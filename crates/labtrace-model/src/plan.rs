//! Plans

use crate::attributes::Attributes;
use crate::id::{NodeId, PlanId};
use serde::{Deserialize, Serialize};

/// A set of operations run together
///
/// Plans group activities but are not graph nodes themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Platform plan id
    pub id: PlanId,
    /// Plan name
    pub name: String,
    /// Platform status (e.g. `done`)
    pub status: Option<String>,
    /// Activities in construction order
    pub activities: Vec<NodeId>,
    /// Descriptive attributes
    pub attributes: Attributes,
}

impl Plan {
    /// Plan with no activities yet
    #[must_use]
    pub fn new(id: PlanId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: None,
            activities: Vec::new(),
            attributes: Attributes::new(),
        }
    }
}
