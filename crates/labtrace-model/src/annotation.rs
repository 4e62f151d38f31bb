//! Graph annotations
//!
//! Findings that are recorded on the graph instead of failing the pass.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Why no derivation edge was produced for an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// No declared routing and no input shares the output's sample type
    NoRouting,
    /// No declared routing and several inputs share the output's sample type
    Ambiguous {
        /// Competing input items
        candidates: Vec<NodeId>,
    },
    /// Declared routing exists but the routed inputs have a different type
    RoutingTypeMismatch {
        /// Routed input items that were rejected
        routed: Vec<NodeId>,
    },
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRouting => f.write_str("no routing"),
            Self::Ambiguous { candidates } => {
                write!(f, "ambiguous ({} candidates)", candidates.len())
            }
            Self::RoutingTypeMismatch { routed } => {
                write!(f, "routing/type mismatch ({} routed inputs)", routed.len())
            }
        }
    }
}

/// An output item the resolver could not link to an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedDerivation {
    /// Activity that generated the output
    pub activity: NodeId,
    /// Output item
    pub output: NodeId,
    /// Output role name
    pub role: String,
    /// Why resolution failed
    pub reason: UnresolvedReason,
}

/// Structural anomaly found while freezing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anomaly {
    /// Derivation edges form a cycle through these items
    DerivationCycle {
        /// Items in the strongly connected component
        items: Vec<NodeId>,
    },
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DerivationCycle { items } => {
                write!(f, "derivation cycle through {} items", items.len())
            }
        }
    }
}
