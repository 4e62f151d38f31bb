//! Provenance relations

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Relation kind
///
/// Direction follows PROV: the edge points from the dependent node to what
/// it depends on, except for the activity-centric `Usage` and `Generation`
/// which both start at the activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// `Activity → Item`: activity used item
    Usage,
    /// `Activity → Item`: item was generated by activity
    Generation,
    /// `Item(output) → Item(input)`: output was derived from input
    Derivation,
    /// `Activity → Agent`: activity was associated with agent
    Attribution,
    /// `Item(part) → Item(collection)`: part is a member of collection
    Membership,
    /// `DataAssociation → Item | Activity`
    Attachment,
}

impl EdgeKind {
    /// Lowercase label used in logs and fingerprints
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Usage => "used",
            Self::Generation => "wasGeneratedBy",
            Self::Derivation => "wasDerivedFrom",
            Self::Attribution => "wasAssociatedWith",
            Self::Membership => "hadMember",
            Self::Attachment => "attachedTo",
        }
    }
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a derivation edge came about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrigin {
    /// Read directly from the source (usage, generation, membership, ...)
    Source,
    /// Operation-type declared routing
    DeclaredRouting,
    /// Single input sharing the output's sample type
    SampleTypeFallback,
    /// Part-level routing data on a collection
    PartRouting,
    /// Added by the named fix-up unit
    Fixup(String),
}

impl EdgeOrigin {
    /// Whether the edge is a heuristic guess
    #[inline]
    #[must_use]
    pub fn is_heuristic(&self) -> bool {
        matches!(self, Self::SampleTypeFallback | Self::Fixup(_))
    }
}

impl Display for EdgeOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::DeclaredRouting => f.write_str("routing"),
            Self::SampleTypeFallback => f.write_str("sample-type"),
            Self::PartRouting => f.write_str("part-routing"),
            Self::Fixup(unit) => write!(f, "fixup:{unit}"),
        }
    }
}

/// Directed relation between two interned nodes
///
/// Equality and hashing ignore [`EdgeOrigin`]: an edge is identified by
/// `(kind, from, to)` and the first origin recorded wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Relation kind
    pub kind: EdgeKind,
    /// Dependent endpoint
    pub from: NodeId,
    /// Depended-on endpoint
    pub to: NodeId,
    /// Provenance of the edge itself
    pub origin: EdgeOrigin,
}

impl Edge {
    /// Create edge
    #[inline]
    #[must_use]
    pub fn new(kind: EdgeKind, from: NodeId, to: NodeId, origin: EdgeOrigin) -> Self {
        Self {
            kind,
            from,
            to,
            origin,
        }
    }

    /// Edge read from the source
    #[inline]
    #[must_use]
    pub fn sourced(kind: EdgeKind, from: NodeId, to: NodeId) -> Self {
        Self::new(kind, from, to, EdgeOrigin::Source)
    }

    /// Derivation `output → input`
    #[inline]
    #[must_use]
    pub fn derivation(output: NodeId, input: NodeId, origin: EdgeOrigin) -> Self {
        Self::new(EdgeKind::Derivation, output, input, origin)
    }

    /// Identity triple
    #[inline]
    #[must_use]
    pub const fn key(&self) -> (EdgeKind, NodeId, NodeId) {
        (self.kind, self.from, self.to)
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
