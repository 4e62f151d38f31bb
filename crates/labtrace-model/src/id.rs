//! Identifiers
//!
//! Source-side identifiers ([`ItemId`], [`OperationId`], ...) are opaque
//! strings as handed out by the lab platform. [`NodeId`] is the arena index
//! of an interned node and only has meaning within one trace.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{self, Display, Formatter};

/// Platform ids arrive as JSON numbers or strings
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

macro_rules! source_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }

        impl $name {
            /// Create identifier from any string-like value
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as string slice
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value.to_string())
            }
        }
    };
}

source_id!(
    /// Identifier of an item or collection on the lab platform
    ItemId
);
source_id!(
    /// Identifier of an executed operation
    OperationId
);
source_id!(
    /// Identifier of a plan (a set of operations run together)
    PlanId
);
source_id!(
    /// Identifier of an uploaded file
    UploadId
);
source_id!(
    /// Identifier of the person or account a job ran under
    AgentId
);
source_id!(
    /// Identifier of a job (a batch execution of operations)
    JobId
);

/// Arena index of an interned node
///
/// Stable for the lifetime of one trace. Two lookups of the same stable key
/// within a pass always return the same `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Create from raw arena index
    // Traces hold far fewer than u32::MAX nodes.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Raw arena index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Key under which a node is deduplicated
///
/// Items use the item id, parts use `collection/well`, activities the
/// operation id, associations the upload id, agents the agent id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableKey(String);

impl StableKey {
    /// Create key from string
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ItemId> for StableKey {
    fn from(value: &ItemId) -> Self {
        Self(value.as_str().to_string())
    }
}

impl From<&OperationId> for StableKey {
    fn from(value: &OperationId) -> Self {
        Self(value.as_str().to_string())
    }
}

impl From<&UploadId> for StableKey {
    fn from(value: &UploadId) -> Self {
        Self(value.as_str().to_string())
    }
}

impl From<&AgentId> for StableKey {
    fn from(value: &AgentId) -> Self {
        Self(value.as_str().to_string())
    }
}

/// Key space a stable key lives in
///
/// Keys only collide within a namespace: item `42` and operation `42` are
/// different nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Items, collections and parts
    Entity,
    /// Operation activities
    Activity,
    /// Uploaded files and measurements
    Association,
    /// People and accounts
    Agent,
}

/// Declared kind of an interned node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Whole item
    Item,
    /// Collection of addressable parts
    Collection,
    /// Part of a collection
    Part,
    /// Executed operation
    Activity,
    /// File or measurement attached to an item or activity
    DataAssociation,
    /// Person or account
    Agent,
}

impl NodeKind {
    /// Namespace the kind's keys are deduplicated in
    #[inline]
    #[must_use]
    pub const fn namespace(self) -> Namespace {
        match self {
            Self::Item | Self::Collection | Self::Part => Namespace::Entity,
            Self::Activity => Namespace::Activity,
            Self::DataAssociation => Namespace::Association,
            Self::Agent => Namespace::Agent,
        }
    }

    /// Whether the kind is an item-like entity
    #[inline]
    #[must_use]
    pub const fn is_entity(self) -> bool {
        matches!(self.namespace(), Namespace::Entity)
    }

    /// Lowercase label used in logs and fingerprints
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Collection => "collection",
            Self::Part => "part",
            Self::Activity => "activity",
            Self::DataAssociation => "association",
            Self::Agent => "agent",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_from_numbers_and_strings_agree() {
        assert_eq!(ItemId::from(42u64), ItemId::new("42"));
        assert_eq!(OperationId::from("7").as_str(), "7");
    }

    #[test]
    fn entity_kinds_share_namespace() {
        assert_eq!(NodeKind::Item.namespace(), NodeKind::Collection.namespace());
        assert_eq!(NodeKind::Part.namespace(), Namespace::Entity);
        assert_ne!(NodeKind::Activity.namespace(), Namespace::Entity);
        assert!(NodeKind::Part.is_entity());
        assert!(!NodeKind::Agent.is_entity());
    }

    #[test]
    fn node_id_roundtrips_index() {
        let id = NodeId::from_index(12);
        assert_eq!(id.index(), 12);
        assert_eq!(id.to_string(), "n12");
    }

    #[test]
    fn ids_deserialize_from_numbers() {
        let id: ItemId = serde_json::from_str("101").unwrap();
        assert_eq!(id, ItemId::new("101"));
        let id: ItemId = serde_json::from_str("\"101\"").unwrap();
        assert_eq!(id.as_str(), "101");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ItemId::new("101")).unwrap();
        assert_eq!(json, "\"101\"");
    }
}
