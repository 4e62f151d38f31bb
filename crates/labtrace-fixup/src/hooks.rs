//! Hook capability sets

use std::fmt::{self, Display, Formatter};
use std::ops::BitOr;

/// Extension points a unit implements
///
/// The pipeline only calls a unit at the hooks it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HookSet(u8);

impl HookSet {
    /// No hooks
    pub const NONE: Self = Self(0);
    /// Before the resolver runs for an activity
    pub const BEFORE_RESOLVE: Self = Self(1);
    /// After the resolver proposed an activity's derivations
    pub const AFTER_RESOLVE: Self = Self(1 << 1);
    /// When a new item, collection or part is interned
    pub const ITEM_INTERNED: Self = Self(1 << 2);
    /// Before a data association is attached
    pub const ATTACH: Self = Self(1 << 3);
    /// Every hook
    pub const ALL: Self = Self(0b1111);

    /// Whether every hook in `other` is present
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Hooks in either set
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether no hook is present
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HookSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl Display for HookSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::BEFORE_RESOLVE, "before_resolve"),
            (Self::AFTER_RESOLVE, "after_resolve"),
            (Self::ITEM_INTERNED, "on_item_interned"),
            (Self::ATTACH, "on_attach"),
        ];
        let present: Vec<&str> = names
            .iter()
            .filter(|(hook, _)| self.contains(*hook))
            .map(|(_, name)| *name)
            .collect();
        if present.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&present.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_contains() {
        let set = HookSet::BEFORE_RESOLVE | HookSet::ATTACH;
        assert!(set.contains(HookSet::ATTACH));
        assert!(!set.contains(HookSet::AFTER_RESOLVE));
        assert!(HookSet::ALL.contains(set));
        assert!(set.contains(HookSet::NONE));
        assert!(HookSet::NONE.is_empty());
    }

    #[test]
    fn display_lists_hooks() {
        assert_eq!(HookSet::NONE.to_string(), "none");
        assert_eq!(
            (HookSet::AFTER_RESOLVE | HookSet::ITEM_INTERNED).to_string(),
            "after_resolve|on_item_interned"
        );
    }
}
