//! Derivations proposed for one activity
//!
//! The resolver fills a [`DerivationSet`]; `after_resolve` units edit it; the
//! assembler commits what is left. Nothing here touches the builder.

use labtrace_model::{EdgeOrigin, NodeId, UnresolvedDerivation};

/// A derivation `output → input` not yet committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedDerivation {
    /// Derived item
    pub output: NodeId,
    /// Item it was derived from
    pub input: NodeId,
    /// Why the edge exists
    pub origin: EdgeOrigin,
}

/// Candidate derivations and unresolved outputs of one activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationSet {
    activity: NodeId,
    edges: Vec<ProposedDerivation>,
    unresolved: Vec<UnresolvedDerivation>,
}

impl DerivationSet {
    /// Empty set for an activity
    #[inline]
    #[must_use]
    pub fn new(activity: NodeId) -> Self {
        Self {
            activity,
            edges: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Activity the derivations belong to
    #[inline]
    #[must_use]
    pub fn activity(&self) -> NodeId {
        self.activity
    }

    /// Propose `output → input`; returns `false` if already proposed
    pub fn add(&mut self, output: NodeId, input: NodeId, origin: EdgeOrigin) -> bool {
        if self.contains(output, input) {
            return false;
        }
        self.edges.push(ProposedDerivation {
            output,
            input,
            origin,
        });
        true
    }

    /// Withdraw `output → input`; returns `false` if it was not proposed
    pub fn remove(&mut self, output: NodeId, input: NodeId) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|d| !(d.output == output && d.input == input));
        self.edges.len() != before
    }

    /// Replace `output → from` with `output → to`
    ///
    /// Returns `false` and changes nothing if `output → from` was not
    /// proposed.
    pub fn redirect(&mut self, output: NodeId, from: NodeId, to: NodeId, origin: EdgeOrigin) -> bool {
        if !self.remove(output, from) {
            return false;
        }
        self.add(output, to, origin);
        true
    }

    /// Keep only derivations matching a predicate
    pub fn retain(&mut self, f: impl FnMut(&ProposedDerivation) -> bool) {
        self.edges.retain(f);
    }

    /// Whether `output → input` is proposed
    #[must_use]
    pub fn contains(&self, output: NodeId, input: NodeId) -> bool {
        self.edges
            .iter()
            .any(|d| d.output == output && d.input == input)
    }

    /// Proposed derivations in proposal order
    pub fn iter(&self) -> impl Iterator<Item = &ProposedDerivation> {
        self.edges.iter()
    }

    /// Inputs proposed for an output
    #[must_use]
    pub fn inputs_of(&self, output: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|d| d.output == output)
            .map(|d| d.input)
            .collect()
    }

    /// Number of proposed derivations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether nothing is proposed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Record an output the resolver could not link
    pub fn mark_unresolved(&mut self, unresolved: UnresolvedDerivation) {
        if !self.unresolved.iter().any(|u| u.output == unresolved.output) {
            self.unresolved.push(unresolved);
        }
    }

    /// Outputs marked unresolved, including ones a unit has since linked
    #[inline]
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedDerivation] {
        &self.unresolved
    }

    /// Whether an output is marked unresolved and still has no proposal
    #[must_use]
    pub fn is_unresolved(&self, output: NodeId) -> bool {
        self.unresolved.iter().any(|u| u.output == output) && !self.has_proposal(output)
    }

    fn has_proposal(&self, output: NodeId) -> bool {
        self.edges.iter().any(|d| d.output == output)
    }

    /// Split into derivations to commit and outputs that stay unresolved
    #[must_use]
    pub fn into_parts(self) -> (Vec<ProposedDerivation>, Vec<UnresolvedDerivation>) {
        let unresolved = self
            .unresolved
            .iter()
            .filter(|u| !self.has_proposal(u.output))
            .cloned()
            .collect();
        (self.edges, unresolved)
    }
}
