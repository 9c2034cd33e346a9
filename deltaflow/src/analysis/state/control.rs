use crate::analysis::lattice::{Change, JoinSemiLattice, impl_partial_ord_via_join};
use deltaflow_js::{Expr, NodeId};
use std::collections::BTreeSet;

/// Changed branch conditions that hold on the current path.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ControlCondition {
    pub conditions: BTreeSet<NodeId>,
    /// Changed conditions of sibling branches, known not to hold.
    pub negated: BTreeSet<NodeId>,
}

impl ControlCondition {
    /// Take the edge guarded by `condition`, leaving the edges guarded by `siblings` untaken.
    ///
    /// Conditions are only cancelled by their negation at a [join](JoinSemiLattice::join).
    pub fn update<'a, I>(&self, condition: Option<&Expr>, siblings: I) -> Self
    where
        I: IntoIterator<Item = &'a Expr> + Clone,
    {
        let mut next = self.clone();
        if let Some(cond) = condition
            && Change::conv(cond.change) == Change::Changed
        {
            next.conditions.insert(cond.id);
            next.negated.extend(siblings.clone().into_iter().map(|s| s.id));
        }
        next.negated.extend(
            siblings
                .into_iter()
                .filter(|s| Change::conv(s.change) == Change::Changed)
                .map(|s| s.id),
        );
        next
    }

    fn normalize(&mut self) {
        let negated = &self.negated;
        self.conditions.retain(|c| !negated.contains(c));
    }

    pub fn is_changed(&self) -> bool {
        !self.conditions.is_empty()
    }
}

impl JoinSemiLattice for ControlCondition {
    fn join(&mut self, other: &Self) {
        self.conditions.extend(other.conditions.iter().copied());
        self.negated.extend(other.negated.iter().copied());
        self.normalize();
    }
}

impl_partial_ord_via_join!(ControlCondition);

/// Changed call sites one level up the call chain.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ControlCall {
    pub calls: BTreeSet<NodeId>,
}

impl JoinSemiLattice for ControlCall {
    fn join(&mut self, other: &Self) {
        self.calls.extend(other.calls.iter().copied());
    }
}

impl_partial_ord_via_join!(ControlCall);

/// Control dependence: why the current statement may execute differently in the new version.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Control {
    pub condition: ControlCondition,
    pub call: ControlCall,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_edge<'a, I>(&self, condition: Option<&Expr>, siblings: I) -> Self
    where
        I: IntoIterator<Item = &'a Expr> + Clone,
    {
        Self {
            condition: self.condition.update(condition, siblings),
            call: self.call.clone(),
        }
    }

    /// The control seen by a callee invoked from `call`: the caller's conditions, plus the call
    /// site itself when it changed.
    pub fn for_call(&self, call: &Expr) -> Self {
        let mut calls = ControlCall::default();
        if Change::conv(call.change) == Change::Changed {
            calls.calls.insert(call.id);
        }
        Self {
            condition: self.condition.clone(),
            call: calls,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.condition.is_changed() || !self.call.calls.is_empty()
    }

    /// The change tag implied by control dependence alone.
    pub fn change(&self) -> Change {
        if self.is_changed() {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }
}

impl JoinSemiLattice for Control {
    fn join(&mut self, other: &Self) {
        self.condition.join(&other.condition);
        self.call.join(&other.call);
    }
}

impl_partial_ord_via_join!(Control);
