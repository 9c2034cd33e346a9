use crate::analysis::lattice::{BoundedLattice, Change, JoinSemiLattice, order_by_join};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A lattice element paired with its own [Change] tag.
///
/// The two components join independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tagged<L> {
    pub value: L,
    pub change: Change,
}

impl<L> Tagged<L> {
    pub fn new(value: L, change: Change) -> Self {
        Self { value, change }
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.change = change;
        self
    }
}

impl<L: JoinSemiLattice + Clone> JoinSemiLattice for Tagged<L> {
    fn join(&mut self, other: &Self) {
        self.value.join(&other.value);
        self.change.join(&other.change);
    }
}

impl<L: JoinSemiLattice + Clone> PartialOrd for Tagged<L> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        order_by_join(self, other)
    }
}

impl<L: BoundedLattice + Clone> BoundedLattice for Tagged<L> {
    fn top() -> Self {
        Self::new(L::top(), Change::Top)
    }

    fn bottom() -> Self {
        Self::new(L::bottom(), Change::Bottom)
    }
}

impl<L: Display> Display for Tagged<L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.value, self.change)
    }
}

impl<L: BoundedLattice> Tagged<L> {
    /// The top element of `L` carrying `change`.
    pub fn top_with(change: Change) -> Self {
        Self::new(L::top(), change)
    }

    /// The bottom element of `L` carrying `change`.
    pub fn bottom_with(change: Change) -> Self {
        Self::new(L::bottom(), change)
    }
}
