pub mod change;
pub mod tagged;

use std::cmp::Ordering;
use std::ops::{Add, AddAssign};

pub use change::Change;
pub use tagged::Tagged;

pub trait JoinSemiLattice: Eq + PartialOrd {
    fn join(&mut self, other: &Self);

    /// Non-mutating join.
    fn joined(&self, other: &Self) -> Self
    where
        Self: Clone,
    {
        let mut out = self.clone();
        out.join(other);
        out
    }
}

/// A join semi-lattice with distinguished greatest and least elements.
///
/// `bottom` is the identity of `join` and `top` absorbs every element.
pub trait BoundedLattice: JoinSemiLattice + Sized {
    fn top() -> Self;
    fn bottom() -> Self;

    fn is_top(&self) -> bool {
        *self == Self::top()
    }

    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }
}

impl<S1, S2> JoinSemiLattice for (S1, S2)
where
    S1: JoinSemiLattice,
    S2: JoinSemiLattice,
{
    fn join(&mut self, other: &Self) {
        self.0.join(&other.0);
        self.1.join(&other.1);
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MergeOutcome {
    NoOp,
    Merged,
}

impl MergeOutcome {
    pub fn merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged)
    }
}

impl Add for MergeOutcome {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::NoOp, Self::NoOp) => Self::NoOp,
            _ => Self::Merged,
        }
    }
}

impl AddAssign for MergeOutcome {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

/// Join `other` into `target`, reporting whether `target` grew.
pub fn merge_join<T: JoinSemiLattice + Clone>(target: &mut T, other: &T) -> MergeOutcome {
    let before = target.clone();
    target.join(other);
    if *target == before {
        MergeOutcome::NoOp
    } else {
        MergeOutcome::Merged
    }
}

/// Derive the lattice order from `join`: `a <= b` iff `a ⊔ b == b`.
pub fn order_by_join<T: JoinSemiLattice + Clone>(a: &T, b: &T) -> Option<Ordering> {
    if a == b {
        return Some(Ordering::Equal);
    }
    let joined = a.joined(b);
    if &joined == b {
        Some(Ordering::Less)
    } else if &joined == a {
        Some(Ordering::Greater)
    } else {
        None
    }
}

/// Implement `PartialOrd` for a lattice type by delegating to [order_by_join].
macro_rules! impl_partial_ord_via_join {
    ($ty:ty) => {
        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                $crate::analysis::lattice::order_by_join(self, other)
            }
        }
    };
}

pub(crate) use impl_partial_ord_via_join;
