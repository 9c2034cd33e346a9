use crate::analysis::lattice::{
    BoundedLattice, JoinSemiLattice, Tagged, impl_partial_ord_via_join,
};
use std::fmt::{Display, Formatter};

/// Abstract booleans: the flat lattice over `true` and `false`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BoolLattice {
    #[default]
    Bottom,
    True,
    False,
    Top,
}

impl BoolLattice {
    pub fn exact(b: bool) -> Self {
        if b { BoolLattice::True } else { BoolLattice::False }
    }

    pub fn may_be_true(&self) -> bool {
        matches!(self, BoolLattice::True | BoolLattice::Top)
    }

    pub fn may_be_false(&self) -> bool {
        matches!(self, BoolLattice::False | BoolLattice::Top)
    }

    /// Keep only the `true` part.
    pub fn truthy_part(&self) -> Self {
        if self.may_be_true() {
            BoolLattice::True
        } else {
            BoolLattice::Bottom
        }
    }

    /// Keep only the `false` part.
    pub fn falsey_part(&self) -> Self {
        if self.may_be_false() {
            BoolLattice::False
        } else {
            BoolLattice::Bottom
        }
    }
}

impl JoinSemiLattice for BoolLattice {
    fn join(&mut self, other: &Self) {
        *self = match (*self, *other) {
            (l, r) if l == r => l,
            (BoolLattice::Bottom, r) => r,
            (l, BoolLattice::Bottom) => l,
            _ => BoolLattice::Top,
        }
    }
}

impl_partial_ord_via_join!(BoolLattice);

impl BoundedLattice for BoolLattice {
    fn top() -> Self {
        BoolLattice::Top
    }

    fn bottom() -> Self {
        BoolLattice::Bottom
    }
}

impl Display for BoolLattice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoolLattice::Bottom => write!(f, "BOT"),
            BoolLattice::True => write!(f, "true"),
            BoolLattice::False => write!(f, "false"),
            BoolLattice::Top => write!(f, "TOP"),
        }
    }
}

pub type Bool = Tagged<BoolLattice>;
