use crate::analysis::lattice::{
    BoundedLattice, JoinSemiLattice, Tagged, impl_partial_ord_via_join,
};
use std::fmt::{Display, Formatter};

/// Two-point lattice for singleton types: the value is either impossible or possible.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Presence {
    #[default]
    Bottom,
    Top,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Top)
    }
}

impl JoinSemiLattice for Presence {
    fn join(&mut self, other: &Self) {
        if other.is_present() {
            *self = Presence::Top;
        }
    }
}

impl_partial_ord_via_join!(Presence);

impl BoundedLattice for Presence {
    fn top() -> Self {
        Presence::Top
    }

    fn bottom() -> Self {
        Presence::Bottom
    }
}

impl Display for Presence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Presence::Bottom => write!(f, "BOT"),
            Presence::Top => write!(f, "TOP"),
        }
    }
}

/// `null`.
pub type Null = Tagged<Presence>;
/// `undefined`.
pub type Undefined = Tagged<Presence>;
