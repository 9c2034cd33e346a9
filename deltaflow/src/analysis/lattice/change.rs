use crate::analysis::lattice::{BoundedLattice, JoinSemiLattice};
use deltaflow_js::ChangeType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Whether a fact differs between the two program versions.
///
/// ```text
///        Top
///       /   \
///  Changed  Unchanged
///       \   /
///       Bottom
/// ```
///
/// `Top` means the fact is changed on some paths reaching the current point and
/// unchanged on others.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Change {
    #[default]
    Bottom,
    Unchanged,
    Changed,
    Top,
}

impl Change {
    /// Classify an AST node: inserted, removed and updated nodes are changed.
    pub fn conv(change: ChangeType) -> Self {
        if change.is_changed() {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }

    pub fn u() -> Self {
        Change::Unchanged
    }

    pub fn c() -> Self {
        Change::Changed
    }

    /// `Changed` or `Top`: the fact may differ on at least one path.
    pub fn may_change(&self) -> bool {
        matches!(self, Change::Changed | Change::Top)
    }
}

impl JoinSemiLattice for Change {
    fn join(&mut self, other: &Self) {
        *self = match (*self, *other) {
            (l, r) if l == r => l,
            (Change::Bottom, r) => r,
            (l, Change::Bottom) => l,
            _ => Change::Top,
        }
    }
}

impl BoundedLattice for Change {
    fn top() -> Self {
        Change::Top
    }

    fn bottom() -> Self {
        Change::Bottom
    }
}

impl PartialOrd for Change {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Change::*;
        match (self, other) {
            (a, b) if a == b => Some(Ordering::Equal),
            (Bottom, _) | (_, Top) => Some(Ordering::Less),
            (_, Bottom) | (Top, _) => Some(Ordering::Greater),
            _ => None,
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Bottom => write!(f, "BOT"),
            Change::Unchanged => write!(f, "U"),
            Change::Changed => write!(f, "C"),
            Change::Top => write!(f, "TOP"),
        }
    }
}
