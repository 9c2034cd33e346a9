use crate::analysis::lattice::{JoinSemiLattice, impl_partial_ord_via_join};
use deltaflow_js::NodeId;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// The AST nodes that contributed to a value.
///
/// Join is set union and the empty set is bottom. There is no top element.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct DefinerIds(BTreeSet<NodeId>);

impl DefinerIds {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(id: NodeId) -> Self {
        Self(BTreeSet::from([id]))
    }

    pub fn insert(&mut self, id: NodeId) {
        self.0.insert(id);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }
}

impl FromIterator<NodeId> for DefinerIds {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl JoinSemiLattice for DefinerIds {
    fn join(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }
}

impl_partial_ord_via_join!(DefinerIds);

impl Display for DefinerIds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().join(","))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::lattice::laws;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    pub fn any_definers() -> impl Strategy<Value = DefinerIds> {
        btree_set(0i32..12, 0..4).prop_map(|s| s.into_iter().map(NodeId).collect())
    }

    #[test]
    fn union_and_display() {
        let mut a = DefinerIds::single(NodeId(3));
        a.join(&DefinerIds::single(NodeId(1)));
        assert_eq!(a.to_string(), "{1,3}");
        assert!(DefinerIds::empty() < a);
    }

    proptest! {
        #[test]
        fn definer_laws(a in any_definers(), b in any_definers(), c in any_definers()) {
            laws::check(&a, &b, &c);
        }
    }
}
