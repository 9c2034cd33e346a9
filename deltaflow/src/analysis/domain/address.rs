use crate::analysis::lattice::{
    BoundedLattice, JoinSemiLattice, Tagged, impl_partial_ord_via_join,
};
use internment::Intern;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// Maximum number of concrete addresses an [AddressLattice] tracks before widening to `Top`.
pub const MAX_ADDRESSES: usize = 10;

/// Program point used for builtin objects and their property cells.
pub const BUILTIN_POINT: i32 = i32::MIN;

/// An interned identifier or property name.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Name(Intern<String>);

impl Name {
    pub fn new(s: &str) -> Self {
        Self(Intern::new(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

impl From<&String> for Name {
    fn from(value: &String) -> Self {
        Name::new(value)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The internal class tag of an object.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum JsClass {
    #[default]
    Object,
    Function,
    Array,
    Arguments,
    Error,
    Builtin,
}

/// Pre-allocated builtin locations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Builtin {
    /// The cell holding the value of `this` at script level.
    GlobalBinding,
    Global,
    Arguments,
    Object,
    ObjectProto,
    Function,
    FunctionProto,
}

/// An abstract memory location.
///
/// Addresses are derived by a [Trace](crate::analysis::state::trace::Trace) from the program
/// point at which they were created, the allocation site (an AST node id) and a
/// disambiguating property name. The class tag separates a function object from the variable
/// cell created at the same site.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub point: i32,
    pub site: i32,
    pub prop: Name,
    pub class: Option<JsClass>,
}

impl Address {
    pub fn new(point: i32, site: i32, prop: Name) -> Self {
        Self {
            point,
            site,
            prop,
            class: None,
        }
    }

    /// The location of a builtin object (or, for [Builtin::GlobalBinding], value cell).
    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(BUILTIN_POINT, builtin as i32, Name::new(""))
    }

    /// The value cell of property `prop` on builtin object `owner`.
    pub fn builtin_prop(owner: Builtin, prop: &str) -> Self {
        Self::new(BUILTIN_POINT, owner as i32, Name::new(prop))
    }

    /// The native function object stored in property `prop` of builtin `owner`.
    pub fn builtin_native(owner: Builtin, prop: &str) -> Self {
        Self::builtin_prop(owner, prop).with_class(JsClass::Builtin)
    }

    pub fn with_class(mut self, class: JsClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn is_builtin(&self) -> bool {
        self.point == BUILTIN_POINT
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_builtin() {
            write!(f, "@builtin:{}", self.site)?;
        } else {
            write!(f, "@{}:{}", self.point, self.site)?;
        }
        if !self.prop.is_empty() {
            write!(f, ".{}", self.prop)?;
        }
        if let Some(class) = self.class {
            write!(f, "<{class:?}>")?;
        }
        Ok(())
    }
}

/// A bounded set of addresses, widened to `Top` once it exceeds [MAX_ADDRESSES].
///
/// The empty set is the bottom element: the value does not point anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressLattice {
    Set(BTreeSet<Address>),
    Top,
}

impl AddressLattice {
    pub fn single(addr: Address) -> Self {
        AddressLattice::Set(BTreeSet::from([addr]))
    }

    /// Build a set, widening when it is too large.
    pub fn from_set(set: BTreeSet<Address>) -> Self {
        if set.len() > MAX_ADDRESSES {
            AddressLattice::Top
        } else {
            AddressLattice::Set(set)
        }
    }

    /// The tracked addresses; empty for `Top`.
    pub fn iter(&self) -> impl Iterator<Item = &Address> + '_ {
        let set = match self {
            AddressLattice::Set(s) => Some(s),
            AddressLattice::Top => None,
        };
        set.into_iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AddressLattice::Set(s) if s.is_empty())
    }

    pub fn len(&self) -> usize {
        match self {
            AddressLattice::Set(s) => s.len(),
            AddressLattice::Top => 0,
        }
    }

    pub fn contains(&self, addr: &Address) -> bool {
        match self {
            AddressLattice::Set(s) => s.contains(addr),
            AddressLattice::Top => true,
        }
    }

    /// The single address, if the set has exactly one.
    pub fn singleton(&self) -> Option<Address> {
        match self {
            AddressLattice::Set(s) if s.len() == 1 => s.iter().next().copied(),
            _ => None,
        }
    }

    /// Keep only addresses also in `other`.
    pub fn retain_all(&self, other: &AddressLattice) -> Self {
        match (self, other) {
            (AddressLattice::Top, o) => o.clone(),
            (s, AddressLattice::Top) => s.clone(),
            (AddressLattice::Set(a), AddressLattice::Set(b)) => {
                AddressLattice::Set(a.intersection(b).copied().collect())
            }
        }
    }

    /// Drop the addresses in `other`. `Top` cannot be refined.
    pub fn remove_all(&self, other: &AddressLattice) -> Self {
        match (self, other) {
            (AddressLattice::Set(a), AddressLattice::Set(b)) => {
                AddressLattice::Set(a.difference(b).copied().collect())
            }
            (AddressLattice::Set(_), AddressLattice::Top) => AddressLattice::bottom(),
            (AddressLattice::Top, _) => AddressLattice::Top,
        }
    }
}

impl JoinSemiLattice for AddressLattice {
    fn join(&mut self, other: &Self) {
        match (&mut *self, other) {
            (AddressLattice::Top, _) => {}
            (_, AddressLattice::Top) => *self = AddressLattice::Top,
            (AddressLattice::Set(a), AddressLattice::Set(b)) => {
                a.extend(b.iter().copied());
                if a.len() > MAX_ADDRESSES {
                    *self = AddressLattice::Top;
                }
            }
        }
    }
}

impl_partial_ord_via_join!(AddressLattice);

impl BoundedLattice for AddressLattice {
    fn top() -> Self {
        AddressLattice::Top
    }

    fn bottom() -> Self {
        AddressLattice::Set(BTreeSet::new())
    }
}

impl Display for AddressLattice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressLattice::Top => write!(f, "Addr:TOP"),
            AddressLattice::Set(s) if s.is_empty() => write!(f, "Addr:BOT"),
            AddressLattice::Set(s) => write!(f, "Addrs:{{{}}}", s.iter().join(",")),
        }
    }
}

pub type Addresses = Tagged<AddressLattice>;

impl Addresses {
    pub fn of(addr: Address, change: crate::analysis::lattice::Change) -> Self {
        Addresses::new(AddressLattice::single(addr), change)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::lattice::change::tests::any_change;
    use crate::analysis::lattice::{Change, laws};
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    pub fn addr(site: i32) -> Address {
        Address::new(1, site, Name::new(""))
    }

    pub fn any_address_lattice() -> impl Strategy<Value = AddressLattice> {
        prop_oneof![
            1 => Just(AddressLattice::Top),
            6 => btree_set(0i32..16, 0..8)
                .prop_map(|s| AddressLattice::Set(s.into_iter().map(addr).collect())),
        ]
    }

    pub fn any_addresses() -> impl Strategy<Value = Addresses> {
        (any_address_lattice(), any_change()).prop_map(|(v, c)| Addresses::new(v, c))
    }

    #[test]
    fn join_widens_past_cap() {
        let low = AddressLattice::from_set((0..6).map(addr).collect());
        let high = AddressLattice::from_set((6..12).map(addr).collect());
        assert_eq!(low.joined(&high), AddressLattice::Top);
        let overlapping = AddressLattice::from_set((2..8).map(addr).collect());
        assert_eq!(low.joined(&overlapping).len(), 8);
        assert_eq!(
            AddressLattice::from_set((0..11).map(addr).collect()),
            AddressLattice::Top
        );
    }

    #[test]
    fn refinement() {
        let ab = AddressLattice::from_set([addr(1), addr(2)].into());
        let b = AddressLattice::single(addr(2));
        assert_eq!(ab.retain_all(&b), b);
        assert_eq!(ab.remove_all(&b), AddressLattice::single(addr(1)));
        assert_eq!(AddressLattice::Top.remove_all(&b), AddressLattice::Top);
        assert_eq!(b.singleton(), Some(addr(2)));
        assert_eq!(ab.singleton(), None);
    }

    #[test]
    fn class_separates_function_objects() {
        let cell = addr(3);
        let func = cell.with_class(JsClass::Function);
        assert_ne!(cell, func);
        assert_eq!(func.site, cell.site);
        assert_ne!(
            Address::builtin_prop(Builtin::Object, "keys"),
            Address::builtin_native(Builtin::Object, "keys")
        );
    }

    #[test]
    fn display_lists_addresses() {
        let ab = AddressLattice::from_set([addr(1), addr(2)].into());
        assert_eq!(ab.to_string(), "Addrs:{@1:1,@1:2}");
        assert_eq!(AddressLattice::bottom().to_string(), "Addr:BOT");
        assert_eq!(AddressLattice::Top.to_string(), "Addr:TOP");
    }

    #[test]
    fn tagged_addresses_join_change() {
        let a = Addresses::of(addr(1), Change::Unchanged);
        let b = Addresses::of(addr(2), Change::Changed);
        let j = a.joined(&b);
        assert_eq!(j.value.len(), 2);
        assert_eq!(j.change, Change::Top);
    }

    proptest! {
        #[test]
        fn address_laws(a in any_address_lattice(), b in any_address_lattice(), c in any_address_lattice()) {
            laws::check(&a, &b, &c);
            laws::check_bounds(&a);
        }

        #[test]
        fn widening_never_exceeds_cap(a in any_address_lattice(), b in any_address_lattice()) {
            let j = a.joined(&b);
            prop_assert!(j.len() <= MAX_ADDRESSES);
        }

        #[test]
        fn tagged_address_laws(a in any_addresses(), b in any_addresses(), c in any_addresses()) {
            laws::check(&a, &b, &c);
        }
    }
}
