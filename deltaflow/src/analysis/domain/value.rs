use crate::analysis::domain::address::{Address, AddressLattice, Addresses};
use crate::analysis::domain::boolean::{Bool, BoolLattice};
use crate::analysis::domain::definers::DefinerIds;
use crate::analysis::domain::number::{Num, NumLattice};
use crate::analysis::domain::presence::{Null, Presence, Undefined};
use crate::analysis::domain::string::{Str, StrLattice};
use crate::analysis::lattice::{BoundedLattice, Change, JoinSemiLattice, impl_partial_ord_via_join};
use deltaflow_js::NodeId;
use std::fmt::{Display, Formatter};

/// The abstract value of an expression or memory cell.
///
/// A product of one sub-domain per JavaScript type, each with its own change tag, plus the
/// change of the value as a whole (`change`), whether it was derived from something changed
/// (`dependent`) and the AST nodes that defined it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BValue {
    pub string: Str,
    pub number: Num,
    pub boolean: Bool,
    pub null: Null,
    pub undefined: Undefined,
    pub addresses: Addresses,
    pub change: Change,
    pub dependent: Change,
    pub definers: DefinerIds,
}

impl BValue {
    /// Any primitive. Addresses stay bottom so dynamically created objects can still be
    /// attached to the value later.
    pub fn top(change: Change, dependent: Change, type_change: Change) -> Self {
        Self {
            string: Str::top_with(type_change),
            number: Num::top_with(type_change),
            boolean: Bool::top_with(type_change),
            null: Null::top_with(type_change),
            undefined: Undefined::top_with(type_change),
            addresses: Addresses::bottom_with(type_change),
            change,
            dependent,
            definers: DefinerIds::empty(),
        }
    }

    pub fn primitive(change: Change, dependent: Change, type_change: Change) -> Self {
        Self::top(change, dependent, type_change)
    }

    pub fn bottom(change: Change, dependent: Change, type_change: Change) -> Self {
        Self {
            string: Str::bottom_with(type_change),
            number: Num::bottom_with(type_change),
            boolean: Bool::bottom_with(type_change),
            null: Null::bottom_with(type_change),
            undefined: Undefined::bottom_with(type_change),
            addresses: Addresses::bottom_with(type_change),
            change,
            dependent,
            definers: DefinerIds::empty(),
        }
    }

    /// An unknown value synthesized for a missing variable or property.
    pub fn dummy(change: Change, definer: NodeId) -> Self {
        Self::top(change, Change::Unchanged, change).with_definers(DefinerIds::single(definer))
    }

    /// A value that only ever holds `string`.
    pub fn of_str(string: StrLattice, change: Change) -> Self {
        Self::bottom(change, Change::Unchanged, change).with_str(string)
    }

    pub fn of_num(number: NumLattice, change: Change) -> Self {
        Self::bottom(change, Change::Unchanged, change).with_num(number)
    }

    pub fn of_bool(boolean: BoolLattice, change: Change) -> Self {
        Self::bottom(change, Change::Unchanged, change).with_bool(boolean)
    }

    pub fn null(change: Change) -> Self {
        let mut v = Self::bottom(change, Change::Unchanged, change);
        v.null.value = Presence::Top;
        v
    }

    pub fn undefined(change: Change) -> Self {
        let mut v = Self::bottom(change, Change::Unchanged, change);
        v.undefined.value = Presence::Top;
        v
    }

    /// A pointer to exactly `addr`.
    pub fn of_address(addr: Address, change: Change) -> Self {
        Self::bottom(change, Change::Unchanged, change)
            .with_addresses(AddressLattice::single(addr))
    }

    pub fn of_addresses(addresses: AddressLattice, change: Change) -> Self {
        Self::bottom(change, Change::Unchanged, change).with_addresses(addresses)
    }

    pub fn with_str(mut self, string: StrLattice) -> Self {
        self.string.value = string;
        self
    }

    pub fn with_num(mut self, number: NumLattice) -> Self {
        self.number.value = number;
        self
    }

    pub fn with_bool(mut self, boolean: BoolLattice) -> Self {
        self.boolean.value = boolean;
        self
    }

    pub fn with_addresses(mut self, addresses: AddressLattice) -> Self {
        self.addresses.value = addresses;
        self
    }

    pub fn with_definers(mut self, definers: DefinerIds) -> Self {
        self.definers = definers;
        self
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.change = change;
        self
    }

    pub fn with_dependent(mut self, dependent: Change) -> Self {
        self.dependent = dependent;
        self
    }

    /// Overwrite the change tag of every sub-domain.
    pub fn set_change(&mut self, change: Change) {
        self.string.change = change;
        self.number.change = change;
        self.boolean.change = change;
        self.null.change = change;
        self.undefined.change = change;
        self.addresses.change = change;
    }

    /// The value may differ between versions.
    pub fn may_change(&self) -> bool {
        self.change.may_change()
    }

    fn only(&self, string: bool, number: bool, boolean: bool, null: bool, undefined: bool, addr: bool) -> bool {
        (string || self.string.value.is_bottom())
            && (number || self.number.value.is_bottom())
            && (boolean || self.boolean.value.is_bottom())
            && (null || !self.null.value.is_present())
            && (undefined || !self.undefined.value.is_present())
            && (addr || self.addresses.value.is_empty())
    }

    pub fn is_undefined(&self) -> bool {
        self.undefined.value.is_present() && self.only(false, false, false, false, true, false)
    }

    pub fn is_null(&self) -> bool {
        self.null.value.is_present() && self.only(false, false, false, true, false, false)
    }

    pub fn is_blank(&self) -> bool {
        self.string.value.is_blank() && self.only(true, false, false, false, false, false)
    }

    pub fn is_nan(&self) -> bool {
        self.number.value.is_nan() && self.only(false, true, false, false, false, false)
    }

    pub fn is_zero(&self) -> bool {
        self.number.value.is_zero() && self.only(false, true, false, false, false, false)
    }

    pub fn is_false(&self) -> bool {
        self.boolean.value == BoolLattice::False && self.only(false, false, true, false, false, false)
    }

    /// The single address this value points to, when it is nothing but a pointer.
    pub fn single_address(&self) -> Option<Address> {
        if self.only(false, false, false, false, false, true) {
            self.addresses.value.singleton()
        } else {
            None
        }
    }

    /// The part of this value that is truthy in JavaScript.
    pub fn truthy(&self) -> Self {
        let mut v = self.clone();
        v.undefined.value = Presence::Bottom;
        v.null.value = Presence::Bottom;
        v.string.value = self.string.value.without_blank();
        v.number.value = self.number.value.truthy_part();
        v.boolean.value = self.boolean.value.truthy_part();
        v
    }

    /// The part of this value that is falsey in JavaScript.
    pub fn falsey(&self) -> Self {
        let mut v = self.clone();
        v.string.value = self.string.value.blank_part();
        v.number.value = self.number.value.falsey_part();
        v.boolean.value = self.boolean.value.falsey_part();
        v.addresses.value = AddressLattice::bottom();
        v
    }
}

impl JoinSemiLattice for BValue {
    fn join(&mut self, other: &Self) {
        self.string.join(&other.string);
        self.number.join(&other.number);
        self.boolean.join(&other.boolean);
        self.null.join(&other.null);
        self.undefined.join(&other.undefined);
        self.addresses.join(&other.addresses);
        self.change.join(&other.change);
        self.dependent.join(&other.dependent);
        self.definers.join(&other.definers);
    }
}

impl_partial_ord_via_join!(BValue);

impl Display for BValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.null,
            self.undefined,
            self.boolean,
            self.number,
            self.string,
            self.addresses,
            self.change,
            self.dependent,
            self.definers
        )
    }
}
