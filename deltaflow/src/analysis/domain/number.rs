use crate::analysis::lattice::{
    BoundedLattice, JoinSemiLattice, Tagged, impl_partial_ord_via_join,
};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

const ZERO: u8 = 1 << 0;
const NAN: u8 = 1 << 1;
const NEG_INF: u8 = 1 << 2;
const POS_INF: u8 = 1 << 3;
/// Finite numbers other than zero.
const REAL: u8 = 1 << 4;
const ALL: u8 = ZERO | NAN | NEG_INF | POS_INF | REAL;

/// A finite, non-zero number literal.
#[derive(Debug, Copy, Clone)]
pub struct NumValue(f64);

impl NumValue {
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for NumValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for NumValue {}

impl Hash for NumValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

/// Abstract numbers.
///
/// Concrete numbers are partitioned into zero, NaN, -Infinity, +Infinity and the remaining
/// finite reals. An element is a set of those classes, optionally refined to one exact
/// finite value. Named points: `Zero`, `NaN`, `NaNZero`, `NegInf`, `PosInf`, `Real`,
/// `NotZeroNorNaN`, `NotNaN`, `NotZero`, `Top`. An exact value sits directly below `Real`.
///
/// Joining two different exact values yields `Real`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumLattice {
    atoms: u8,
    exact: Option<NumValue>,
}

impl NumLattice {
    const fn of(atoms: u8) -> Self {
        Self { atoms, exact: None }
    }

    pub fn zero() -> Self {
        Self::of(ZERO)
    }

    pub fn nan() -> Self {
        Self::of(NAN)
    }

    pub fn nan_zero() -> Self {
        Self::of(NAN | ZERO)
    }

    pub fn neg_inf() -> Self {
        Self::of(NEG_INF)
    }

    pub fn pos_inf() -> Self {
        Self::of(POS_INF)
    }

    /// Some finite number other than zero.
    pub fn real() -> Self {
        Self::of(REAL)
    }

    pub fn not_nan() -> Self {
        Self::of(ALL & !NAN)
    }

    pub fn not_zero() -> Self {
        Self::of(ALL & !ZERO)
    }

    pub fn not_zero_nor_nan() -> Self {
        Self::of(ALL & !(ZERO | NAN))
    }

    /// The abstraction of a single concrete number.
    pub fn exact(value: f64) -> Self {
        if value.is_nan() {
            Self::nan()
        } else if value == 0.0 {
            Self::zero()
        } else if value == f64::INFINITY {
            Self::pos_inf()
        } else if value == f64::NEG_INFINITY {
            Self::neg_inf()
        } else {
            Self {
                atoms: REAL,
                exact: Some(NumValue(value)),
            }
        }
    }

    /// The concrete value, when this element describes exactly one finite number.
    pub fn exact_value(&self) -> Option<f64> {
        match (self.atoms, self.exact) {
            (ZERO, _) => Some(0.0),
            (REAL, Some(v)) => Some(v.get()),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.atoms == ZERO
    }

    pub fn is_nan(&self) -> bool {
        self.atoms == NAN
    }

    /// Every value described is falsey (zero or NaN).
    pub fn is_falsey(&self) -> bool {
        self.atoms != 0 && self.atoms & !(ZERO | NAN) == 0
    }

    pub fn may_be_zero(&self) -> bool {
        self.atoms & ZERO != 0
    }

    pub fn may_be_nan(&self) -> bool {
        self.atoms & NAN != 0
    }

    pub fn not_nan_value(&self) -> bool {
        !self.may_be_nan()
    }

    pub fn not_zero_value(&self) -> bool {
        !self.may_be_zero()
    }

    /// Remove zero from the described set.
    pub fn without_zero(&self) -> Self {
        self.without(ZERO)
    }

    /// Remove NaN from the described set.
    pub fn without_nan(&self) -> Self {
        self.without(NAN)
    }

    /// Keep only the truthy part: no zero and no NaN.
    pub fn truthy_part(&self) -> Self {
        self.without(ZERO | NAN)
    }

    /// Keep only the falsey part: zero and NaN.
    pub fn falsey_part(&self) -> Self {
        Self::of(self.atoms & (ZERO | NAN))
    }

    fn without(&self, atoms: u8) -> Self {
        let remaining = self.atoms & !atoms;
        Self {
            atoms: remaining,
            exact: if remaining & REAL != 0 { self.exact } else { None },
        }
    }
}

impl JoinSemiLattice for NumLattice {
    fn join(&mut self, other: &Self) {
        if other.atoms == 0 {
            return;
        }
        if self.atoms == 0 {
            *self = other.clone();
            return;
        }
        if self.exact != other.exact {
            self.exact = None;
        }
        self.atoms |= other.atoms;
    }
}

impl_partial_ord_via_join!(NumLattice);

impl BoundedLattice for NumLattice {
    fn top() -> Self {
        Self::of(ALL)
    }

    fn bottom() -> Self {
        Self::of(0)
    }
}

impl Display for NumLattice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(v) = self.exact {
            return write!(f, "{}", v.get());
        }
        let name = match self.atoms {
            0 => "BOT",
            ZERO => "0",
            NAN => "NaN",
            NEG_INF => "-Inf",
            POS_INF => "+Inf",
            REAL => "Real",
            a if a == NAN | ZERO => "NaNZero",
            a if a == ALL & !NAN => "NotNaN",
            a if a == ALL & !ZERO => "NotZero",
            a if a == ALL & !(ZERO | NAN) => "NotZeroNorNaN",
            ALL => "TOP",
            other => return write!(f, "Num({other:#07b})"),
        };
        write!(f, "{name}")
    }
}

/// A number abstraction with its change tag.
pub type Num = Tagged<NumLattice>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::lattice::change::tests::any_change;
    use crate::analysis::lattice::{Change, laws};
    use proptest::prelude::*;

    pub fn any_num_lattice() -> impl Strategy<Value = NumLattice> {
        prop_oneof![
            (0u8..=ALL).prop_map(NumLattice::of),
            prop_oneof![Just(1.0), Just(2.0), Just(-3.5)].prop_map(NumLattice::exact),
        ]
    }

    pub fn any_num() -> impl Strategy<Value = Num> {
        (any_num_lattice(), any_change()).prop_map(|(v, c)| Num::new(v, c))
    }

    #[test]
    fn named_joins() {
        let one = NumLattice::exact(1.0);
        let two = NumLattice::exact(2.0);
        assert_eq!(one.joined(&one), one);
        assert_eq!(one.joined(&two), NumLattice::real());
        assert_eq!(NumLattice::zero().joined(&NumLattice::nan()), NumLattice::nan_zero());
        assert_eq!(NumLattice::zero().joined(&one), NumLattice::of(ZERO | REAL));
        assert!(NumLattice::zero().joined(&one) <= NumLattice::not_nan());
        assert_eq!(
            NumLattice::real().joined(&NumLattice::pos_inf()).joined(&NumLattice::neg_inf()),
            NumLattice::not_zero_nor_nan()
        );
        assert_eq!(NumLattice::bottom().joined(&one), one);
    }

    #[test]
    fn exact_classifies_special_values() {
        assert_eq!(NumLattice::exact(0.0), NumLattice::zero());
        assert_eq!(NumLattice::exact(-0.0), NumLattice::zero());
        assert_eq!(NumLattice::exact(f64::NAN), NumLattice::nan());
        assert_eq!(NumLattice::exact(f64::INFINITY), NumLattice::pos_inf());
        assert_eq!(NumLattice::exact(4.0).exact_value(), Some(4.0));
        assert_eq!(NumLattice::real().exact_value(), None);
    }

    #[test]
    fn narrowing_parts() {
        let top = NumLattice::top();
        assert_eq!(top.truthy_part(), NumLattice::not_zero_nor_nan());
        assert_eq!(top.falsey_part(), NumLattice::nan_zero());
        assert_eq!(top.without_nan(), NumLattice::not_nan());
        assert_eq!(NumLattice::exact(3.0).without_zero(), NumLattice::exact(3.0));
        assert!(NumLattice::nan_zero().is_falsey());
        assert!(!NumLattice::bottom().is_falsey());
    }

    #[test]
    fn exact_values_sit_below_real() {
        assert!(NumLattice::exact(7.0) < NumLattice::real());
        assert!(NumLattice::exact(7.0) < NumLattice::not_zero_nor_nan());
        assert!(NumLattice::exact(7.0).partial_cmp(&NumLattice::exact(8.0)).is_none());
        assert!(NumLattice::exact(7.0).partial_cmp(&NumLattice::zero()).is_none());
    }

    #[test]
    fn tagged_number_joins_change() {
        let a = Num::new(NumLattice::exact(1.0), Change::Unchanged);
        let b = Num::new(NumLattice::exact(2.0), Change::Changed);
        let j = a.joined(&b);
        assert_eq!(j.value, NumLattice::real());
        assert_eq!(j.change, Change::Top);
    }

    proptest! {
        #[test]
        fn num_lattice_laws(a in any_num_lattice(), b in any_num_lattice(), c in any_num_lattice()) {
            laws::check(&a, &b, &c);
            laws::check_bounds(&a);
        }

        #[test]
        fn tagged_num_laws(a in any_num(), b in any_num(), c in any_num()) {
            laws::check(&a, &b, &c);
            laws::check_bounds(&a);
        }
    }
}
