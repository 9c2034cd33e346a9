use crate::analysis::lattice::{
    BoundedLattice, JoinSemiLattice, Tagged, impl_partial_ord_via_join,
};
use internment::Intern;
use std::fmt::{Display, Formatter};

const BLANK: u8 = 1 << 0;
const NUMERIC: u8 = 1 << 1;
const SPECIAL: u8 = 1 << 2;
/// Non-blank strings that are neither numeric nor special.
const OTHER: u8 = 1 << 3;
const ALL: u8 = BLANK | NUMERIC | SPECIAL | OTHER;

/// Property names that resolve to built-in members on every object.
pub const SPECIAL_STRINGS: &[&str] = &[
    "valueOf",
    "toString",
    "toLocaleString",
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "constructor",
    "prototype",
    "length",
    "__proto__",
    "caller",
    "callee",
    "arguments",
    "apply",
    "call",
    "bind",
    "name",
];

pub fn is_special(s: &str) -> bool {
    SPECIAL_STRINGS.contains(&s)
}

/// Whether `s` reads as a JavaScript number literal.
pub fn is_numeric(s: &str) -> bool {
    if matches!(s, "NaN" | "Infinity" | "-Infinity") {
        return true;
    }
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && s.parse::<f64>().is_ok()
}

/// Abstract strings.
///
/// Concrete strings are partitioned into the blank string, numeric strings, special
/// property names and everything else. An element is a set of those classes, optionally
/// refined to one exact non-blank string. Named points: `Blank`, `Num`, `Spl`,
/// `NotNumNorSpl`, `NotSpl`, `NotNum`, `NotBlank`, `Top`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrLattice {
    atoms: u8,
    exact: Option<Intern<String>>,
}

impl StrLattice {
    const fn of(atoms: u8) -> Self {
        Self { atoms, exact: None }
    }

    pub fn blank() -> Self {
        Self::of(BLANK)
    }

    pub fn num() -> Self {
        Self::of(NUMERIC)
    }

    pub fn spl() -> Self {
        Self::of(SPECIAL)
    }

    pub fn not_num_nor_spl() -> Self {
        Self::of(OTHER)
    }

    pub fn not_spl() -> Self {
        Self::of(ALL & !SPECIAL)
    }

    pub fn not_num() -> Self {
        Self::of(ALL & !NUMERIC)
    }

    pub fn not_blank() -> Self {
        Self::of(ALL & !BLANK)
    }

    /// The abstraction of a single string literal.
    pub fn exact(s: &str) -> Self {
        if s.is_empty() {
            return Self::blank();
        }
        let atoms = if is_numeric(s) {
            NUMERIC
        } else if is_special(s) {
            SPECIAL
        } else {
            OTHER
        };
        Self {
            atoms,
            exact: Some(Intern::new(s.to_string())),
        }
    }

    /// The concrete string, when this element describes exactly one.
    pub fn exact_value(&self) -> Option<&str> {
        if self.atoms == BLANK {
            return Some("");
        }
        self.exact.as_ref().map(|s| s.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.atoms == BLANK
    }

    pub fn may_be_blank(&self) -> bool {
        self.atoms & BLANK != 0
    }

    pub fn is_numeric(&self) -> bool {
        self.atoms == NUMERIC
    }

    pub fn may_be_special(&self) -> bool {
        self.atoms & SPECIAL != 0
    }

    /// Remove the blank string from the described set.
    pub fn without_blank(&self) -> Self {
        Self {
            atoms: self.atoms & !BLANK,
            exact: self.exact,
        }
    }

    /// Keep only the blank string.
    pub fn blank_part(&self) -> Self {
        Self::of(self.atoms & BLANK)
    }
}

impl JoinSemiLattice for StrLattice {
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

impl_partial_ord_via_join!(StrLattice);

impl BoundedLattice for StrLattice {
    fn top() -> Self {
        Self::of(ALL)
    }

    fn bottom() -> Self {
        Self::of(0)
    }
}

impl Display for StrLattice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(s) = &self.exact {
            return write!(f, "{:?}", s.as_str());
        }
        let name = match self.atoms {
            0 => "BOT",
            BLANK => "Blank",
            NUMERIC => "Num",
            SPECIAL => "Spl",
            OTHER => "NotNumNorSpl",
            a if a == ALL & !SPECIAL => "NotSpl",
            a if a == ALL & !NUMERIC => "NotNum",
            a if a == ALL & !BLANK => "NotBlank",
            ALL => "TOP",
            other => return write!(f, "Str({other:#06b})"),
        };
        write!(f, "{name}")
    }
}

pub type Str = Tagged<StrLattice>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::lattice::change::tests::any_change;
    use crate::analysis::lattice::laws;
    use proptest::prelude::*;

    pub fn any_str_lattice() -> impl Strategy<Value = StrLattice> {
        prop_oneof![
            (0u8..=ALL).prop_map(StrLattice::of),
            prop_oneof![Just("a"), Just("b"), Just("1"), Just("length"), Just("")]
                .prop_map(StrLattice::exact),
        ]
    }

    pub fn any_str() -> impl Strategy<Value = Str> {
        (any_str_lattice(), any_change()).prop_map(|(v, c)| Str::new(v, c))
    }

    #[test]
    fn literals_are_classified() {
        assert_eq!(StrLattice::exact(""), StrLattice::blank());
        assert!(StrLattice::exact("42").is_numeric());
        assert!(StrLattice::exact("-1.5e3").is_numeric());
        assert!(StrLattice::exact("prototype") < StrLattice::spl());
        assert!(StrLattice::exact("foo") < StrLattice::not_num_nor_spl());
        assert!(!StrLattice::exact("1a").is_numeric());
        assert_eq!(StrLattice::exact("foo").exact_value(), Some("foo"));
        assert_eq!(StrLattice::blank().exact_value(), Some(""));
    }

    #[test]
    fn joins_reach_named_points() {
        let num = StrLattice::exact("1");
        let foo = StrLattice::exact("foo");
        let bar = StrLattice::exact("bar");
        assert_eq!(foo.joined(&bar), StrLattice::not_num_nor_spl());
        assert!(num.joined(&foo) <= StrLattice::not_spl());
        assert!(num.joined(&foo) <= StrLattice::not_blank());
        assert_eq!(
            StrLattice::spl().joined(&StrLattice::num()).joined(&foo),
            StrLattice::not_blank()
        );
        assert_eq!(
            StrLattice::blank().joined(&StrLattice::not_blank()),
            StrLattice::top()
        );
    }

    #[test]
    fn blank_narrowing() {
        assert_eq!(StrLattice::top().without_blank(), StrLattice::not_blank());
        assert_eq!(StrLattice::top().blank_part(), StrLattice::blank());
        assert!(StrLattice::exact("x").blank_part().is_bottom());
    }

    proptest! {
        #[test]
        fn str_lattice_laws(a in any_str_lattice(), b in any_str_lattice(), c in any_str_lattice()) {
            laws::check(&a, &b, &c);
            laws::check_bounds(&a);
        }

        #[test]
        fn tagged_str_laws(a in any_str(), b in any_str(), c in any_str()) {
            laws::check(&a, &b, &c);
        }
    }
}
