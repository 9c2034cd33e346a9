use crate::analysis::domain::BValue;
use crate::analysis::lattice::{JoinSemiLattice, impl_partial_ord_via_join};

/// Registers for passing values between a caller and a callee without allocating cells.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Scratchpad {
    retval: Option<BValue>,
    args: Vec<BValue>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(args: Vec<BValue>) -> Self {
        Self { retval: None, args }
    }

    pub fn retval(&self) -> Option<&BValue> {
        self.retval.as_ref()
    }

    pub fn set_retval(&mut self, value: Option<BValue>) {
        self.retval = value;
    }

    pub fn arg(&self, index: usize) -> Option<&BValue> {
        self.args.get(index)
    }

    pub fn args(&self) -> &[BValue] {
        &self.args
    }
}

impl JoinSemiLattice for Scratchpad {
    fn join(&mut self, other: &Self) {
        match (&mut self.retval, &other.retval) {
            (Some(a), Some(b)) => a.join(b),
            (None, Some(b)) => self.retval = Some(b.clone()),
            _ => {}
        }
        for (i, arg) in other.args.iter().enumerate() {
            match self.args.get_mut(i) {
                Some(a) => a.join(arg),
                None => self.args.push(arg.clone()),
            }
        }
    }
}

impl_partial_ord_via_join!(Scratchpad);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::NumLattice;
    use crate::analysis::lattice::Change;

    #[test]
    fn join_is_pointwise() {
        let one = BValue::of_num(NumLattice::exact(1.0), Change::Unchanged);
        let two = BValue::of_num(NumLattice::exact(2.0), Change::Unchanged);
        let mut a = Scratchpad::with_args(vec![one.clone()]);
        let mut b = Scratchpad::with_args(vec![two.clone(), one.clone()]);
        b.set_retval(Some(two.clone()));
        a.join(&b);
        assert_eq!(a.args().len(), 2);
        assert_eq!(a.arg(0).map(|v| v.number.value.clone()), Some(NumLattice::real()));
        assert_eq!(a.retval(), Some(&two));
        assert!(Scratchpad::new().arg(0).is_none());
    }
}
