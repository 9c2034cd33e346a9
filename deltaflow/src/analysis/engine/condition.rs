//! Refining values along conditional edges.
//!
//! Narrowing only ever writes through a strong update, so it is skipped whenever the tested
//! lvalue may denote more than one cell.

use crate::analysis::domain::{BValue, NumLattice, Presence, StrLattice};
use crate::analysis::engine::eval::ExpEval;
use crate::analysis::lattice::{BoundedLattice, Change, Tagged};
use crate::error::AnalysisError;
use deltaflow_js::{BinaryOp, Expr, ExprKind, UnaryOp};

fn is_literal(expr: &Expr) -> bool {
    matches!(
        expr.unparen().kind,
        ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Keyword(_)
    )
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(
        expr.unparen().kind,
        ExprKind::Name(_) | ExprKind::PropertyGet { .. } | ExprKind::ElementGet { .. }
    )
}

/// The value is nothing but a set of pointers.
fn is_pointer(v: &BValue) -> bool {
    !v.addresses.value.is_empty()
        && v.string.value.is_bottom()
        && v.number.value.is_bottom()
        && v.boolean.value.is_bottom()
        && !v.null.value.is_present()
        && !v.undefined.value.is_present()
}

/// Keep `lhs`'s identity but only the sub-domains of `parts`.
fn restrict(lhs: &BValue, parts: BValue) -> BValue {
    BValue {
        change: lhs.change,
        dependent: lhs.dependent,
        definers: lhs.definers.clone(),
        ..parts
    }
}

/// `lhs === rhs` holds.
pub fn sheq(lhs: &BValue, rhs: &BValue, change: Change) -> BValue {
    let mut v = restrict(lhs, rhs.clone());
    v.set_change(change);
    v
}

/// The truthy part of `v`, with the narrowed sub-domains tagged by the condition's `change`.
pub fn truthy(v: &BValue, change: Change) -> BValue {
    let mut v = v.truthy();
    v.undefined.change = change;
    v.null.change = change;
    v.string.change = change;
    v.number.change = change;
    v.boolean.change = change;
    v
}

/// The falsey part of `v`, with every sub-domain tagged by the condition's `change`.
pub fn falsey(v: &BValue, change: Change) -> BValue {
    let mut v = v.falsey();
    v.set_change(change);
    v
}

/// `lhs == rhs` holds.
pub fn eq(lhs: &BValue, rhs: &BValue, change: Change) -> BValue {
    let empty = || BValue::bottom(lhs.change, lhs.dependent, change);
    if rhs.is_undefined() || rhs.is_null() {
        let mut v = empty();
        v.null.value = Presence::Top;
        v.undefined.value = Presence::Top;
        restrict(lhs, v)
    } else if rhs.is_blank() || rhs.is_zero() {
        restrict(
            lhs,
            empty()
                .with_str(StrLattice::blank())
                .with_num(NumLattice::zero()),
        )
    } else if rhs.is_nan() {
        restrict(lhs, empty().with_num(NumLattice::nan()))
    } else if rhs.is_false() {
        falsey(lhs, change)
    } else if is_pointer(rhs) {
        restrict(
            lhs,
            empty().with_addresses(lhs.addresses.value.retain_all(&rhs.addresses.value)),
        )
    } else {
        lhs.clone()
    }
}

/// `lhs != rhs` holds.
pub fn ne(lhs: &BValue, rhs: &BValue, change: Change) -> BValue {
    let mut v = lhs.clone();
    if rhs.is_undefined() || rhs.is_null() {
        v.null = Tagged::new(Presence::Bottom, change);
        v.undefined = Tagged::new(Presence::Bottom, change);
    } else if rhs.is_blank() || rhs.is_zero() {
        v.string = Tagged::new(lhs.string.value.without_blank(), change);
        v.number = Tagged::new(lhs.number.value.without_zero(), change);
    } else if rhs.is_nan() {
        v.number = Tagged::new(lhs.number.value.without_nan(), change);
    } else if rhs.is_false() {
        v = truthy(lhs, change);
    } else if is_pointer(rhs) {
        v.addresses = Tagged::new(lhs.addresses.value.remove_all(&rhs.addresses.value), change);
    }
    v
}

/// `lhs !== rhs` holds. Unlike [ne] each primitive is only excluded from its own type.
pub fn shne(lhs: &BValue, rhs: &BValue, change: Change) -> BValue {
    let mut v = lhs.clone();
    if rhs.is_undefined() {
        v.undefined = Tagged::new(Presence::Bottom, change);
    } else if rhs.is_null() {
        v.null = Tagged::new(Presence::Bottom, change);
    } else if rhs.is_blank() {
        v.string = Tagged::new(lhs.string.value.without_blank(), change);
    } else if rhs.is_zero() {
        v.number = Tagged::new(lhs.number.value.without_zero(), change);
    } else if rhs.is_nan() {
        v.number = Tagged::new(lhs.number.value.without_nan(), change);
    } else if rhs.is_false() {
        v.boolean = Tagged::new(lhs.boolean.value.truthy_part(), change);
    } else if is_pointer(rhs) {
        v.addresses = Tagged::new(lhs.addresses.value.remove_all(&rhs.addresses.value), change);
    }
    v
}

impl ExpEval<'_> {
    /// Refine the state under the assumption that `cond` evaluates to `!negated`.
    pub fn interpret_condition(&mut self, cond: &Expr, negated: bool) -> Result<(), AnalysisError> {
        match &cond.kind {
            ExprKind::Paren(inner) => self.interpret_condition(inner, negated),
            ExprKind::Name(_) | ExprKind::PropertyGet { .. } => {
                let change = Change::conv(cond.change);
                self.narrow(cond, |v| {
                    if negated {
                        falsey(v, change)
                    } else {
                        truthy(v, change)
                    }
                })
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.interpret_condition(operand, !negated),
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::StrictEq | BinaryOp::StrictNe => {
                    let holds = matches!(op, BinaryOp::Eq | BinaryOp::StrictEq) != negated;
                    let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNe);
                    let (lvalue, other) = if is_literal(left) && is_lvalue(right) {
                        (right, left)
                    } else {
                        (left, right)
                    };
                    if !is_lvalue(lvalue) {
                        return Ok(());
                    }
                    let rhs = self.eval(other)?;
                    let change = Change::conv(cond.change);
                    match (strict, holds) {
                        (true, true) => self.narrow(lvalue, |v| sheq(v, &rhs, change)),
                        (false, true) => self.narrow(lvalue, |v| eq(v, &rhs, change)),
                        (false, false) => self.narrow(lvalue, |v| ne(v, &rhs, change)),
                        (true, false) => self.narrow(lvalue, |v| shne(v, &rhs, change)),
                    }
                }
                BinaryOp::And if !negated => {
                    self.interpret_condition(left, false)?;
                    self.interpret_condition(right, false)
                }
                BinaryOp::Or if negated => {
                    self.interpret_condition(left, true)?;
                    self.interpret_condition(right, true)
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn narrow<F>(&mut self, lvalue: &Expr, refine: F) -> Result<(), AnalysisError>
    where
        F: FnOnce(&BValue) -> BValue,
    {
        let addrs = self.resolve_or_create(lvalue)?;
        let mut iter = addrs.into_iter();
        let (Some(addr), None) = (iter.next(), iter.next()) else {
            return Ok(());
        };
        let current = self.state.store.apply(&addr);
        self.state.store.strong_update(addr, refine(&current));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::AddressLattice;
    use crate::analysis::domain::address::tests::addr;
    use crate::analysis::lattice::JoinSemiLattice;

    fn maybe_null_or_obj() -> BValue {
        let u = Change::Unchanged;
        let mut v = BValue::of_address(addr(1), u);
        v.null.value = Presence::Top;
        v
    }

    #[test]
    fn strict_inequality_with_null_keeps_object() {
        let lhs = maybe_null_or_obj();
        let v = shne(&lhs, &BValue::null(Change::Unchanged), Change::Unchanged);
        assert_eq!(v.single_address(), Some(addr(1)));
    }

    #[test]
    fn loose_equality_with_null_admits_undefined() {
        let lhs = maybe_null_or_obj();
        let v = eq(&lhs, &BValue::null(Change::Unchanged), Change::Unchanged);
        assert!(v.null.value.is_present());
        assert!(v.undefined.value.is_present());
        assert!(v.addresses.value.is_empty());
    }

    #[test]
    fn strict_equality_takes_rhs_shape() {
        let lhs = BValue::top(Change::Unchanged, Change::Unchanged, Change::Unchanged);
        let rhs = BValue::of_num(NumLattice::exact(4.0), Change::Unchanged);
        let v = sheq(&lhs, &rhs, Change::Changed);
        assert_eq!(v.number.value.exact_value(), Some(4.0));
        assert!(v.string.value.is_bottom());
        assert_eq!(v.number.change, Change::Changed);
        assert_eq!(v.change, Change::Unchanged);
    }

    #[test]
    fn inequality_with_pointer_removes_it() {
        let u = Change::Unchanged;
        let lhs = BValue::of_addresses(
            AddressLattice::from_set([addr(1), addr(2)].into_iter().collect()),
            u,
        );
        let v = ne(&lhs, &BValue::of_address(addr(2), u), u);
        assert_eq!(v.single_address(), Some(addr(1)));
    }

    #[test]
    fn loose_inequality_with_zero() {
        let u = Change::Unchanged;
        let lhs = BValue::top(u, u, u);
        let v = ne(&lhs, &BValue::of_num(NumLattice::zero(), u), u);
        assert!(!v.number.value.may_be_zero());
        assert!(!v.string.value.may_be_blank());
        assert!(v.null.value.is_present());
        let joined = v.joined(&lhs);
        assert_eq!(joined, lhs);
    }

    #[test]
    fn narrowed_parts_carry_condition_change() {
        let u = Change::Unchanged;
        let lhs = BValue::top(u, u, u);
        let t = truthy(&lhs, Change::Changed);
        assert_eq!(t.number.change, Change::Changed);
        assert_eq!(t.null.change, Change::Changed);
        assert!(!t.null.value.is_present());
        assert_eq!(t.change, u);
        let f = falsey(&lhs, Change::Changed);
        assert_eq!(f.string.change, Change::Changed);
        assert_eq!(f.addresses.change, Change::Changed);
        assert_eq!(f.change, u);
    }

    #[test]
    fn loose_equality_takes_condition_change() {
        let u = Change::Unchanged;
        let mut lhs = BValue::top(u, u, u);
        lhs.string.change = Change::Bottom;
        let v = eq(&lhs, &BValue::null(u), Change::Changed);
        assert_eq!(v.null.change, Change::Changed);
        assert_eq!(v.string.change, Change::Changed);
        assert_eq!(v.change, u);
    }
}
