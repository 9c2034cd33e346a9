use crate::analysis::domain::{
    Address, AddressLattice, BValue, BoolLattice, Builtin, DefinerIds, JsClass, NumLattice,
    StrLattice,
};
use crate::analysis::engine::AnalysisContext;
use crate::analysis::engine::lift::create_function_obj;
use crate::analysis::lattice::{BoundedLattice, Change, JoinSemiLattice};
use crate::analysis::memory::{Obj, Property, Variable};
use crate::analysis::state::State;
use crate::error::AnalysisError;
use deltaflow_js::{
    AssignOp, BinaryOp, Expr, ExprKind, FunctionNode, Ident, Keyword, NodeId, UnaryOp,
};
use std::collections::BTreeSet;
use tracing::trace;

/// Property name used when an element access cannot be resolved to a single key.
pub const UNKNOWN_PROPERTY: &str = "~unknown~";

/// Evaluates expressions against a [State], updating it with their side effects.
pub struct ExpEval<'a> {
    pub(crate) state: &'a mut State,
    pub(crate) cx: &'a mut AnalysisContext,
}

pub(crate) fn object_proto() -> BValue {
    BValue::of_address(Address::builtin(Builtin::ObjectProto), Change::Unchanged)
}

impl<'a> ExpEval<'a> {
    pub fn new(state: &'a mut State, cx: &'a mut AnalysisContext) -> Self {
        Self { state, cx }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<BValue, AnalysisError> {
        let c = Change::conv(expr.change);
        let literal = |v: BValue| v.with_dependent(c).with_definers(DefinerIds::single(expr.id));
        let value = match &expr.kind {
            ExprKind::Number(n) => literal(BValue::of_num(NumLattice::exact(*n), c)),
            ExprKind::String(s) => literal(BValue::of_str(StrLattice::exact(s), c)),
            ExprKind::Keyword(Keyword::Null) => literal(BValue::null(c)),
            ExprKind::Keyword(Keyword::True) => literal(BValue::of_bool(BoolLattice::True, c)),
            ExprKind::Keyword(Keyword::False) => literal(BValue::of_bool(BoolLattice::False, c)),
            ExprKind::Keyword(Keyword::This) => self.state.store.apply(&self.state.self_addr),
            ExprKind::Name(_) | ExprKind::PropertyGet { .. } | ExprKind::ElementGet { .. } => {
                self.resolve_value(expr)?
            }
            ExprKind::Unary { op, operand } => self.eval_unary(expr, *op, operand)?,
            ExprKind::Binary { op, left, right } => self.eval_binary(expr, *op, left, right)?,
            ExprKind::Assign { op, target, value } => self.eval_assign(expr, *op, target, value)?,
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.eval(test)?;
                let mut v = self.eval(consequent)?;
                v.join(&self.eval(alternate)?);
                if test.may_change() {
                    v.dependent = Change::Changed;
                }
                v
            }
            ExprKind::Object(props) => {
                let obj_addr = self.state.trace.make_addr(expr.id, "");
                let mut obj = Obj::new(JsClass::Object).with_prototype(object_proto());
                for prop in props {
                    let v = self.eval(&prop.value)?;
                    let cell = self.state.trace.make_addr(prop.id, &prop.key);
                    self.state.store.alloc_value(cell, v);
                    obj.insert(Property::new(
                        prop.id,
                        &prop.key,
                        Change::conv(prop.change),
                        cell,
                    ));
                }
                self.state.store.alloc_obj(obj_addr, obj);
                literal(BValue::of_address(obj_addr, c))
            }
            ExprKind::Array(elems) => {
                let obj_addr = self.state.trace.make_addr(expr.id, "");
                let mut obj = Obj::new(JsClass::Array).with_prototype(object_proto());
                for (i, elem) in elems.iter().enumerate() {
                    let v = self.eval(elem)?;
                    let cell = self.state.trace.make_addr(elem.id, "");
                    self.state.store.alloc_value(cell, v);
                    obj.insert(Property::new(
                        elem.id,
                        &i.to_string(),
                        Change::conv(elem.change),
                        cell,
                    ));
                }
                self.state.store.alloc_obj(obj_addr, obj);
                literal(BValue::of_address(obj_addr, c))
            }
            ExprKind::Function(function) => self.eval_function(function),
            ExprKind::Call { callee, args } => self.eval_call(expr, callee, args, false)?,
            ExprKind::New { callee, args } => self.eval_call(expr, callee, args, true)?,
            ExprKind::Paren(inner) => self.eval(inner)?,
        };
        Ok(value)
    }

    /// Change and dependent tags of a value computed from `operands` by `expr`.
    fn derived(expr: &Expr, operands: &[(&Expr, &BValue)]) -> (Change, Change) {
        let syntactic = Change::conv(expr.change).may_change()
            || operands
                .iter()
                .any(|(e, _)| Change::conv(e.change).may_change());
        let change = if syntactic {
            Change::Changed
        } else if operands.iter().any(|(_, v)| v.may_change()) {
            Change::Top
        } else {
            Change::Unchanged
        };
        let dependent = if change.may_change() {
            Change::Changed
        } else {
            operands
                .iter()
                .fold(Change::Unchanged, |d, (_, v)| d.joined(&v.dependent))
        };
        (change, dependent)
    }

    fn eval_unary(
        &mut self,
        expr: &Expr,
        op: UnaryOp,
        operand: &Expr,
    ) -> Result<BValue, AnalysisError> {
        let v = self.eval(operand)?;
        let ch = if v.may_change() || Change::conv(expr.change).may_change() {
            Change::Changed
        } else {
            Change::Unchanged
        };
        let result = match op {
            UnaryOp::Not | UnaryOp::Delete => BValue::of_bool(BoolLattice::Top, ch),
            UnaryOp::TypeOf => BValue::of_str(StrLattice::top(), ch),
            UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => {
                BValue::of_num(NumLattice::top(), ch)
            }
            UnaryOp::Void => BValue::undefined(ch),
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let n = BValue::of_num(NumLattice::top(), ch)
                    .with_dependent(ch)
                    .with_definers(DefinerIds::single(expr.id));
                self.assign(operand, n.clone())?;
                n
            }
        };
        Ok(result
            .with_dependent(ch)
            .with_definers(DefinerIds::single(expr.id)))
    }

    fn eval_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<BValue, AnalysisError> {
        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let (change, dependent) = Self::derived(expr, &[(left, &l), (right, &r)]);
        let mut result = match op {
            BinaryOp::And => l.falsey().joined(&r),
            BinaryOp::Or => l.truthy().joined(&r),
            BinaryOp::Comma => return Ok(r),
            BinaryOp::Add => plus(&l, &r, change),
            op if op.is_arithmetic() => BValue::of_num(NumLattice::top(), change),
            _ => BValue::of_bool(BoolLattice::Top, change),
        };
        result.change.join(&change);
        result.dependent = dependent;
        result.definers.insert(expr.id);
        Ok(result)
    }

    fn eval_assign(
        &mut self,
        expr: &Expr,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
    ) -> Result<BValue, AnalysisError> {
        let rhs = self.eval(value)?;
        let mut new = match op {
            AssignOp::Assign => rhs,
            op => {
                let lhs = self.resolve_value(target)?;
                let (change, dependent) = Self::derived(expr, &[(target, &lhs), (value, &rhs)]);
                let v = if op == AssignOp::Add {
                    plus(&lhs, &rhs, change)
                } else {
                    BValue::of_num(NumLattice::top(), change)
                };
                v.with_dependent(dependent)
            }
        };
        if new.definers.is_empty() {
            new.definers.insert(value.id);
        }
        if Change::conv(expr.change).may_change() {
            new.change.join(&Change::Changed);
            new.dependent = Change::Changed;
        }
        self.assign(target, new.clone())?;
        Ok(new)
    }

    fn eval_function(&mut self, function: &FunctionNode) -> BValue {
        let c = Change::conv(function.change);
        let trace = self.state.trace;
        let fun_addr = trace.mod_addr(trace.make_addr(function.id, ""), JsClass::Function);
        let pointer =
            BValue::of_address(fun_addr, c).with_definers(DefinerIds::single(function.id));
        let mut env = self.state.env.clone();
        if let Some(name) = &function.name {
            let cell = trace.make_addr(name.id, "");
            self.state.store.alloc_value(cell, pointer.clone());
            env.strong_update(Variable::at(
                name.id,
                &name.name,
                Change::conv(name.change),
                cell,
            ));
        }
        let obj = create_function_obj(self.state, function, env);
        self.state.store.alloc_obj(fun_addr, obj);
        pointer
    }

    /// Write `value` to every location `target` may denote.
    pub(crate) fn assign(&mut self, target: &Expr, value: BValue) -> Result<(), AnalysisError> {
        let addrs = self.resolve_or_create(target)?;
        self.write(&addrs, value);
        Ok(())
    }

    /// Write the initializer of a declared variable.
    pub(crate) fn assign_ident(&mut self, ident: &Ident, value: BValue) {
        let addrs = self.resolve_name(&ident.name, ident.id);
        self.write(&addrs, value);
    }

    fn write(&mut self, addrs: &BTreeSet<Address>, value: BValue) {
        if addrs.len() == 1 {
            for addr in addrs {
                self.state.store.strong_update(*addr, value.clone());
            }
        } else {
            for addr in addrs {
                self.state.store.weak_update(*addr, value.clone());
            }
        }
    }

    /// The joined value of every location `expr` may denote.
    pub fn resolve_value(&mut self, expr: &Expr) -> Result<BValue, AnalysisError> {
        let addrs = self.resolve_or_create(expr)?;
        let mut value: Option<BValue> = None;
        for addr in &addrs {
            let v = self.state.store.apply(addr);
            match &mut value {
                Some(acc) => acc.join(&v),
                None => value = Some(v),
            }
        }
        let Some(mut value) = value else {
            return Ok(BValue::top(
                Change::Unchanged,
                Change::Unchanged,
                Change::Unchanged,
            ));
        };
        if Change::conv(expr.change).may_change() {
            value.dependent = Change::Changed;
            value.definers.insert(expr.id);
        }
        Ok(value)
    }

    /// The value cells `expr` may denote, creating cells for anything missing.
    pub fn resolve_or_create(&mut self, expr: &Expr) -> Result<BTreeSet<Address>, AnalysisError> {
        match &expr.kind {
            ExprKind::Paren(inner) => self.resolve_or_create(inner),
            ExprKind::Name(name) => Ok(self.resolve_name(name, expr.id)),
            ExprKind::PropertyGet { target, property } => {
                let name = property.as_name().unwrap_or(UNKNOWN_PROPERTY);
                self.resolve_property(expr.id, target, name)
            }
            ExprKind::ElementGet { target, element } => {
                let key = self.eval(element)?;
                let name = property_key(&key);
                self.resolve_property(expr.id, target, &name)
            }
            ExprKind::Keyword(Keyword::This) => Ok(BTreeSet::from([self.state.self_addr])),
            _ => {
                let v = self.eval(expr)?;
                let cell = self.state.trace.make_addr(expr.id, "");
                self.state.store.alloc_value(cell, v);
                Ok(BTreeSet::from([cell]))
            }
        }
    }

    /// Look up `name` in the environment, then on the global object. Unknown names get a
    /// fresh variable defined at `site`.
    pub fn resolve_name(&mut self, name: &str, site: NodeId) -> BTreeSet<Address> {
        if let Some(var) = self.state.env.apply(name) {
            return var.addresses.iter().copied().collect();
        }
        if let Some(global) = self.state.store.get_obj(&Address::builtin(Builtin::Global))
            && let Some(prop) = global.get(name)
        {
            return BTreeSet::from([prop.address]);
        }
        trace!(name, %site, "creating undeclared variable");
        let cell = self.state.trace.make_addr(site, "");
        self.state
            .store
            .alloc_value(cell, BValue::dummy(Change::Bottom, site));
        self.state
            .env
            .strong_update(Variable::at(site, name, Change::Bottom, cell));
        BTreeSet::from([cell])
    }

    /// The cells of property `name` on every object `target` may point to. A base that points
    /// nowhere gets a placeholder object so that the property has somewhere to live.
    fn resolve_property(
        &mut self,
        site: NodeId,
        target: &Expr,
        name: &str,
    ) -> Result<BTreeSet<Address>, AnalysisError> {
        let bases = self.resolve_or_create(target)?;
        let mut out = BTreeSet::new();
        for base in bases {
            let value = self.state.store.apply(&base);
            let objects: Vec<Address> = if value.addresses.value.is_empty() {
                let trace = self.state.trace;
                let dummy = trace.mod_addr(trace.make_addr(site, ""), JsClass::Object);
                if self.state.store.get_obj(&dummy).is_none() {
                    self.state.store.alloc_obj(
                        dummy,
                        Obj::new(JsClass::Object).with_prototype(object_proto()),
                    );
                }
                let pointer = BValue::bottom(Change::Bottom, Change::Bottom, Change::Bottom)
                    .with_addresses(AddressLattice::single(dummy));
                self.state.store.strong_update(base, value.joined(&pointer));
                vec![dummy]
            } else {
                value.addresses.value.iter().copied().collect()
            };
            for obj_addr in objects {
                let Some(obj) = self.state.store.get_obj(&obj_addr) else {
                    continue;
                };
                if let Some(prop) = obj.get(name) {
                    out.insert(prop.address);
                    continue;
                }
                let cell = self.state.trace.make_addr(site, name);
                if !self.state.store.contains_value(&cell) {
                    self.state
                        .store
                        .alloc_value(cell, BValue::dummy(Change::Bottom, site));
                }
                if let Some(obj) = self.state.store.get_obj_mut(&obj_addr) {
                    obj.insert(Property::new(site, name, Change::Bottom, cell));
                }
                out.insert(cell);
            }
        }
        Ok(out)
    }
}

/// `+` on abstract values: string concatenation when either side may be a string or an
/// object, numeric addition otherwise.
fn plus(l: &BValue, r: &BValue, change: Change) -> BValue {
    let stringy = |v: &BValue| !v.string.value.is_bottom() || !v.addresses.value.is_empty();
    let numeric = |v: &BValue| {
        !v.number.value.is_bottom()
            || !v.boolean.value.is_bottom()
            || v.null.value.is_present()
            || v.undefined.value.is_present()
    };
    let mut out = BValue::bottom(change, Change::Unchanged, change);
    if stringy(l) || stringy(r) {
        out = out.with_str(StrLattice::top());
    }
    if (numeric(l) && numeric(r)) || out.string.value.is_bottom() {
        out = out.with_num(NumLattice::top());
    }
    out
}

/// The property key an element access resolves to.
fn property_key(key: &BValue) -> String {
    if key.number.value.is_bottom()
        && let Some(s) = key.string.value.exact_value()
    {
        return s.to_string();
    }
    if key.string.value.is_bottom()
        && let Some(n) = key.number.value.exact_value()
    {
        return n.to_string();
    }
    UNKNOWN_PROPERTY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::builtins::initial_store;
    use crate::config::AnalysisConfig;
    use deltaflow_js::{AstBuilder, CfgMap, ChangeType};

    fn setup() -> (State, AnalysisContext) {
        let mut state = State::empty(Address::builtin(Builtin::GlobalBinding));
        state.store = initial_store();
        (state, AnalysisContext::new(CfgMap::new(), AnalysisConfig::default()))
    }

    #[test]
    fn changed_literal_is_changed() {
        let (mut state, mut cx) = setup();
        let mut b = AstBuilder::new();
        let two = b.num(2.0).with_change(ChangeType::Updated);
        let v = ExpEval::new(&mut state, &mut cx).eval(&two).unwrap();
        assert_eq!(v.change, Change::Changed);
        assert_eq!(v.number.value.exact_value(), Some(2.0));
        assert!(v.definers.contains(two.id));
    }

    #[test]
    fn assignment_to_unknown_name_creates_binding() {
        let (mut state, mut cx) = setup();
        let mut b = AstBuilder::new();
        let x = b.name("x");
        let one = b.num(1.0);
        let assign = b.assign(x.clone(), one);
        let mut ev = ExpEval::new(&mut state, &mut cx);
        ev.eval(&assign).unwrap();
        let v = ev.resolve_value(&x).unwrap();
        assert_eq!(v.number.value.exact_value(), Some(1.0));
        assert!(state.env.contains("x"));
    }

    #[test]
    fn property_of_primitive_gets_placeholder_object() {
        let (mut state, mut cx) = setup();
        let mut b = AstBuilder::new();
        let a = b.name("a");
        let get = b.prop(a.clone(), "b");
        let mut ev = ExpEval::new(&mut state, &mut cx);
        let v = ev.eval(&get).unwrap();
        assert_eq!(v.change, Change::Bottom);
        let base = ev.resolve_value(&a).unwrap();
        assert_eq!(base.addresses.value.len(), 1);
    }

    #[test]
    fn object_literal_properties_are_readable() {
        let (mut state, mut cx) = setup();
        let mut b = AstBuilder::new();
        let s = b.string("hi");
        let lit = b.object(vec![("greeting", s)]);
        let o = b.name("o");
        let assign = b.assign(o.clone(), lit);
        let key = b.string("greeting");
        let elem = b.elem(o, key);
        let mut ev = ExpEval::new(&mut state, &mut cx);
        ev.eval(&assign).unwrap();
        let v = ev.eval(&elem).unwrap();
        assert_eq!(v.string.value.exact_value(), Some("hi"));
    }

    #[test]
    fn binary_on_changed_operand_is_changed() {
        let (mut state, mut cx) = setup();
        let mut b = AstBuilder::new();
        let l = b.num(1.0).with_change(ChangeType::Inserted);
        let r = b.num(2.0);
        let sum = b.binary(BinaryOp::Add, l, r);
        let v = ExpEval::new(&mut state, &mut cx).eval(&sum).unwrap();
        assert_eq!(v.change, Change::Changed);
        assert_eq!(v.dependent, Change::Changed);
        assert!(v.string.value.is_bottom());
        assert!(v.number.value.is_top());
    }

    #[test]
    fn element_keys() {
        let u = Change::Unchanged;
        assert_eq!(property_key(&BValue::of_num(NumLattice::exact(3.0), u)), "3");
        assert_eq!(property_key(&BValue::of_str(StrLattice::exact("k"), u)), "k");
        assert_eq!(property_key(&BValue::top(u, u, u)), UNKNOWN_PROPERTY);
    }
}
