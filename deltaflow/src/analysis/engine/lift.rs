//! Hoisting of `var` and function declarations to the top of their function.

use crate::analysis::builtins::store::GLOBAL_NAMES;
use crate::analysis::domain::{Address, BValue, Builtin, DefinerIds, JsClass, NumLattice};
use crate::analysis::lattice::{BoundedLattice, Change};
use crate::analysis::memory::{Closure, Environment, Obj, Property, Variable};
use crate::analysis::state::State;
use deltaflow_js::ast::visit;
use deltaflow_js::{FunctionNode, NodeId};
use std::sync::Arc;
use tracing::trace;

/// Definer id of the first undeclared global; later ones count down from here.
const FIRST_GLOBAL_DEFINER: i32 = -1000;

/// Bind every `var` declared in `function` to a cell holding `undefined`.
pub fn lift_vars(state: &mut State, function: &FunctionNode) {
    for ident in visit::var_declarations(function) {
        let change = Change::conv(ident.change);
        let cell = state.trace.make_addr(ident.id, "");
        state.store.alloc_value(
            cell,
            BValue::undefined(change).with_change(Change::Unchanged),
        );
        state
            .env
            .strong_update(Variable::at(ident.id, &ident.name, change, cell));
    }
}

/// Bind every function declared in `function`. The closures are created once all names
/// are bound, so they capture one another.
pub fn lift_functions(state: &mut State, function: &FunctionNode) {
    let mut lifted = vec![];
    for decl in visit::function_declarations(function) {
        let Some(name) = &decl.name else {
            continue;
        };
        let trace = state.trace;
        let addr = trace.mod_addr(trace.make_addr(decl.id, ""), JsClass::Function);
        state.env.strong_update(Variable::at(
            decl.id,
            &name.name,
            Change::conv(name.change),
            addr,
        ));
        state.store.alloc_value(
            addr,
            BValue::of_address(addr, Change::conv(decl.change))
                .with_definers(DefinerIds::single(decl.id)),
        );
        lifted.push((addr, decl));
    }
    for (addr, decl) in lifted {
        let env = state.env.clone();
        let obj = create_function_obj(state, decl, env);
        state.store.alloc_obj(addr, obj);
    }
}

/// Hoist the declarations of `function` into `state`.
pub fn lift(state: &mut State, function: &FunctionNode) {
    lift_vars(state, function);
    lift_functions(state, function);
}

/// A callable object for `function` closing over `env`.
pub fn create_function_obj(state: &mut State, function: &FunctionNode, env: Environment) -> Obj {
    let length = state.trace.make_addr(function.id, "length");
    state.store.alloc_value(
        length,
        BValue::of_num(NumLattice::top(), Change::Unchanged),
    );
    let mut obj = Obj::new(JsClass::Function)
        .with_prototype(BValue::of_address(
            Address::builtin(Builtin::FunctionProto),
            Change::Unchanged,
        ))
        .with_closure(Closure::function(function.id, env));
    obj.insert(Property::new(
        function.id,
        "length",
        Change::Unchanged,
        length,
    ));
    obj
}

/// Bind names the script uses without declaring them anywhere to unknown values.
pub fn lift_globals(state: &mut State, root: &Arc<FunctionNode>) {
    let u = Change::Unchanged;
    let names = visit::undeclared_names(root);
    for (i, name) in names
        .iter()
        .filter(|n| !GLOBAL_NAMES.contains(&n.as_str()))
        .enumerate()
    {
        let definer = NodeId(FIRST_GLOBAL_DEFINER - i as i32);
        let cell = state.trace.make_addr(definer, "");
        state.store.alloc_value(cell, BValue::top(u, u, u));
        state.env.strong_update(Variable::at(definer, name, u, cell));
        trace!(name, %definer, "lifted global");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::address::tests::addr;
    use deltaflow_js::AstBuilder;

    #[test]
    fn vars_start_undefined() {
        let mut b = AstBuilder::new();
        let decl = b.var("x", None);
        let script = b.script(vec![decl]);
        let mut state = State::empty(addr(0));
        lift(&mut state, &script);
        let var = state.env.apply("x").unwrap();
        let cell = var.addresses.singleton().unwrap();
        assert!(state.store.apply(&cell).is_undefined());
    }

    #[test]
    fn functions_capture_each_other() {
        let mut b = AstBuilder::new();
        let f = b.function(Some("f"), &[], vec![]);
        let g = b.function(Some("g"), &[], vec![]);
        let f_decl = b.func_decl(f.clone());
        let g_decl = b.func_decl(g);
        let script = b.script(vec![f_decl, g_decl]);
        let mut state = State::empty(addr(0));
        lift(&mut state, &script);
        let f_addr = state.env.apply("f").unwrap().addresses.singleton().unwrap();
        let f_obj = state.store.get_obj(&f_addr).unwrap();
        let closure = f_obj.closures().functions().next().unwrap();
        assert_eq!(closure.function, f.id);
        assert!(closure.env.contains("g"));
        assert_eq!(
            state.store.apply(&f_addr).single_address(),
            Some(f_addr)
        );
    }

    #[test]
    fn undeclared_names_become_unknown_globals() {
        let mut b = AstBuilder::new();
        let window = b.name("window");
        let undef = b.name("undefined");
        let s1 = b.expr_stmt(window);
        let s2 = b.expr_stmt(undef);
        let script = b.script(vec![s1, s2]);
        let mut state = State::empty(addr(0));
        lift_globals(&mut state, &script);
        let var = state.env.apply("window").unwrap();
        assert_eq!(var.definer, NodeId(FIRST_GLOBAL_DEFINER));
        assert!(!state.env.contains("undefined"));
    }
}
