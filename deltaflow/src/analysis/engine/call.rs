//! Calls: evaluating call sites, applying closures and deciding when a callee has to be
//! re-analyzed.

use crate::analysis::domain::{Address, BValue, DefinerIds, JsClass, NumLattice};
use crate::analysis::engine::eval::{ExpEval, object_proto};
use crate::analysis::engine::lift::{lift_functions, lift_vars};
use crate::analysis::engine::reachable::analyze_env_reachable;
use crate::analysis::engine::{AnalysisContext, run};
use crate::analysis::lattice::{Change, JoinSemiLattice};
use crate::analysis::memory::{Closure, Environment, FunctionClosure, Obj, Property, Store, Variable};
use crate::analysis::state::{Control, Scratchpad, State, StateComparator, Trace};
use crate::error::AnalysisError;
use deltaflow_js::ast::visit;
use deltaflow_js::{Expr, ExprKind, FunctionNode, NodeId};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument, warn};

/// What a callee sees of its caller.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub scratch: Scratchpad,
    pub control: Control,
    /// The value cell `this` is bound to.
    pub self_addr: Address,
    /// Function objects being applied, the callee included.
    pub call_stack: Vec<Address>,
}

/// The joined effect of applying every closure a callee value may point to.
#[derive(Debug, Default)]
pub struct Application {
    /// `None` when no callee could be analyzed.
    pub state: Option<State>,
    /// Some callee was already on the call stack and was skipped.
    pub recursion: bool,
}

/// Apply every closure `callee` may point to, starting each from the caller's store.
pub fn apply_closure(
    cx: &mut AnalysisContext,
    caller: &State,
    callee: &BValue,
    invocation: &Invocation,
) -> Result<Application, AnalysisError> {
    let mut application = Application::default();
    for addr in callee.addresses.value.iter() {
        let Some(obj) = caller.store.get_obj(addr).filter(|o| o.is_function()) else {
            continue;
        };
        if invocation.call_stack.contains(addr) {
            warn!(callee = %addr, "skipping recursive call");
            application.recursion = true;
            continue;
        }
        let closures: Vec<Closure> = obj.closures().iter().cloned().collect();
        let mut inner = invocation.clone();
        inner.call_stack.push(*addr);
        for closure in &closures {
            if let Some(end) = run_closure(cx, caller.store.clone(), closure, &inner)? {
                match &mut application.state {
                    Some(acc) => acc.join(&end),
                    None => application.state = Some(end),
                }
            }
        }
    }
    Ok(application)
}

/// Run one closure from `store`. Natives return their fixed value without touching the store.
pub fn run_closure(
    cx: &mut AnalysisContext,
    store: Store,
    closure: &Closure,
    invocation: &Invocation,
) -> Result<Option<State>, AnalysisError> {
    match closure {
        Closure::Native(native) => {
            let mut scratch = Scratchpad::new();
            scratch.set_retval(Some(native.returns.value(Change::Unchanged)));
            Ok(Some(State::new(
                store,
                Environment::new(),
                scratch,
                Trace::new(0),
                invocation.control.clone(),
                invocation.self_addr,
                invocation.call_stack.clone(),
            )))
        }
        Closure::Function(function) => run_function(cx, store, function, invocation),
    }
}

/// Whether an argument value, or anything reachable from it, may have changed.
fn args_may_change(store: &Store, args: &[BValue]) -> bool {
    let mut visited = HashSet::new();
    let mut stack: Vec<&BValue> = args.iter().collect();
    while let Some(value) = stack.pop() {
        if value.may_change() {
            return true;
        }
        for addr in value.addresses.value.iter() {
            if !visited.insert(*addr) {
                continue;
            }
            if let Some(obj) = store.get_obj(addr) {
                stack.extend(obj.properties().filter_map(|p| store.value(&p.address)));
            }
        }
    }
    false
}

/// Build the callee's entry state from the caller's store.
fn prime_state(
    store: Store,
    function: &FunctionClosure,
    node: &FunctionNode,
    invocation: &Invocation,
) -> State {
    let fid = function.function;
    let mut state = State::new(
        store,
        function.env.clone(),
        invocation.scratch.clone(),
        Trace::new(0).enter(fid),
        invocation.control.clone(),
        invocation.self_addr,
        invocation.call_stack.clone(),
    );
    lift_vars(&mut state, node);

    let args = invocation.scratch.args();
    let mut arg_cells = Vec::with_capacity(args.len().max(node.params.len()));
    for (i, param) in node.params.iter().enumerate() {
        let cell = state.trace.make_addr(param.id, "");
        let value = args.get(i).cloned().unwrap_or_else(|| {
            BValue::top(Change::conv(param.change), Change::Unchanged, Change::Unchanged)
        });
        state.store.alloc_value(cell, value);
        state.env.strong_update(Variable::at(
            param.id,
            &param.name,
            Change::conv(param.change),
            cell,
        ));
        arg_cells.push(cell);
    }
    for (i, extra) in args.iter().enumerate().skip(node.params.len()) {
        let cell = state.trace.make_addr(fid, &i.to_string());
        state.store.alloc_value(cell, extra.clone());
        arg_cells.push(cell);
    }

    let trace = state.trace;
    let arguments = trace.mod_addr(trace.make_addr(fid, ""), JsClass::Arguments);
    let mut obj = Obj::new(JsClass::Arguments).with_prototype(object_proto());
    for (i, cell) in arg_cells.iter().enumerate() {
        obj.insert(Property::new(fid, &i.to_string(), Change::Unchanged, *cell));
    }
    let length = trace.make_addr(fid, "length");
    state.store.alloc_value(
        length,
        BValue::of_num(NumLattice::exact(args.len() as f64), Change::Unchanged),
    );
    obj.insert(Property::new(fid, "length", Change::Unchanged, length));
    state.store.alloc_obj(arguments, obj);
    let binding = trace.make_addr(fid, "arguments");
    state.store.alloc_value(
        binding,
        BValue::of_address(arguments, Change::Unchanged),
    );
    state
        .env
        .strong_update(Variable::at(fid, "arguments", Change::Unchanged, binding));

    lift_functions(&mut state, node);
    state
        .env
        .strong_update(Variable::at(fid, "this", Change::Unchanged, invocation.self_addr));
    state
}

/// The recorded exit state of `function` with the caller's store joined in.
fn memoized_exit(cx: &AnalysisContext, function: NodeId, store: &Store) -> Option<State> {
    cx.results.exit(function).cloned().map(|mut exit| {
        exit.store.join(store);
        exit
    })
}

/// Analyze a user function, or reuse its recorded exit state when the new entry state adds
/// nothing to what it was last analyzed with.
#[instrument(skip_all, fields(function = %function.function))]
fn run_function(
    cx: &mut AnalysisContext,
    store: Store,
    function: &FunctionClosure,
    invocation: &Invocation,
) -> Result<Option<State>, AnalysisError> {
    let fid = function.function;
    let Some(cfg) = cx.cfg(fid) else {
        warn!(%fid, "no cfg for callee");
        return Ok(None);
    };
    if cx.check_timeout() {
        return Ok(memoized_exit(cx, fid, &store));
    }

    let caller_store = store.clone();
    let prime = prime_state(store, function, cfg.function(), invocation);
    let rerun = match cx.results.entry(fid) {
        None => true,
        Some(prior) => {
            (!prior.control.condition.is_changed() && prime.control.condition.is_changed())
                || args_may_change(&prime.store, invocation.scratch.args())
                || !StateComparator::new(prior, &prior.joined(&prime)).equivalent()
        }
    };
    if !rerun {
        debug!(%fid, "entry state already covered");
        return Ok(memoized_exit(cx, fid, &caller_store));
    }

    let outcome = run(cx, &cfg, prime)?;
    let locals: BTreeSet<String> = visit::var_declarations(cfg.function())
        .into_iter()
        .map(|ident| ident.name.clone())
        .chain(
            visit::function_declarations(cfg.function())
                .into_iter()
                .filter_map(|f| f.name().map(str::to_string)),
        )
        .collect();
    analyze_env_reachable(cx, &outcome.state, Some(&locals))?;
    Ok(Some(outcome.state))
}

/// Function objects reachable from `values` through object properties.
fn callbacks(store: &Store, values: &[BValue]) -> Vec<Address> {
    let mut out = vec![];
    let mut visited = HashSet::new();
    let mut stack: Vec<Address> = values
        .iter()
        .flat_map(|v| v.addresses.value.iter().copied())
        .collect();
    while let Some(addr) = stack.pop() {
        if !visited.insert(addr) {
            continue;
        }
        let Some(obj) = store.get_obj(&addr) else {
            continue;
        };
        if obj.closures().functions().next().is_some() {
            out.push(addr);
        }
        for prop in obj.properties() {
            stack.extend(store.apply(&prop.address).addresses.value.iter().copied());
        }
    }
    out
}

impl ExpEval<'_> {
    /// Evaluate `callee(args)`, or `new callee(args)` when `is_new` is set.
    pub(crate) fn eval_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
        is_new: bool,
    ) -> Result<BValue, AnalysisError> {
        let c = Change::conv(expr.change);
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(arg)?;
            if let ExprKind::Object(_) = arg.unparen().kind {
                // Keep object literal arguments alive as pseudo-variables named by their id.
                let cell = self.state.trace.make_addr(arg.id, "");
                self.state.store.alloc_value(cell, value.clone());
                self.state.env.strong_update(Variable::at(
                    arg.id,
                    &arg.id.to_string(),
                    Change::conv(arg.change),
                    cell,
                ));
            }
            values.push(value);
        }
        let pending = callbacks(&self.state.store, &values);

        let fun_val = self.resolve_value(callee)?;
        let mut self_addr = match &callee.unparen().kind {
            ExprKind::PropertyGet { target, .. } | ExprKind::ElementGet { target, .. } => {
                let receiver = self.resolve_value(target)?;
                let cell = self.state.trace.to_addr("this");
                self.state.store.alloc_value(cell, receiver);
                cell
            }
            _ => self.state.self_addr,
        };
        let mut created = None;
        if is_new {
            let trace = self.state.trace;
            let obj_addr = trace.mod_addr(trace.make_addr(expr.id, ""), JsClass::Object);
            self.state.store.alloc_obj(
                obj_addr,
                Obj::new(JsClass::Object).with_prototype(object_proto()),
            );
            self_addr = trace.make_addr(expr.id, "this");
            self.state
                .store
                .alloc_value(self_addr, BValue::of_address(obj_addr, c));
            created = Some(obj_addr);
        }

        let invocation = Invocation {
            scratch: Scratchpad::with_args(values.clone()),
            control: self.state.control.for_call(expr),
            self_addr,
            call_stack: self.state.call_stack.clone(),
        };
        let application = apply_closure(self.cx, self.state, &fun_val, &invocation)?;
        let mut ret = application
            .state
            .as_ref()
            .and_then(|s| s.scratch.retval().cloned())
            .unwrap_or_else(|| BValue::undefined(c));
        if application.recursion || application.state.is_none() {
            ret.join(&BValue::top(c, c, Change::Unchanged));
        }
        if c.may_change() || fun_val.may_change() {
            ret.change = Change::Top;
        }
        ret.definers.join(&DefinerIds::single(expr.id));
        if let Some(obj_addr) = created {
            ret = BValue::of_address(obj_addr, ret.change).with_definers(ret.definers);
        }
        if let Some(end) = application.state {
            self.state.store = end.store;
        }

        for cb in pending {
            if self.state.call_stack.contains(&cb) {
                continue;
            }
            let Some(obj) = self.state.store.get_obj(&cb) else {
                continue;
            };
            let functions: Vec<FunctionClosure> = obj
                .closures()
                .functions()
                .filter(|f| !self.cx.results.is_analyzed(f.function))
                .cloned()
                .collect();
            let mut call_stack = self.state.call_stack.clone();
            call_stack.push(cb);
            for function in functions {
                debug!(callback = %cb, function = %function.function, "analyzing callback");
                let invocation = Invocation {
                    scratch: Scratchpad::new(),
                    control: Control::new(),
                    self_addr: self.state.self_addr,
                    call_stack: call_stack.clone(),
                };
                let closure = Closure::Function(function);
                if let Some(end) =
                    run_closure(self.cx, self.state.store.clone(), &closure, &invocation)?
                {
                    self.state.store = end.store;
                }
            }
        }

        if self.cx.config.gc_after_call && self.state.is_top_level() {
            let mut extra: Vec<Address> = ret.addresses.value.iter().copied().collect();
            extra.extend(values.iter().flat_map(|v| v.addresses.value.iter().copied()));
            extra.extend(fun_val.addresses.value.iter().copied());
            self.state.collect_garbage(extra);
        }
        Ok(ret)
    }
}
