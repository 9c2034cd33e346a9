use super::*;
use crate::analysis::builtins::initial_state;
use crate::analysis::domain::BValue;
use deltaflow_js::{AstBuilder, BinaryOp, CfgBuilder, ChangeType, Expr, UnaryOp};

fn value_of(state: &State, name: &str) -> BValue {
    let var = state.env.apply(name).unwrap();
    let cell = var.addresses.singleton().unwrap();
    state.store.apply(&cell)
}

/// `var x = 1; if (c) { x = 2 } else { }`
fn diamond(b: &mut AstBuilder, changed_branch: bool) -> (Arc<Cfg>, Expr, [EdgeIndex; 2]) {
    let one = b.num(1.0);
    let decl = b.var("x", Some(one));
    let x = b.name("x");
    let two = b.num(2.0);
    let assign = b.assign(x, two);
    let then = b.expr_stmt(assign);
    let mut cond = b.name("c");
    if changed_branch {
        cond = cond.with_change(ChangeType::Updated);
    }
    let negated = b.unary(UnaryOp::Not, cond.clone());
    let branch = b.if_stmt(cond.clone(), vec![then.clone()], vec![]);
    let script = b.script(vec![decl.clone(), branch]);

    let mut builder = CfgBuilder::new(script);
    let entry = builder.entry();
    let d = builder.stmt(decl);
    let t = builder.stmt(then);
    let join = builder.empty();
    let exit = builder.exit();
    builder.edge(entry, d);
    let taken = builder.cond_edge(d, t, cond.clone());
    let other = builder.cond_edge(d, join, negated);
    builder.edge(t, join);
    builder.edge(join, exit);
    (Arc::new(builder.build().unwrap()), cond, [taken, other])
}

#[test]
fn test_run_joins_branches() {
    let mut b = AstBuilder::new();
    let (cfg, _, _) = diamond(&mut b, false);
    let mut cx = AnalysisContext::new(
        CfgMap::from_cfgs([(*cfg).clone()]).unwrap(),
        AnalysisConfig::default(),
    );
    let state = initial_state(&cfg);
    let outcome = run(&mut cx, &cfg, state).unwrap();
    assert!(!outcome.budget_exhausted);
    let x = value_of(&outcome.state, "x");
    assert!(x.number.value.exact_value().is_none());
    assert!(!x.number.value.is_nan());
    for node in cfg.graph().node_indices() {
        assert!(cx.results.node_after(cfg.function_id(), node).is_some());
    }
}

#[test]
fn test_changed_condition_reaches_control() {
    let mut b = AstBuilder::new();
    let (cfg, cond, [taken, other]) = diamond(&mut b, true);
    let mut cx = AnalysisContext::new(
        CfgMap::from_cfgs([(*cfg).clone()]).unwrap(),
        AnalysisConfig::default(),
    );
    let state = initial_state(&cfg);
    run(&mut cx, &cfg, state).unwrap();
    let after = cx.results.edge_after(cfg.function_id(), taken).unwrap();
    assert!(after.control.condition.conditions.contains(&cond.id));
    let after = cx.results.edge_after(cfg.function_id(), other).unwrap();
    assert!(!after.control.condition.is_changed());
    assert!(after.control.condition.negated.contains(&cond.id));
}

/// `var i = 0; while (i < 10) { i = i + 1 }`
fn counting_loop(b: &mut AstBuilder) -> Arc<Cfg> {
    let zero = b.num(0.0);
    let decl = b.var("i", Some(zero));
    let i = b.name("i");
    let ten = b.num(10.0);
    let test = b.binary(BinaryOp::Lt, i.clone(), ten);
    let not_test = b.unary(UnaryOp::Not, test.clone());
    let one = b.num(1.0);
    let inc = b.binary(BinaryOp::Add, i.clone(), one);
    let assign = b.assign(i, inc);
    let body = b.expr_stmt(assign);
    let script = b.script(vec![decl.clone(), body.clone()]);

    let mut builder = CfgBuilder::new(script);
    let entry = builder.entry();
    let d = builder.stmt(decl);
    let head = builder.empty();
    let body = builder.stmt(body);
    let exit = builder.exit();
    builder.edge(entry, d);
    builder.edge(d, head);
    builder.cond_edge(head, body, test);
    builder.cond_edge(head, exit, not_test);
    builder.loop_edge(body, head);
    Arc::new(builder.build().unwrap())
}

#[test]
fn test_loop_reaches_fixpoint() {
    let mut b = AstBuilder::new();
    let cfg = counting_loop(&mut b);
    let mut cx = AnalysisContext::new(
        CfgMap::from_cfgs([(*cfg).clone()]).unwrap(),
        AnalysisConfig::default(),
    );
    let state = initial_state(&cfg);
    let outcome = run(&mut cx, &cfg, state).unwrap();
    assert!(!outcome.budget_exhausted);
    assert!(!cx.budget_exhausted());
    let i = value_of(&outcome.state, "i");
    assert!(i.number.value.may_be_zero());
    assert!(i.number.value.exact_value().is_none());
}

#[test]
fn test_budget_exhaustion_is_reported() {
    let mut b = AstBuilder::new();
    let cfg = counting_loop(&mut b);
    let mut cx = AnalysisContext::new(
        CfgMap::from_cfgs([(*cfg).clone()]).unwrap(),
        AnalysisConfig::default().with_edge_budget(2),
    );
    let state = initial_state(&cfg);
    let outcome = run(&mut cx, &cfg, state).unwrap();
    assert!(outcome.budget_exhausted);
    assert!(cx.budget_exhausted());
    assert!(cx.results.exit(cfg.function_id()).is_some());
}

#[test]
fn test_entry_state_accumulates() {
    let mut b = AstBuilder::new();
    let cfg = counting_loop(&mut b);
    let mut cx = AnalysisContext::new(
        CfgMap::from_cfgs([(*cfg).clone()]).unwrap(),
        AnalysisConfig::default(),
    );
    run(&mut cx, &cfg, initial_state(&cfg)).unwrap();
    let first = cx.results.entry(cfg.function_id()).cloned().unwrap();
    run(&mut cx, &cfg, initial_state(&cfg)).unwrap();
    let second = cx.results.entry(cfg.function_id()).unwrap();
    assert!(first <= *second);
    assert!(cx.results.is_analyzed(cfg.function_id()));
}
