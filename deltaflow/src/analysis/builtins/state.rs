use crate::analysis::builtins::{BUILTIN_DEFINER, initial_store};
use crate::analysis::domain::{Address, Builtin};
use crate::analysis::engine::lift::{lift, lift_globals};
use crate::analysis::lattice::Change;
use crate::analysis::memory::{Environment, Variable};
use crate::analysis::state::{Control, Scratchpad, State, Trace};
use deltaflow_js::Cfg;

/// The state a script starts from: builtins in the store, `this` bound to the global object,
/// undeclared globals and the script's own declarations hoisted.
pub fn initial_state(cfg: &Cfg) -> State {
    let script = cfg.function();
    let global = Address::builtin(Builtin::GlobalBinding);
    let mut state = State::new(
        initial_store(),
        Environment::new(),
        Scratchpad::new(),
        Trace::new(script.id.0),
        Control::new(),
        global,
        vec![],
    );
    state
        .env
        .strong_update(Variable::at(BUILTIN_DEFINER, "this", Change::Unchanged, global));
    lift_globals(&mut state, script);
    lift(&mut state, script);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltaflow_js::{AstBuilder, CfgBuilder};
    use std::sync::Arc;

    #[test]
    fn script_declarations_are_hoisted() {
        let mut b = AstBuilder::new();
        let fetch = b.name("fetch");
        let use_fetch = b.expr_stmt(fetch);
        let decl = b.var("x", None);
        let script = b.script(vec![use_fetch, decl]);
        let mut builder = CfgBuilder::new(script);
        let entry = builder.entry();
        let exit = builder.exit();
        builder.edge(entry, exit);
        let cfg = Arc::new(builder.build().unwrap());

        let state = initial_state(&cfg);
        assert!(state.env.contains("this"));
        assert!(state.env.contains("fetch"));
        assert!(state.env.contains("x"));
        assert!(state.is_top_level());
        let this = state.store.apply(&state.self_addr);
        assert_eq!(this.single_address(), Some(Address::builtin(Builtin::Global)));
    }
}
