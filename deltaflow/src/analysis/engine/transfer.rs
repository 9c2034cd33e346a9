use crate::analysis::domain::{Address, BValue};
use crate::analysis::engine::AnalysisContext;
use crate::analysis::engine::eval::ExpEval;
use crate::analysis::lattice::{Change, JoinSemiLattice};
use crate::analysis::memory::Variable;
use crate::analysis::state::{RETVAL, State};
use crate::error::AnalysisError;
use deltaflow_js::{Cfg, Expr, StmtKind};
use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::trace;

/// Program point of a node without a statement.
fn node_point(node: NodeIndex) -> i32 {
    -(node.index() as i32 + 1)
}

/// Program point of an edge without a condition.
fn edge_point(edge: EdgeIndex) -> i32 {
    -(edge.index() as i32 + 1)
}

impl State {
    /// Take `edge`: narrow along its condition and record the control dependence.
    pub fn transfer_edge(
        &mut self,
        cx: &mut AnalysisContext,
        cfg: &Cfg,
        edge: EdgeIndex,
    ) -> Result<(), AnalysisError> {
        let Some(cfg_edge) = cfg.edge(edge) else {
            return Ok(());
        };
        let condition = cfg_edge.condition.as_ref();
        self.trace
            .update(condition.map(|c| c.id.0).unwrap_or_else(|| edge_point(edge)));
        if let Some(cond) = condition {
            ExpEval::new(self, cx).interpret_condition(cond, false)?;
        }
        let siblings: Vec<&Expr> = cfg
            .siblings(edge)
            .into_iter()
            .filter_map(|e| cfg.edge(e))
            .filter_map(|e| e.condition.as_ref())
            .collect();
        self.control = self
            .control
            .update_edge(condition, siblings.iter().copied());
        Ok(())
    }

    /// Interpret the statement at `node`, if any.
    pub fn transfer_node(
        &mut self,
        cx: &mut AnalysisContext,
        cfg: &Cfg,
        node: NodeIndex,
    ) -> Result<(), AnalysisError> {
        let Some(stmt) = cfg.node(node).and_then(|n| n.stmt.as_ref()) else {
            self.trace.update(node_point(node));
            return Ok(());
        };
        self.trace.update(stmt.id.0);
        trace!(stmt = %stmt.id, "transfer");
        match &stmt.kind {
            StmtKind::Expression(expr) | StmtKind::Throw(expr) => {
                ExpEval::new(self, cx).eval(expr)?;
            }
            StmtKind::VarDecl(inits) => {
                for init in inits {
                    if let Some(expr) = &init.init {
                        let mut ev = ExpEval::new(self, cx);
                        let value = ev.eval(expr)?;
                        ev.assign_ident(&init.name, value);
                    }
                }
            }
            StmtKind::Return(value) => {
                let change = Change::conv(stmt.change);
                let mut ret = match value {
                    Some(expr) => ExpEval::new(self, cx).eval(expr)?,
                    None => BValue::undefined(change),
                };
                if change.may_change() {
                    ret.change.join(&Change::Changed);
                }
                if let Some(prior) = self.scratch.retval() {
                    ret.join(prior);
                }
                let cell = self.trace.make_addr(stmt.id, "");
                self.store.alloc_value(cell, ret.clone());
                self.env
                    .strong_update(Variable::at(stmt.id, RETVAL, change, cell));
                self.scratch.set_retval(Some(ret));
            }
            _ => {}
        }
        Ok(())
    }

    /// Collect every store entry not reachable from the environment, the scratchpad, the
    /// self cell or `extra`.
    pub fn collect_garbage<I: IntoIterator<Item = Address>>(&mut self, extra: I) {
        let mut roots: Vec<Address> = self.env.addresses().copied().collect();
        roots.push(self.self_addr);
        if let Some(ret) = self.scratch.retval() {
            roots.extend(ret.addresses.value.iter().copied());
        }
        for arg in self.scratch.args() {
            roots.extend(arg.addresses.value.iter().copied());
        }
        roots.extend(extra);
        self.store.gc(roots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::builtins::initial_state;
    use crate::config::AnalysisConfig;
    use deltaflow_js::{AstBuilder, CfgBuilder, CfgMap, ChangeType};
    use std::sync::Arc;

    #[test]
    fn return_binds_retval() {
        let mut b = AstBuilder::new();
        let two = b.num(2.0).with_change(ChangeType::Updated);
        let ret = b.ret(Some(two));
        let script = b.script(vec![ret.clone()]);
        let mut builder = CfgBuilder::new(script);
        let entry = builder.entry();
        let node = builder.stmt(ret);
        let exit = builder.exit();
        builder.edge(entry, node);
        builder.edge(node, exit);
        let cfg = Arc::new(builder.build().unwrap());
        let mut cx = AnalysisContext::new(CfgMap::new(), AnalysisConfig::default());
        let mut state = initial_state(&cfg);
        state.transfer_node(&mut cx, &cfg, node).unwrap();
        let ret = state.scratch.retval().unwrap();
        assert_eq!(ret.change, Change::Changed);
        assert!(state.env.contains(RETVAL));
    }

    #[test]
    fn gc_keeps_rooted_cells() {
        use crate::analysis::domain::address::tests::addr;
        let mut state = State::empty(addr(0));
        state
            .env
            .strong_update(Variable::at(deltaflow_js::NodeId(1), "x", Change::Unchanged, addr(1)));
        state.store.alloc_value(addr(1), BValue::of_address(addr(2), Change::Unchanged));
        state.store.alloc_value(addr(3), BValue::null(Change::Unchanged));
        state.store.alloc_value(addr(4), BValue::null(Change::Unchanged));
        state.collect_garbage([addr(4)]);
        assert!(state.store.contains_value(&addr(1)));
        assert!(!state.store.contains_value(&addr(3)));
        assert!(state.store.contains_value(&addr(4)));
    }
}
