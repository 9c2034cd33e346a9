//! The abstract machine state threaded through the worklist.

pub mod compare;
pub mod control;
pub mod scratchpad;
pub mod trace;

use crate::analysis::domain::Address;
use crate::analysis::lattice::{
    JoinSemiLattice, MergeOutcome, impl_partial_ord_via_join, merge_join,
};
use crate::analysis::memory::{Environment, Store};
use std::fmt::{Display, Formatter};

pub use compare::StateComparator;
pub use control::{Control, ControlCall, ControlCondition};
pub use scratchpad::Scratchpad;
pub use trace::Trace;

/// Name of the environment binding that aliases the return value of the current function.
pub const RETVAL: &str = "~retval~";

/// The abstract state at one program point.
///
/// Joins combine the memory, scratchpad and control components; the trace, self address and
/// call stack describe the activation and are taken from the left-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub store: Store,
    pub env: Environment,
    pub scratch: Scratchpad,
    pub trace: Trace,
    pub control: Control,
    /// Value cell holding what `this` points to.
    pub self_addr: Address,
    /// Function objects currently being applied, innermost last.
    pub call_stack: Vec<Address>,
}

impl State {
    pub fn new(
        store: Store,
        env: Environment,
        scratch: Scratchpad,
        trace: Trace,
        control: Control,
        self_addr: Address,
        call_stack: Vec<Address>,
    ) -> Self {
        Self {
            store,
            env,
            scratch,
            trace,
            control,
            self_addr,
            call_stack,
        }
    }

    /// A state with empty memory.
    pub fn empty(self_addr: Address) -> Self {
        Self::new(
            Store::new(),
            Environment::new(),
            Scratchpad::new(),
            Trace::new(0),
            Control::new(),
            self_addr,
            vec![],
        )
    }

    /// Join `other` into `self`, reporting whether anything grew.
    pub fn merge(&mut self, other: &State) -> MergeOutcome {
        let mut outcome = MergeOutcome::NoOp;
        outcome += merge_join(&mut self.store, &other.store);
        outcome += merge_join(&mut self.env, &other.env);
        outcome += merge_join(&mut self.scratch, &other.scratch);
        outcome += merge_join(&mut self.control, &other.control);
        outcome
    }

    /// Join an optional state into `self`.
    pub fn join_opt(mut self, other: Option<&State>) -> Self {
        if let Some(other) = other {
            self.join(other);
        }
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.call_stack.is_empty()
    }
}

impl JoinSemiLattice for State {
    fn join(&mut self, other: &Self) {
        self.store.join(&other.store);
        self.env.join(&other.env);
        self.scratch.join(&other.scratch);
        self.control.join(&other.control);
    }
}

impl_partial_ord_via_join!(State);

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "env: {}", self.env)?;
        writeln!(f, "self: {}", self.self_addr)?;
        if let Some(ret) = self.scratch.retval() {
            writeln!(f, "retval: {ret}")?;
        }
        write!(f, "{}", self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::address::tests::addr;
    use crate::analysis::domain::{BValue, NumLattice};
    use crate::analysis::lattice::Change;
    use crate::analysis::memory::Variable;
    use deltaflow_js::NodeId;

    #[test]
    fn merge_reports_growth() {
        let mut a = State::empty(addr(0));
        let mut b = State::empty(addr(0));
        b.env
            .strong_update(Variable::at(NodeId(1), "x", Change::Unchanged, addr(1)));
        b.store.alloc_value(
            addr(1),
            BValue::of_num(NumLattice::exact(1.0), Change::Unchanged),
        );
        assert!(a.merge(&b).merged());
        assert!(!a.merge(&b).merged());
        assert_eq!(a.env.apply("x"), b.env.apply("x"));
    }

    #[test]
    fn join_keeps_activation_of_left() {
        let mut a = State::empty(addr(0));
        let mut b = State::empty(addr(5));
        b.trace.update(7);
        b.call_stack.push(addr(9));
        a.join(&b);
        assert_eq!(a.self_addr, addr(0));
        assert_eq!(a.trace.point(), 0);
        assert!(a.is_top_level());
    }
}
