use crate::analysis::domain::Address;
use crate::analysis::engine::AnalysisContext;
use crate::analysis::engine::call::{Invocation, run_closure};
use crate::analysis::memory::{Closure, FunctionClosure};
use crate::analysis::state::{Control, RETVAL, Scratchpad, State};
use crate::error::AnalysisError;
use std::collections::BTreeSet;
use tracing::debug;

/// Names that stay visible once the frame of `state` is gone: its locals, its return value
/// and object literals passed as arguments (bound under their numeric node id).
fn is_public(name: &str, locals: Option<&BTreeSet<String>>) -> bool {
    locals.is_none_or(|l| l.contains(name))
        || name == RETVAL
        || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
}

/// Analyze functions that are reachable from the public bindings of `state` but have never
/// been called, so that every function ends up with results.
///
/// With `locals` unset every binding is public.
pub fn analyze_env_reachable(
    cx: &mut AnalysisContext,
    state: &State,
    locals: Option<&BTreeSet<String>>,
) -> Result<(), AnalysisError> {
    if !cx.config.analyze_reachable {
        return Ok(());
    }
    let roots: Vec<Address> = state
        .env
        .iter()
        .filter(|(name, _)| is_public(name.as_str(), locals))
        .flat_map(|(_, var)| var.addresses.iter().copied())
        .collect();
    let mut sweep = Sweep {
        state,
        visited: BTreeSet::new(),
    };
    for cell in roots {
        sweep.cell(cx, cell)?;
    }
    Ok(())
}

struct Sweep<'a> {
    state: &'a State,
    visited: BTreeSet<Address>,
}

impl Sweep<'_> {
    fn cell(&mut self, cx: &mut AnalysisContext, cell: Address) -> Result<(), AnalysisError> {
        if !self.visited.insert(cell) {
            return Ok(());
        }
        let Some(value) = self.state.store.value(&cell) else {
            return Ok(());
        };
        let targets: Vec<Address> = value.addresses.value.iter().copied().collect();
        for obj in targets {
            self.object(cx, obj, cell)?;
        }
        Ok(())
    }

    /// Visit the object at `addr`, reached through the value cell `holder`.
    fn object(
        &mut self,
        cx: &mut AnalysisContext,
        addr: Address,
        holder: Address,
    ) -> Result<(), AnalysisError> {
        if !self.visited.insert(addr) {
            return Ok(());
        }
        let state = self.state;
        let Some(obj) = state.store.get_obj(&addr) else {
            return Ok(());
        };
        let uncalled: Vec<FunctionClosure> = obj
            .closures()
            .functions()
            .filter(|f| !cx.results.is_analyzed(f.function) && cx.cfgs.get(f.function).is_some())
            .cloned()
            .collect();
        for function in uncalled {
            debug!(function = %function.function, "analyzing uncalled function");
            let invocation = Invocation {
                scratch: Scratchpad::new(),
                control: Control::new(),
                self_addr: holder,
                call_stack: vec![addr],
            };
            run_closure(cx, state.store.clone(), &Closure::Function(function), &invocation)?;
        }
        let props: Vec<Address> = obj.properties().map(|p| p.address).collect();
        for prop in props {
            self.cell(cx, prop)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_names() {
        let locals: BTreeSet<String> = ["f".to_string()].into();
        assert!(is_public("f", Some(&locals)));
        assert!(!is_public("g", Some(&locals)));
        assert!(is_public(RETVAL, Some(&locals)));
        assert!(is_public("42", Some(&locals)));
        assert!(is_public("g", None));
    }
}
