use crate::analysis::domain::Address;
use crate::analysis::state::State;
use std::collections::HashSet;

/// Decides whether a function's recorded entry state already covers a new entry state.
///
/// Two states are equivalent when their environments are equal and every value and object
/// reachable from the environment is equal in both stores. A new state whose control domain
/// carries changed conditions is never covered by a prior state without any.
pub struct StateComparator<'a> {
    prior: &'a State,
    next: &'a State,
    visited: HashSet<Address>,
}

impl<'a> StateComparator<'a> {
    pub fn new(prior: &'a State, next: &'a State) -> Self {
        Self {
            prior,
            next,
            visited: HashSet::new(),
        }
    }

    pub fn equivalent(mut self) -> bool {
        if self.prior.env != self.next.env {
            return false;
        }
        if !self.prior.control.condition.is_changed() && self.next.control.condition.is_changed()
        {
            return false;
        }
        let roots: Vec<Address> = self.prior.env.addresses().copied().collect();
        roots.into_iter().all(|addr| self.same_cell(addr))
    }

    fn same_cell(&mut self, addr: Address) -> bool {
        if !self.visited.insert(addr) {
            return true;
        }
        let left = self.prior.store.value(&addr);
        if left != self.next.store.value(&addr) {
            return false;
        }
        let Some(value) = left else {
            return true;
        };
        let targets: Vec<Address> = value.addresses.value.iter().copied().collect();
        targets.into_iter().all(|obj| self.same_object(obj))
    }

    fn same_object(&mut self, addr: Address) -> bool {
        let left = self.prior.store.get_obj(&addr);
        if left != self.next.store.get_obj(&addr) {
            return false;
        }
        let Some(obj) = left else {
            return true;
        };
        let props: Vec<Address> = obj.properties().map(|p| p.address).collect();
        props.into_iter().all(|p| self.same_cell(p))
    }
}
