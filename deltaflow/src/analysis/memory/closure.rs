use crate::analysis::domain::{BValue, BoolLattice, Name, NumLattice, StrLattice};
use crate::analysis::lattice::{
    BoundedLattice, Change, JoinSemiLattice, impl_partial_ord_via_join,
};
use crate::analysis::memory::environment::Environment;
use deltaflow_js::NodeId;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// The shape of the value a native function returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NativeReturn {
    /// Anything at all.
    Top,
    StrTop,
    NumTop,
    BoolTop,
    /// Any primitive value.
    Primitive,
    Undefined,
}

impl NativeReturn {
    pub fn value(&self, change: Change) -> BValue {
        let u = Change::Unchanged;
        match self {
            NativeReturn::Top => BValue::top(change, u, u),
            NativeReturn::Primitive => BValue::primitive(change, u, u),
            NativeReturn::StrTop => BValue::of_str(StrLattice::top(), u).with_change(change),
            NativeReturn::NumTop => BValue::of_num(NumLattice::top(), u).with_change(change),
            NativeReturn::BoolTop => BValue::of_bool(BoolLattice::Top, u).with_change(change),
            NativeReturn::Undefined => BValue::undefined(u).with_change(change),
        }
    }
}

/// A builtin function simulated by a fixed return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeClosure {
    pub name: Name,
    pub returns: NativeReturn,
}

/// A user function: its CFG (looked up by function id) and the environment it closes over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionClosure {
    pub function: NodeId,
    pub env: Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Closure {
    Function(FunctionClosure),
    Native(NativeClosure),
}

impl Closure {
    pub fn function(function: NodeId, env: Environment) -> Self {
        Closure::Function(FunctionClosure { function, env })
    }

    pub fn native(name: &str, returns: NativeReturn) -> Self {
        Closure::Native(NativeClosure {
            name: Name::new(name),
            returns,
        })
    }

    pub fn as_function(&self) -> Option<&FunctionClosure> {
        match self {
            Closure::Function(f) => Some(f),
            Closure::Native(_) => None,
        }
    }

    /// What the closure calls. Two closures with the same identity differ only in the
    /// environment they capture.
    pub fn identity(&self) -> ClosureId {
        match self {
            Closure::Native(n) => ClosureId::Native(n.name),
            Closure::Function(f) => ClosureId::Function(f.function),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClosureId {
    Native(Name),
    Function(NodeId),
}

/// Every callable an object may stand for.
///
/// Joining objects created at different sites can merge different functions into one
/// object; calling it then applies each of them. Closures of the same function join their
/// captured environments.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Closures(BTreeMap<ClosureId, Closure>);

impl Closures {
    pub fn single(closure: Closure) -> Self {
        let mut closures = Self::default();
        closures.insert(closure);
        closures
    }

    pub fn insert(&mut self, closure: Closure) {
        match self.0.entry(closure.identity()) {
            Entry::Occupied(mut e) => {
                if let (Closure::Function(a), Closure::Function(b)) = (e.get_mut(), &closure) {
                    a.env.join(&b.env);
                }
            }
            Entry::Vacant(e) => {
                e.insert(closure);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Closure> {
        self.0.values()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionClosure> {
        self.iter().filter_map(Closure::as_function)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl JoinSemiLattice for Closures {
    fn join(&mut self, other: &Self) {
        for closure in other.iter() {
            self.insert(closure.clone());
        }
    }
}

impl_partial_ord_via_join!(Closures);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::address::tests::addr;
    use crate::analysis::memory::environment::Variable;

    #[test]
    fn same_function_joins_environment() {
        let mut env_a = Environment::new();
        env_a.strong_update(Variable::at(NodeId(1), "x", Change::Unchanged, addr(1)));
        let mut env_b = Environment::new();
        env_b.strong_update(Variable::at(NodeId(2), "y", Change::Unchanged, addr(2)));
        let mut a = Closures::single(Closure::function(NodeId(7), env_a));
        a.join(&Closures::single(Closure::function(NodeId(7), env_b)));
        assert_eq!(a.len(), 1);
        let envs: Vec<usize> = a.functions().map(|f| f.env.len()).collect();
        assert_eq!(envs, vec![2]);
    }

    #[test]
    fn different_callables_are_all_kept() {
        let a = Closures::single(Closure::function(NodeId(9), Environment::new()));
        let b = Closures::single(Closure::function(NodeId(4), Environment::new()));
        let n = Closures::single(Closure::native("keys", NativeReturn::Top));
        let joined = a.joined(&b).joined(&n);
        assert_eq!(joined.len(), 3);
        let ids: Vec<NodeId> = joined.functions().map(|f| f.function).collect();
        assert_eq!(ids, vec![NodeId(4), NodeId(9)]);
        assert!(a < joined);
        assert_eq!(b.joined(&a), a.joined(&b));
    }

    #[test]
    fn native_return_shapes() {
        let s = NativeReturn::StrTop.value(Change::Changed);
        assert!(s.string.value.is_top());
        assert!(s.number.value.is_bottom());
        assert_eq!(s.change, Change::Changed);
        assert!(NativeReturn::Undefined.value(Change::Unchanged).is_undefined());
        assert!(NativeReturn::Top.value(Change::Unchanged).null.value.is_present());
    }
}
