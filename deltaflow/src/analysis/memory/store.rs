use crate::analysis::domain::{Address, BValue};
use crate::analysis::lattice::{Change, JoinSemiLattice, impl_partial_ord_via_join};
use crate::analysis::memory::object::Obj;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use tracing::trace;

/// The abstract heap: value cells and object records, keyed by [Address].
///
/// The store is partial. Reading an address that was never allocated yields an unknown
/// value, not an error.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Store {
    values: BTreeMap<Address, BValue>,
    objects: BTreeMap<Address, Obj>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a freshly allocated cell.
    pub fn alloc_value(&mut self, addr: Address, value: BValue) {
        self.values.insert(addr, value);
    }

    pub fn alloc_obj(&mut self, addr: Address, obj: Obj) {
        self.objects.insert(addr, obj);
    }

    /// Overwrite the cell at `addr`. Only sound when `addr` is the single location an
    /// lvalue can denote.
    pub fn strong_update(&mut self, addr: Address, value: BValue) {
        self.values.insert(addr, value);
    }

    /// Join `value` into the cell at `addr`.
    pub fn weak_update(&mut self, addr: Address, value: BValue) {
        match self.values.get_mut(&addr) {
            Some(existing) => existing.join(&value),
            None => {
                self.values.insert(addr, value);
            }
        }
    }

    /// The value at `addr`, or an unknown primitive if the cell does not exist.
    pub fn apply(&self, addr: &Address) -> BValue {
        self.values.get(addr).cloned().unwrap_or_else(|| {
            BValue::top(Change::Unchanged, Change::Unchanged, Change::Unchanged)
        })
    }

    pub fn value(&self, addr: &Address) -> Option<&BValue> {
        self.values.get(addr)
    }

    pub fn get_obj(&self, addr: &Address) -> Option<&Obj> {
        self.objects.get(addr)
    }

    pub fn get_obj_mut(&mut self, addr: &Address) -> Option<&mut Obj> {
        self.objects.get_mut(addr)
    }

    pub fn contains_value(&self, addr: &Address) -> bool {
        self.values.contains_key(addr)
    }

    pub fn values(&self) -> impl Iterator<Item = (&Address, &BValue)> {
        self.values.iter()
    }

    pub fn objects(&self) -> impl Iterator<Item = (&Address, &Obj)> {
        self.objects.iter()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Addresses directly referenced by the cell and the object stored at `addr`.
    fn successors(&self, addr: &Address, out: &mut Vec<Address>) {
        if let Some(v) = self.values.get(addr) {
            out.extend(v.addresses.value.iter().copied());
        }
        if let Some(obj) = self.objects.get(addr) {
            out.extend(obj.properties().map(|p| p.address));
            if let Some(proto) = &obj.internal.prototype {
                out.extend(proto.addresses.value.iter().copied());
            }
            for f in obj.closures().functions() {
                out.extend(f.env.addresses().copied());
            }
        }
    }

    /// Every address reachable from `roots`.
    pub fn reachable<I: IntoIterator<Item = Address>>(&self, roots: I) -> BTreeSet<Address> {
        let mut marked = BTreeSet::new();
        let mut stack: Vec<Address> = roots.into_iter().collect();
        let mut next = vec![];
        while let Some(addr) = stack.pop() {
            if !marked.insert(addr) {
                continue;
            }
            next.clear();
            self.successors(&addr, &mut next);
            stack.extend(next.iter().filter(|a| !marked.contains(*a)));
        }
        marked
    }

    /// Drop every cell and object not reachable from `roots`. Builtins are always kept.
    pub fn gc<I: IntoIterator<Item = Address>>(&mut self, roots: I) {
        let live = self.reachable(roots);
        let before = (self.values.len(), self.objects.len());
        self.values.retain(|a, _| a.is_builtin() || live.contains(a));
        self.objects.retain(|a, _| a.is_builtin() || live.contains(a));
        trace!(
            values = before.0 - self.values.len(),
            objects = before.1 - self.objects.len(),
            "collected store"
        );
    }
}

impl JoinSemiLattice for Store {
    /// Pointwise join over the union of both key sets. When an object keeps only one of two
    /// divergent cells for a property, the dropped cell's value is folded into the kept one.
    fn join(&mut self, other: &Self) {
        let mut aliases = vec![];
        for (addr, obj) in &other.objects {
            match self.objects.get_mut(addr) {
                Some(existing) => aliases.extend(existing.join_aliasing(obj)),
                None => {
                    self.objects.insert(*addr, obj.clone());
                }
            }
        }
        for (addr, value) in &other.values {
            self.weak_update(*addr, value.clone());
        }
        for (kept, dropped) in aliases {
            if let Some(v) = self.values.get(&dropped).cloned() {
                self.weak_update(kept, v);
            }
        }
    }
}

impl_partial_ord_via_join!(Store);

impl Display for Store {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (addr, value) in &self.values {
            writeln!(f, "{addr} -> {value}")?;
        }
        for (addr, obj) in &self.objects {
            writeln!(f, "{addr} => {obj}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::address::tests::addr;
    use crate::analysis::domain::{Builtin, JsClass, NumLattice};
    use crate::analysis::lattice::BoundedLattice;
    use crate::analysis::memory::closure::Closure;
    use crate::analysis::memory::environment::{Environment, Variable};
    use crate::analysis::memory::object::Property;
    use deltaflow_js::NodeId;

    fn num(v: f64) -> BValue {
        BValue::of_num(NumLattice::exact(v), Change::Unchanged)
    }

    #[test]
    fn alloc_then_apply() {
        let mut store = Store::new();
        store.alloc_value(addr(1), num(1.0));
        assert_eq!(store.apply(&addr(1)), num(1.0));
        store.strong_update(addr(1), num(2.0));
        assert_eq!(store.apply(&addr(1)), num(2.0));
        store.weak_update(addr(1), num(3.0));
        assert_eq!(store.apply(&addr(1)).number.value, NumLattice::real());
    }

    #[test]
    fn missing_cells_are_unknown() {
        let store = Store::new();
        let v = store.apply(&addr(42));
        assert!(v.number.value.is_top());
        assert!(v.addresses.value.is_empty());
    }

    #[test]
    fn self_join_is_noop() {
        let mut store = Store::new();
        store.alloc_value(addr(1), num(1.0));
        store.alloc_obj(addr(2), Obj::new(JsClass::Object));
        assert_eq!(store.joined(&store), store);
    }

    #[test]
    fn join_merges_divergent_property_cells() {
        let mut a = Store::new();
        let mut obj_a = Obj::new(JsClass::Object);
        obj_a.insert(Property::new(NodeId(1), "p", Change::Unchanged, addr(1)));
        a.alloc_obj(addr(10), obj_a);
        a.alloc_value(addr(1), num(1.0));

        let mut b = Store::new();
        let mut obj_b = Obj::new(JsClass::Object);
        obj_b.insert(Property::new(NodeId(1), "p", Change::Unchanged, addr(5)));
        b.alloc_obj(addr(10), obj_b);
        b.alloc_value(addr(5), num(5.0));

        let j = a.joined(&b);
        let kept = j.get_obj(&addr(10)).and_then(|o| o.get("p")).map(|p| p.address);
        assert_eq!(kept, Some(addr(1)));
        assert_eq!(j.apply(&addr(1)).number.value, NumLattice::real());
    }

    #[test]
    fn gc_keeps_reachable_and_cycles() {
        let mut store = Store::new();
        // 1 -> obj 2 { self: 3 }, 3 -> obj 2 (a cycle), 4 unreachable
        store.alloc_value(addr(1), BValue::of_address(addr(2), Change::Unchanged));
        let mut obj = Obj::new(JsClass::Object);
        obj.insert(Property::new(NodeId(3), "self", Change::Unchanged, addr(3)));
        store.alloc_obj(addr(2), obj);
        store.alloc_value(addr(3), BValue::of_address(addr(2), Change::Unchanged));
        store.alloc_value(addr(4), num(4.0));
        store.alloc_value(Address::builtin(Builtin::Global), num(0.0));

        store.gc([addr(1)]);
        assert!(store.contains_value(&addr(1)));
        assert!(store.get_obj(&addr(2)).is_some());
        assert!(store.contains_value(&addr(3)));
        assert!(!store.contains_value(&addr(4)));
        assert!(store.contains_value(&Address::builtin(Builtin::Global)));
    }

    #[test]
    fn gc_follows_closure_environments() {
        let mut store = Store::new();
        let mut env = Environment::new();
        env.strong_update(Variable::at(NodeId(7), "captured", Change::Unchanged, addr(7)));
        let fun = addr(6).with_class(JsClass::Function);
        store.alloc_value(addr(1), BValue::of_address(fun, Change::Unchanged));
        store.alloc_obj(fun, Obj::new(JsClass::Function).with_closure(Closure::function(NodeId(6), env)));
        store.alloc_value(addr(7), num(7.0));
        store.gc([addr(1)]);
        assert!(store.contains_value(&addr(7)));
    }
}
