use crate::analysis::domain::{Address, BValue, JsClass, Name};
use crate::analysis::lattice::{Change, JoinSemiLattice, impl_partial_ord_via_join};
use crate::analysis::memory::closure::{Closure, Closures};
use crate::error::AnalysisError;
use deltaflow_js::NodeId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A programmer-visible property and the cell holding its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    pub definer: NodeId,
    pub name: Name,
    pub change: Change,
    pub address: Address,
}

impl Property {
    pub fn new(definer: NodeId, name: &str, change: Change, address: Address) -> Self {
        Self {
            definer,
            name: Name::new(name),
            change,
            address,
        }
    }

    /// Join two records of the same property definition.
    pub fn try_join(&mut self, other: &Property) -> Result<(), AnalysisError> {
        if self.name != other.name || self.definer != other.definer {
            return Err(AnalysisError::IdentityMismatch {
                left: format!("{}@{}", self.name, self.definer),
                right: format!("{}@{}", other.name, other.definer),
            });
        }
        self.change.join(&other.change);
        self.address = self.address.min(other.address);
        Ok(())
    }
}

/// Properties the engine tracks but the program cannot name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct InternalProps {
    pub prototype: Option<BValue>,
    pub class: JsClass,
    /// Non-empty for callable objects.
    pub closures: Closures,
}

impl JoinSemiLattice for InternalProps {
    fn join(&mut self, other: &Self) {
        match (&mut self.prototype, &other.prototype) {
            (Some(a), Some(b)) => a.join(b),
            (None, Some(b)) => self.prototype = Some(b.clone()),
            _ => {}
        }
        self.class = self.class.min(other.class);
        self.closures.join(&other.closures);
    }
}

impl_partial_ord_via_join!(InternalProps);

/// An abstract heap object.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Obj {
    props: BTreeMap<Name, Property>,
    pub internal: InternalProps,
}

impl Obj {
    pub fn new(class: JsClass) -> Self {
        Self {
            props: BTreeMap::new(),
            internal: InternalProps {
                class,
                ..Default::default()
            },
        }
    }

    pub fn with_prototype(mut self, prototype: BValue) -> Self {
        self.internal.prototype = Some(prototype);
        self
    }

    pub fn with_closure(mut self, closure: Closure) -> Self {
        self.internal.closures.insert(closure);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.props.get(&Name::new(name))
    }

    pub fn insert(&mut self, prop: Property) {
        self.props.insert(prop.name, prop);
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.props.values()
    }

    pub fn class(&self) -> JsClass {
        self.internal.class
    }

    pub fn closures(&self) -> &Closures {
        &self.internal.closures
    }

    pub fn is_function(&self) -> bool {
        !self.internal.closures.is_empty()
    }

    /// Join `other` into `self`, returning the property cells that must be merged in the
    /// store: `(kept, dropped)` for every property that lives at a different address on each
    /// side. Only the lower address survives in the joined object.
    pub fn join_aliasing(&mut self, other: &Obj) -> Vec<(Address, Address)> {
        let mut aliases = vec![];
        for (name, prop) in &other.props {
            match self.props.get_mut(name) {
                Some(existing) => {
                    if existing.address != prop.address {
                        let kept = existing.address.min(prop.address);
                        let dropped = existing.address.max(prop.address);
                        aliases.push((kept, dropped));
                        existing.address = kept;
                    }
                    existing.definer = existing.definer.min(prop.definer);
                    existing.change.join(&prop.change);
                }
                None => {
                    self.props.insert(*name, prop.clone());
                }
            }
        }
        self.internal.join(&other.internal);
        aliases
    }
}

impl JoinSemiLattice for Obj {
    fn join(&mut self, other: &Self) {
        self.join_aliasing(other);
    }
}

impl_partial_ord_via_join!(Obj);

impl Display for Obj {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{{", self.internal.class)?;
        for (i, p) in self.props.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", p.name, p.address)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::address::tests::addr;
    use crate::analysis::lattice::laws;

    fn obj(props: &[(&str, i32)]) -> Obj {
        let mut o = Obj::new(JsClass::Object);
        for (name, site) in props {
            o.insert(Property::new(NodeId(*site), name, Change::Unchanged, addr(*site)));
        }
        o
    }

    #[test]
    fn join_reports_divergent_cells() {
        let mut a = obj(&[("x", 1), ("y", 2)]);
        let mut b = obj(&[("z", 3)]);
        b.insert(Property::new(NodeId(1), "x", Change::Changed, addr(9)));
        let aliases = a.join_aliasing(&b);
        assert_eq!(aliases, vec![(addr(1), addr(9))]);
        assert_eq!(a.get("x").map(|p| p.address), Some(addr(1)));
        assert_eq!(a.get("x").map(|p| p.change), Some(Change::Top));
        assert!(a.get("z").is_some());
    }

    #[test]
    fn property_identity_is_checked() {
        let mut p = Property::new(NodeId(1), "x", Change::Unchanged, addr(1));
        let q = Property::new(NodeId(2), "x", Change::Unchanged, addr(1));
        assert!(p.try_join(&q).is_err());
        let r = Property::new(NodeId(1), "x", Change::Changed, addr(0));
        p.try_join(&r).unwrap();
        assert_eq!(p.address, addr(0));
        assert_eq!(p.change, Change::Top);
    }

    #[test]
    fn joined_function_objects_keep_every_closure() {
        let function = |id| Closure::function(NodeId(id), Default::default());
        let mut f = Obj::new(JsClass::Function).with_closure(function(4));
        let g = Obj::new(JsClass::Function).with_closure(function(8));
        f.join(&g);
        let ids: Vec<NodeId> = f.closures().functions().map(|c| c.function).collect();
        assert_eq!(ids, vec![NodeId(4), NodeId(8)]);
        assert!(f.is_function());
    }

    #[test]
    fn object_join_laws() {
        let a = obj(&[("x", 1)]);
        let b = obj(&[("x", 2), ("y", 3)]);
        let c = Obj::new(JsClass::Function);
        laws::check(&a, &b, &c);
    }
}
