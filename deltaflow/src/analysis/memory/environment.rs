use crate::analysis::domain::{Address, AddressLattice, Name};
use crate::analysis::lattice::{Change, JoinSemiLattice, impl_partial_ord_via_join};
use crate::error::AnalysisError;
use deltaflow_js::NodeId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A name bound in an [Environment].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    /// The declaration that introduced the binding.
    pub definer: NodeId,
    pub name: Name,
    pub change: Change,
    pub addresses: AddressLattice,
}

impl Variable {
    pub fn new(definer: NodeId, name: Name, change: Change, addresses: AddressLattice) -> Self {
        Self {
            definer,
            name,
            change,
            addresses,
        }
    }

    pub fn at(definer: NodeId, name: &str, change: Change, addr: Address) -> Self {
        Self::new(definer, Name::new(name), change, AddressLattice::single(addr))
    }

    /// Join two bindings of the same declaration.
    pub fn try_join(&mut self, other: &Variable) -> Result<(), AnalysisError> {
        if self.name != other.name || self.definer != other.definer {
            return Err(AnalysisError::IdentityMismatch {
                left: format!("{}@{}", self.name, self.definer),
                right: format!("{}@{}", other.name, other.definer),
            });
        }
        self.change.join(&other.change);
        self.addresses.join(&other.addresses);
        Ok(())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}: {}", self.name, self.definer, self.change, self.addresses)
    }
}

/// Maps identifiers to the addresses of their value cells.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Environment {
    vars: BTreeMap<Name, Variable>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, name: &str) -> Option<&Variable> {
        self.vars.get(&Name::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(&Name::new(name))
    }

    /// Bind `var.name` to `var`, replacing any previous binding.
    pub fn strong_update(&mut self, var: Variable) {
        self.vars.insert(var.name, var);
    }

    /// Join `var` into the existing binding of the same name.
    pub fn weak_update(&mut self, var: Variable) -> Result<(), AnalysisError> {
        match self.vars.get_mut(&var.name) {
            Some(existing) => existing.try_join(&var),
            None => {
                self.vars.insert(var.name, var);
                Ok(())
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Variable)> {
        self.vars.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    /// Every address bound by some variable.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.vars.values().flat_map(|v| v.addresses.iter())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl JoinSemiLattice for Environment {
    /// Union of the bindings. A name bound on both sides by different declarations (one
    /// path declared it in a nested function, the other in the caller) keeps the lower
    /// definer id and points at the union of both address sets.
    fn join(&mut self, other: &Self) {
        for (name, var) in &other.vars {
            match self.vars.get_mut(name) {
                Some(existing) => {
                    existing.definer = existing.definer.min(var.definer);
                    existing.change.join(&var.change);
                    existing.addresses.join(&var.addresses);
                }
                None => {
                    self.vars.insert(*name, var.clone());
                }
            }
        }
    }
}

impl_partial_ord_via_join!(Environment);

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for var in self.vars.values() {
            writeln!(f, "{var}")?;
        }
        Ok(())
    }
}
