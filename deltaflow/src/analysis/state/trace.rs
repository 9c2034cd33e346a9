use crate::analysis::domain::{Address, JsClass, Name};
use deltaflow_js::NodeId;

/// Flow-sensitive, call-insensitive allocation context.
///
/// The trace remembers the program point currently being interpreted and turns allocation
/// sites into [Address]es. Every activation of a function shares the same context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Trace {
    pp: i32,
}

impl Trace {
    pub fn new(pp: i32) -> Self {
        Self { pp }
    }

    pub fn point(&self) -> i32 {
        self.pp
    }

    /// Move to program point `pp`.
    pub fn update(&mut self, pp: i32) {
        self.pp = pp;
    }

    /// The trace used inside a call to `function`.
    pub fn enter(&self, function: NodeId) -> Self {
        Self { pp: function.0 }
    }

    /// An address at the current program point.
    pub fn to_addr(&self, prop: &str) -> Address {
        Address::new(self.pp, 0, Name::new(prop))
    }

    /// An address for allocation site `site` at the current program point.
    pub fn make_addr(&self, site: NodeId, prop: &str) -> Address {
        Address::new(self.pp, site.0, Name::new(prop))
    }

    /// Distinguish an object from the value cell allocated at the same site.
    pub fn mod_addr(&self, addr: Address, class: JsClass) -> Address {
        addr.with_class(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_follow_program_point() {
        let mut t = Trace::new(5);
        let a = t.make_addr(NodeId(9), "");
        t.update(6);
        let b = t.make_addr(NodeId(9), "");
        assert_ne!(a, b);
        t.update(5);
        assert_eq!(t.make_addr(NodeId(9), ""), a);
        assert_ne!(t.to_addr("x"), t.to_addr("y"));
    }

    #[test]
    fn calls_are_context_insensitive() {
        let a = Trace::new(1).enter(NodeId(40));
        let b = Trace::new(2).enter(NodeId(40));
        assert_eq!(a, b);
        let cell = a.make_addr(NodeId(3), "");
        assert_ne!(a.mod_addr(cell, JsClass::Function), cell);
    }
}
