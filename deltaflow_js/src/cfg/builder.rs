use crate::ast::{Expr, FunctionNode, Stmt};
use crate::cfg::{Cfg, CfgEdge, CfgNode};
use crate::error::JsModelError;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::prelude::DiGraph;
use std::sync::Arc;

/// Incrementally assembles a [Cfg].
///
/// The builder does not interpret statements; callers decide how structured statements are
/// flattened and which edges close loops.
#[derive(Debug)]
pub struct CfgBuilder {
    function: Arc<FunctionNode>,
    graph: DiGraph<CfgNode, CfgEdge>,
    entry: Option<NodeIndex>,
    exits: Vec<NodeIndex>,
    returns: Vec<NodeIndex>,
    breaks: Vec<NodeIndex>,
    continues: Vec<NodeIndex>,
    throws: Vec<NodeIndex>,
}

impl CfgBuilder {
    pub fn new(function: Arc<FunctionNode>) -> Self {
        Self {
            function,
            graph: Default::default(),
            entry: None,
            exits: vec![],
            returns: vec![],
            breaks: vec![],
            continues: vec![],
            throws: vec![],
        }
    }

    /// Add the synthetic entry node. A graph has exactly one.
    pub fn entry(&mut self) -> NodeIndex {
        if let Some(entry) = self.entry {
            return entry;
        }
        let idx = self.graph.add_node(CfgNode { stmt: None });
        self.entry = Some(idx);
        idx
    }

    /// Add a synthetic exit node.
    pub fn exit(&mut self) -> NodeIndex {
        let idx = self.graph.add_node(CfgNode { stmt: None });
        self.exits.push(idx);
        idx
    }

    pub fn empty(&mut self) -> NodeIndex {
        self.graph.add_node(CfgNode { stmt: None })
    }

    pub fn stmt(&mut self, stmt: Stmt) -> NodeIndex {
        self.graph.add_node(CfgNode { stmt: Some(stmt) })
    }

    /// Attach a statement to an existing node, replacing any previous one.
    pub fn attach(&mut self, node: NodeIndex, stmt: Stmt) {
        if let Some(weight) = self.graph.node_weight_mut(node) {
            weight.stmt = Some(stmt);
        }
    }

    pub fn mark_return(&mut self, node: NodeIndex) {
        self.returns.push(node);
    }

    pub fn mark_break(&mut self, node: NodeIndex) {
        self.breaks.push(node);
    }

    pub fn mark_continue(&mut self, node: NodeIndex) {
        self.continues.push(node);
    }

    pub fn mark_throw(&mut self, node: NodeIndex) {
        self.throws.push(node);
    }

    pub fn add_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        condition: Option<Expr>,
        loop_edge: bool,
    ) -> EdgeIndex {
        self.graph.add_edge(
            from,
            to,
            CfgEdge {
                condition,
                loop_edge,
            },
        )
    }

    pub fn edge(&mut self, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        self.add_edge(from, to, None, false)
    }

    pub fn cond_edge(&mut self, from: NodeIndex, to: NodeIndex, condition: Expr) -> EdgeIndex {
        self.add_edge(from, to, Some(condition), false)
    }

    pub fn loop_edge(&mut self, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        self.add_edge(from, to, None, true)
    }

    /// Chain statements one after another starting at `from`. Returns the last node.
    pub fn sequence<I: IntoIterator<Item = Stmt>>(&mut self, from: NodeIndex, stmts: I) -> NodeIndex {
        let mut last = from;
        for s in stmts {
            let next = self.stmt(s);
            self.edge(last, next);
            last = next;
        }
        last
    }

    pub fn build(self) -> Result<Cfg, JsModelError> {
        let entry = self.entry.ok_or(JsModelError::MissingEntry(self.function.id))?;
        if self.exits.is_empty() {
            return Err(JsModelError::NoExit(self.function.id));
        }
        tracing::debug!(
            function = %self.function.id,
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "built cfg"
        );
        Ok(Cfg::from_parts(
            self.function,
            self.graph,
            entry,
            self.exits,
            [self.returns, self.breaks, self.continues, self.throws],
        ))
    }
}
