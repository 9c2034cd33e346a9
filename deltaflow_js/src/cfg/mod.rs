mod builder;
mod description;

pub use builder::CfgBuilder;
pub use description::{CfgDescription, EdgeDescription, NodeDescription};

use crate::ast::{Expr, FunctionNode, NodeId, Stmt};
use crate::error::JsModelError;
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::prelude::DiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;

/// A CFG node. Synthetic nodes (entry, exit, join points) carry no statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgNode {
    pub stmt: Option<Stmt>,
}

/// A CFG edge, optionally guarded by a branch condition.
#[derive(Debug, Clone, PartialEq)]
pub struct CfgEdge {
    pub condition: Option<Expr>,
    /// Set by the CFG builder on edges that close a loop.
    pub loop_edge: bool,
}

/// Control-flow graph of a single function or script body.
///
/// Graphs are immutable once built; analysis results live beside the graph, keyed by
/// [NodeIndex] and [EdgeIndex].
#[derive(Debug, Clone)]
pub struct Cfg {
    function: Arc<FunctionNode>,
    graph: DiGraph<CfgNode, CfgEdge>,
    entry: NodeIndex,
    exits: Vec<NodeIndex>,
    returns: Vec<NodeIndex>,
    breaks: Vec<NodeIndex>,
    continues: Vec<NodeIndex>,
    throws: Vec<NodeIndex>,
    incoming: HashMap<NodeIndex, usize>,
}

impl Cfg {
    pub(crate) fn from_parts(
        function: Arc<FunctionNode>,
        graph: DiGraph<CfgNode, CfgEdge>,
        entry: NodeIndex,
        exits: Vec<NodeIndex>,
        special: [Vec<NodeIndex>; 4],
    ) -> Self {
        let incoming = graph
            .node_indices()
            .map(|n| {
                let count = graph
                    .edges_directed(n, Direction::Incoming)
                    .filter(|e| !e.weight().loop_edge)
                    .count();
                (n, count)
            })
            .collect();
        let [returns, breaks, continues, throws] = special;
        Self {
            function,
            graph,
            entry,
            exits,
            returns,
            breaks,
            continues,
            throws,
            incoming,
        }
    }

    /// The function (or script) this graph was built for.
    pub fn function(&self) -> &Arc<FunctionNode> {
        &self.function
    }

    pub fn function_id(&self) -> NodeId {
        self.function.id
    }

    pub fn graph(&self) -> &DiGraph<CfgNode, CfgEdge> {
        &self.graph
    }

    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    pub fn exits(&self) -> &[NodeIndex] {
        &self.exits
    }

    pub fn returns(&self) -> &[NodeIndex] {
        &self.returns
    }

    pub fn breaks(&self) -> &[NodeIndex] {
        &self.breaks
    }

    pub fn continues(&self) -> &[NodeIndex] {
        &self.continues
    }

    pub fn throws(&self) -> &[NodeIndex] {
        &self.throws
    }

    pub fn node(&self, node: NodeIndex) -> Option<&CfgNode> {
        self.graph.node_weight(node)
    }

    pub fn edge(&self, edge: EdgeIndex) -> Option<&CfgEdge> {
        self.graph.edge_weight(edge)
    }

    pub fn source(&self, edge: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(edge).map(|(s, _)| s)
    }

    pub fn target(&self, edge: EdgeIndex) -> Option<NodeIndex> {
        self.graph.edge_endpoints(edge).map(|(_, t)| t)
    }

    /// Outgoing edges of `node` in insertion order.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        edges.sort();
        edges
    }

    /// Edges leaving the same node as `edge`, excluding `edge` itself.
    pub fn siblings(&self, edge: EdgeIndex) -> Vec<EdgeIndex> {
        match self.source(edge) {
            Some(src) => self
                .outgoing(src)
                .into_iter()
                .filter(|e| *e != edge)
                .collect(),
            None => vec![],
        }
    }

    /// Number of incoming edges of `node` that are not loop edges.
    pub fn incoming_count(&self, node: NodeIndex) -> usize {
        self.incoming.get(&node).copied().unwrap_or(0)
    }

    pub fn has_outgoing_loop_edge(&self, node: NodeIndex) -> bool {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .any(|e| e.weight().loop_edge)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// All CFGs of one program version, keyed by the id of the function or script they cover.
#[derive(Debug, Clone, Default)]
pub struct CfgMap {
    cfgs: HashMap<NodeId, Arc<Cfg>>,
}

impl CfgMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cfg: Cfg) -> Result<(), JsModelError> {
        let id = cfg.function_id();
        if self.cfgs.contains_key(&id) {
            return Err(JsModelError::DuplicateCfg(id));
        }
        self.cfgs.insert(id, Arc::new(cfg));
        Ok(())
    }

    pub fn get(&self, function: NodeId) -> Option<&Arc<Cfg>> {
        self.cfgs.get(&function)
    }

    pub fn len(&self) -> usize {
        self.cfgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cfgs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cfg>> {
        self.cfgs.values()
    }
}

impl CfgMap {
    pub fn from_cfgs<T: IntoIterator<Item = Cfg>>(iter: T) -> Result<Self, JsModelError> {
        let mut map = CfgMap::new();
        for cfg in iter {
            map.insert(cfg)?;
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests;
