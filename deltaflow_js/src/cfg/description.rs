use crate::ast::{Expr, FunctionNode, Stmt};
use crate::cfg::{Cfg, CfgBuilder};
use crate::error::JsModelError;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serialized form of a [Cfg], as produced by an external CFG builder.
///
/// Nodes are referenced by their position in `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgDescription {
    pub function: Arc<FunctionNode>,
    pub nodes: Vec<NodeDescription>,
    pub edges: Vec<EdgeDescription>,
    pub entry: usize,
    pub exits: Vec<usize>,
    #[serde(default)]
    pub returns: Vec<usize>,
    #[serde(default)]
    pub breaks: Vec<usize>,
    #[serde(default)]
    pub continues: Vec<usize>,
    #[serde(default)]
    pub throws: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    #[serde(default)]
    pub stmt: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub loop_edge: bool,
}

impl CfgDescription {
    pub fn from_json(json: &str) -> Result<Self, JsModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, JsModelError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl TryFrom<CfgDescription> for Cfg {
    type Error = JsModelError;

    fn try_from(desc: CfgDescription) -> Result<Self, Self::Error> {
        let count = desc.nodes.len();
        let check = |idx: usize| -> Result<NodeIndex, JsModelError> {
            if idx < count {
                Ok(NodeIndex::new(idx))
            } else {
                Err(JsModelError::NodeOutOfRange { index: idx, count })
            }
        };

        let mut builder = CfgBuilder::new(desc.function.clone());
        // The builder hands out indices in insertion order, so node `i` lands at `NodeIndex(i)`.
        let entry = check(desc.entry)?;
        for idx in desc.exits.iter() {
            check(*idx)?;
        }
        for (i, node) in desc.nodes.into_iter().enumerate() {
            let idx = if i == entry.index() {
                builder.entry()
            } else if desc.exits.contains(&i) {
                builder.exit()
            } else {
                match node.stmt.clone() {
                    Some(stmt) => builder.stmt(stmt),
                    None => builder.empty(),
                }
            };
            debug_assert_eq!(idx.index(), i);
            if i == entry.index() || desc.exits.contains(&i) {
                // Entry and exit nodes may still carry the statement the external builder
                // attached to them.
                if let Some(stmt) = node.stmt {
                    builder.attach(idx, stmt);
                }
            }
        }
        for edge in desc.edges {
            let from = check(edge.from)?;
            let to = check(edge.to)?;
            builder.add_edge(from, to, edge.condition, edge.loop_edge);
        }
        for r in desc.returns {
            builder.mark_return(check(r)?);
        }
        for b in desc.breaks {
            builder.mark_break(check(b)?);
        }
        for c in desc.continues {
            builder.mark_continue(check(c)?);
        }
        for t in desc.throws {
            builder.mark_throw(check(t)?);
        }
        builder.build()
    }
}
