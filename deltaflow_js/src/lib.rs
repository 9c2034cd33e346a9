pub mod ast;
pub mod cfg;
mod error;

pub use ast::build::AstBuilder;
pub use ast::*;
pub use cfg::{Cfg, CfgBuilder, CfgDescription, CfgEdge, CfgMap, CfgNode};
pub use error::JsModelError;
pub use petgraph::graph::{EdgeIndex, NodeIndex};
