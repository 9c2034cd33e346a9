use crate::ast::NodeId;
use thiserror::Error;

/// An error in the AST or CFG handed over by the front end.
#[derive(Debug, Error)]
pub enum JsModelError {
    /// A CFG was finished without an entry node
    #[error("cfg for function {0} has no entry node")]
    MissingEntry(NodeId),
    /// A CFG was finished without any exit node
    #[error("cfg for function {0} has no exit node")]
    NoExit(NodeId),
    /// A serialized CFG referenced a node that does not exist
    #[error("node index {index} is out of range for a cfg with {count} nodes")]
    NodeOutOfRange { index: usize, count: usize },
    /// Two CFGs were registered for the same function
    #[error("a cfg for function {0} was already registered")]
    DuplicateCfg(NodeId),
    /// A serialized CFG could not be decoded
    #[error("failed to decode cfg description")]
    Json(#[from] serde_json::Error),
}
