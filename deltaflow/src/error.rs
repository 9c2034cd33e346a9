use deltaflow_js::{JsModelError, NodeId};
use thiserror::Error;

/// Fatal errors raised by the engine.
///
/// Unknown identifiers, missing properties and unresolved callees are not errors; the engine
/// approximates them and keeps going. These variants indicate a malformed input model or an
/// engine bug.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot join records with different identity: {left} vs {right}")]
    IdentityMismatch { left: String, right: String },
    #[error("no cfg was registered for the script root {0}")]
    MissingCfg(NodeId),
    #[error("invalid input model")]
    Model(#[from] JsModelError),
}
