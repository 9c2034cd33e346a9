pub mod analysis;
pub mod config;
mod error;
pub mod id;

pub use deltaflow_js as js;

pub use analysis::{ScriptAnalysis, ScriptResult, analyze_batch};
pub use config::AnalysisConfig;
pub use error::AnalysisError;
