use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs for one script analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Edges a single worklist run may visit before giving up with its best state so far.
    pub edge_budget: u64,
    /// Wall-clock limit for the whole script. Once exceeded, function applications reuse
    /// whatever was computed before instead of re-entering the fixpoint.
    pub timeout: Option<Duration>,
    /// Analyze functions that are reachable but never called.
    pub analyze_reachable: bool,
    /// Collect the store after calls made from the top-level frame. Off by default: values of
    /// a partially evaluated expression (array or object literal elements, call arguments)
    /// are not roots, so a collection in the middle of one can free cells still in use.
    pub gc_after_call: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            edge_budget: 100_000,
            timeout: None,
            analyze_reachable: true,
            gc_after_call: false,
        }
    }
}

impl AnalysisConfig {
    pub fn with_edge_budget(mut self, edge_budget: u64) -> Self {
        self.edge_budget = edge_budget;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"edge_budget": 10}"#).unwrap();
        assert_eq!(config.edge_budget, 10);
        assert!(config.analyze_reachable);
        assert!(!config.gc_after_call);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn collection_can_be_enabled() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"gc_after_call": true}"#).unwrap();
        assert!(config.gc_after_call);
        assert_eq!(config.edge_budget, AnalysisConfig::default().edge_budget);
    }
}
