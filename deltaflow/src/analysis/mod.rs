use crate::analysis::builtins::initial_state;
use crate::analysis::engine::reachable::analyze_env_reachable;
use crate::analysis::engine::{AnalysisContext, AnalysisResults, run};
use crate::analysis::state::State;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use deltaflow_js::{CfgMap, NodeId};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use tracing::{info, instrument};

pub mod builtins;
pub mod domain;
pub mod engine;
pub mod lattice;
pub mod memory;
pub mod state;

/// The outcome of analyzing one script.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    pub script: NodeId,
    /// The joined state at the script's exit nodes.
    pub exit: State,
    pub results: AnalysisResults,
    /// Some worklist run stopped early; its states only cover the paths explored.
    pub budget_exhausted: bool,
    /// The timeout fired and later calls reused earlier results.
    pub timed_out: bool,
}

impl Display for ScriptResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "script {}", self.script)?;
        writeln!(
            f,
            "analyzed: [{}]",
            self.results.analyzed().iter().join(", ")
        )?;
        if self.budget_exhausted {
            writeln!(f, "edge budget exhausted")?;
        }
        if self.timed_out {
            writeln!(f, "timed out")?;
        }
        write!(f, "{}", self.exit)
    }
}

/// Analyzes the scripts of one program version.
#[derive(Debug, Clone)]
pub struct ScriptAnalysis {
    cfgs: CfgMap,
    config: AnalysisConfig,
}

impl ScriptAnalysis {
    pub fn new(cfgs: CfgMap, config: AnalysisConfig) -> Self {
        Self { cfgs, config }
    }

    pub fn cfgs(&self) -> &CfgMap {
        &self.cfgs
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the analysis from the CFG of `script`, then analyze every function reachable from
    /// the script's bindings that was never called.
    #[instrument(skip(self))]
    pub fn analyze(&self, script: NodeId) -> Result<ScriptResult, AnalysisError> {
        let cfg = self
            .cfgs
            .get(script)
            .cloned()
            .ok_or(AnalysisError::MissingCfg(script))?;
        let mut cx = AnalysisContext::new(self.cfgs.clone(), self.config.clone());
        let state = initial_state(&cfg);
        let outcome = run(&mut cx, &cfg, state)?;
        cx.results.get_mut(script).exit = Some(outcome.state.clone());
        analyze_env_reachable(&mut cx, &outcome.state, None)?;
        info!(
            run = cx.run_id(),
            functions = cx.results.analyzed().len(),
            budget_exhausted = cx.budget_exhausted(),
            timed_out = cx.timed_out(),
            "script analyzed"
        );
        Ok(ScriptResult {
            script,
            budget_exhausted: cx.budget_exhausted(),
            timed_out: cx.timed_out(),
            exit: outcome.state,
            results: cx.into_results(),
        })
    }
}

/// Analyze independent scripts, in parallel when the `rayon` feature is enabled.
#[cfg(feature = "rayon")]
pub fn analyze_batch(
    jobs: Vec<(ScriptAnalysis, NodeId)>,
) -> Vec<Result<ScriptResult, AnalysisError>> {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};
    jobs.into_par_iter()
        .map(|(analysis, script)| analysis.analyze(script))
        .collect()
}

/// Analyze independent scripts, in parallel when the `rayon` feature is enabled.
#[cfg(not(feature = "rayon"))]
pub fn analyze_batch(
    jobs: Vec<(ScriptAnalysis, NodeId)>,
) -> Vec<Result<ScriptResult, AnalysisError>> {
    jobs.into_iter()
        .map(|(analysis, script)| analysis.analyze(script))
        .collect()
}
