//! The worklist fixpoint and everything it drives: statement and condition transfer,
//! expression evaluation, closure application, hoisting and the reachability sweep.

pub mod call;
pub mod condition;
pub mod eval;
pub mod lift;
pub mod reachable;
pub mod transfer;

use crate::analysis::lattice::JoinSemiLattice;
use crate::analysis::state::State;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::id::next_id;
use deltaflow_js::{Cfg, CfgMap, NodeId};
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// States recorded for one CFG across every run of it.
#[derive(Debug, Default, Clone)]
pub struct CfgResults {
    /// The joined entry state of the latest run.
    pub entry: Option<State>,
    /// The exit state of the latest run.
    pub exit: Option<State>,
    pub node_before: HashMap<NodeIndex, State>,
    pub node_after: HashMap<NodeIndex, State>,
    pub edge_before: HashMap<EdgeIndex, State>,
    pub edge_after: HashMap<EdgeIndex, State>,
}

/// Analysis results of every CFG, keyed by function id.
#[derive(Debug, Default, Clone)]
pub struct AnalysisResults {
    cfgs: HashMap<NodeId, CfgResults>,
}

impl AnalysisResults {
    pub fn get(&self, function: NodeId) -> Option<&CfgResults> {
        self.cfgs.get(&function)
    }

    pub fn get_mut(&mut self, function: NodeId) -> &mut CfgResults {
        self.cfgs.entry(function).or_default()
    }

    pub fn entry(&self, function: NodeId) -> Option<&State> {
        self.get(function).and_then(|r| r.entry.as_ref())
    }

    pub fn exit(&self, function: NodeId) -> Option<&State> {
        self.get(function).and_then(|r| r.exit.as_ref())
    }

    pub fn node_before(&self, function: NodeId, node: NodeIndex) -> Option<&State> {
        self.get(function).and_then(|r| r.node_before.get(&node))
    }

    pub fn node_after(&self, function: NodeId, node: NodeIndex) -> Option<&State> {
        self.get(function).and_then(|r| r.node_after.get(&node))
    }

    pub fn edge_before(&self, function: NodeId, edge: EdgeIndex) -> Option<&State> {
        self.get(function).and_then(|r| r.edge_before.get(&edge))
    }

    pub fn edge_after(&self, function: NodeId, edge: EdgeIndex) -> Option<&State> {
        self.get(function).and_then(|r| r.edge_after.get(&edge))
    }

    /// Whether `function` has been run at least once.
    pub fn is_analyzed(&self, function: NodeId) -> bool {
        self.entry(function).is_some()
    }

    /// Ids of every function that has been run.
    pub fn analyzed(&self) -> BTreeSet<NodeId> {
        self.cfgs
            .iter()
            .filter(|(_, r)| r.entry.is_some())
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Everything shared by the states of one script analysis.
#[derive(Debug)]
pub struct AnalysisContext {
    pub cfgs: CfgMap,
    pub config: AnalysisConfig,
    pub results: AnalysisResults,
    run_id: u64,
    started: Instant,
    timed_out: bool,
    budget_exhausted: bool,
}

impl AnalysisContext {
    pub fn new(cfgs: CfgMap, config: AnalysisConfig) -> Self {
        Self {
            cfgs,
            config,
            results: AnalysisResults::default(),
            run_id: next_id(),
            started: Instant::now(),
            timed_out: false,
            budget_exhausted: false,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn cfg(&self, function: NodeId) -> Option<Arc<Cfg>> {
        self.cfgs.get(function).cloned()
    }

    /// Check the timeout. Once it has fired the flag stays set.
    pub fn check_timeout(&mut self) -> bool {
        if !self.timed_out
            && let Some(limit) = self.config.timeout
            && self.started.elapsed() > limit
        {
            warn!(run = self.run_id, ?limit, "analysis timed out");
            self.timed_out = true;
        }
        self.timed_out
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted
    }

    pub fn into_results(self) -> AnalysisResults {
        self.results
    }
}

/// The result of one worklist run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: State,
    /// The edge budget ran out and `state` only covers the paths explored so far.
    pub budget_exhausted: bool,
}

struct Frame {
    edge: EdgeIndex,
    /// Edges already taken on this path; a loop is entered at most once per path.
    visited: BTreeSet<EdgeIndex>,
    state: State,
}

/// Run the worklist fixpoint over `cfg` from `state`.
///
/// The traversal is depth first over paths. A node is interpreted once every non-loop
/// predecessor has contributed to its before-state, when it heads a loop, when it is reached
/// over a loop edge, or when a late arrival grew its before-state. The result is the join of
/// the before-states of the exit nodes.
#[instrument(skip_all, fields(function = %cfg.function_id()))]
pub fn run(cx: &mut AnalysisContext, cfg: &Arc<Cfg>, state: State) -> Result<RunOutcome, AnalysisError> {
    let function = cfg.function_id();
    let mut state = state;
    if let Some(prior) = cx.results.entry(function) {
        state.join(prior);
    }
    let entry = cfg.entry();
    {
        let results = cx.results.get_mut(function);
        results.entry = Some(state.clone());
        results.node_before.insert(entry, state.clone());
    }
    state.transfer_node(cx, cfg, entry)?;
    cx.results.get_mut(function).node_after.insert(entry, state.clone());

    let mut stack: Vec<Frame> = cfg
        .outgoing(entry)
        .into_iter()
        .map(|edge| Frame {
            edge,
            visited: BTreeSet::new(),
            state: state.clone(),
        })
        .collect();
    let mut semaphores: HashMap<NodeIndex, i64> = HashMap::new();
    let mut edges_visited = 0u64;
    let mut budget_exhausted = false;

    while let Some(frame) = stack.pop() {
        if edges_visited >= cx.config.edge_budget {
            warn!(
                %function,
                budget = cx.config.edge_budget,
                pending = stack.len() + 1,
                "edge budget exhausted"
            );
            budget_exhausted = true;
            cx.budget_exhausted = true;
            break;
        }
        edges_visited += 1;
        let Frame {
            edge,
            visited,
            state: path_state,
        } = frame;
        let (Some(target), Some(cfg_edge)) = (cfg.target(edge), cfg.edge(edge)) else {
            continue;
        };

        let mut current = path_state.join_opt(cx.results.edge_before(function, edge));
        cx.results
            .get_mut(function)
            .edge_before
            .insert(edge, current.clone());
        current.transfer_edge(cx, cfg, edge)?;
        cx.results
            .get_mut(function)
            .edge_after
            .insert(edge, current.clone());

        let grew = match cx.results.node_before(function, target) {
            Some(prior) => prior.clone().merge(&current).merged(),
            None => true,
        };
        let mut current = current.join_opt(cx.results.node_before(function, target));
        cx.results
            .get_mut(function)
            .node_before
            .insert(target, current.clone());

        let semaphore = semaphores
            .entry(target)
            .or_insert(cfg.incoming_count(target) as i64);
        *semaphore -= 1;
        let semaphore = *semaphore;

        let transfer = semaphore == 0
            || cfg_edge.loop_edge
            || cfg.has_outgoing_loop_edge(target)
            || (semaphore < 0 && grew);
        debug!(
            edge = edge.index(),
            node = target.index(),
            semaphore,
            transfer,
            "visited edge"
        );
        if !transfer {
            continue;
        }

        current.transfer_node(cx, cfg, target)?;
        cx.results
            .get_mut(function)
            .node_after
            .insert(target, current.clone());
        for out in cfg.outgoing(target) {
            let loop_edge = cfg.edge(out).is_some_and(|e| e.loop_edge);
            if !visited.contains(&out) && (semaphore <= 0 || loop_edge) {
                let mut visited = visited.clone();
                visited.insert(out);
                stack.push(Frame {
                    edge: out,
                    visited,
                    state: current.clone(),
                });
            }
        }
    }

    let mut exit: Option<State> = None;
    for node in cfg.exits() {
        if let Some(before) = cx.results.node_before(function, *node) {
            match &mut exit {
                Some(s) => s.join(before),
                None => exit = Some(before.clone()),
            }
        }
    }
    // No exit reached (budget ran out, or every path throws): fall back to the entry.
    let mut exit = exit.unwrap_or(state);
    if let Some(entry) = cx.results.entry(function) {
        exit.trace = entry.trace;
        exit.self_addr = entry.self_addr;
        exit.call_stack = entry.call_stack.clone();
    }
    debug!(%function, edges_visited, "run finished");
    cx.results.get_mut(function).exit = Some(exit.clone());
    Ok(RunOutcome {
        state: exit,
        budget_exhausted,
    })
}

#[cfg(test)]
mod tests;
