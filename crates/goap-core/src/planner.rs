//! Forward A*-style planner.
//!
//! Search nodes hold isolated [`WorldState`] snapshots; the live state is
//! never touched. The frontier is ordered by `f = g + h` where `h` is
//! [`distance`] to the goal, and states are deduplicated by their canonical
//! [`WorldState::fingerprint`], keeping only the cheapest known arrival.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::action::{Action, ActionLibrary};
use crate::config::OrchestratorConfig;
use crate::error::GoapResult;
use crate::goal::Goal;
use crate::plan::PlanStep;
use crate::world_state::{distance, WorldState};

/// Search bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Maximum number of actions in a returned plan.
    pub max_depth: usize,
    /// Wall-clock budget for one search.
    pub timeout: Duration,
}

impl From<&OrchestratorConfig> for PlannerConfig {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_depth: config.max_planning_depth,
            timeout: Duration::from_millis(config.planning_timeout_ms),
        }
    }
}

/// How a search ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchOutcome {
    Found { steps: Vec<PlanStep>, total_cost: f64 },
    Infeasible,
    TimedOut,
}

/// Search result with its cost accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSearch {
    pub outcome: SearchOutcome,
    pub explored_nodes: usize,
    pub planning_time_ms: u64,
}

struct SearchNode<'a> {
    state: WorldState,
    fingerprint: String,
    g: f64,
    depth: usize,
    parent: Option<usize>,
    action: Option<&'a Action>,
}

/// Min-heap entry: `BinaryHeap` is a max-heap, so the ordering is reversed.
struct FrontierEntry {
    f: f64,
    h: f64,
    seq: usize,
    node: usize,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

/// Stateless planner; safe to share across concurrent callers.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Search for the cheapest action sequence taking `initial` to a state
    /// satisfying `goal.target_state`.
    #[instrument(skip(self, initial, goal, library), fields(goal_id = %goal.id))]
    pub fn plan(
        &self,
        initial: &WorldState,
        goal: &Goal,
        library: &ActionLibrary,
    ) -> GoapResult<PlanSearch> {
        let started = Instant::now();
        let target = &goal.target_state;

        let mut nodes: Vec<SearchNode<'_>> = Vec::new();
        let mut best_g: HashMap<String, f64> = HashMap::new();
        let mut frontier = BinaryHeap::new();
        let mut explored = 0usize;

        let root_fp = initial.fingerprint()?;
        let root_h = distance(initial, target);
        best_g.insert(root_fp.clone(), 0.0);
        nodes.push(SearchNode {
            state: initial.clone(),
            fingerprint: root_fp,
            g: 0.0,
            depth: 0,
            parent: None,
            action: None,
        });
        frontier.push(FrontierEntry {
            f: root_h,
            h: root_h,
            seq: 0,
            node: 0,
        });

        while let Some(entry) = frontier.pop() {
            if started.elapsed() >= self.config.timeout {
                debug!(explored, "planning timed out");
                return Ok(self.finish(SearchOutcome::TimedOut, explored, started));
            }

            let current = &nodes[entry.node];
            // Superseded by a cheaper arrival at the same state.
            if best_g
                .get(&current.fingerprint)
                .is_some_and(|&g| g < current.g)
            {
                continue;
            }
            explored += 1;

            if entry.h == 0.0 {
                let steps = reconstruct(&nodes, entry.node, goal);
                let total_cost = current.g;
                debug!(explored, steps = steps.len(), total_cost, "plan found");
                return Ok(self.finish(
                    SearchOutcome::Found { steps, total_cost },
                    explored,
                    started,
                ));
            }

            if current.depth >= self.config.max_depth {
                continue;
            }

            let depth = current.depth + 1;
            let g = current.g;
            let successors: Vec<(&Action, WorldState)> = library
                .all_actions()
                .filter(|action| action.is_applicable(&current.state))
                .map(|action| (action, action.predict(&current.state)))
                .collect();

            for (action, state) in successors {
                let next_g = g + action.cost;
                let fingerprint = state.fingerprint()?;
                if best_g.get(&fingerprint).is_some_and(|&seen| seen <= next_g) {
                    continue;
                }
                best_g.insert(fingerprint.clone(), next_g);

                let h = distance(&state, target);
                let index = nodes.len();
                nodes.push(SearchNode {
                    state,
                    fingerprint,
                    g: next_g,
                    depth,
                    parent: Some(entry.node),
                    action: Some(action),
                });
                frontier.push(FrontierEntry {
                    f: next_g + h,
                    h,
                    seq: index,
                    node: index,
                });
            }
        }

        debug!(explored, "frontier exhausted");
        Ok(self.finish(SearchOutcome::Infeasible, explored, started))
    }

    fn finish(&self, outcome: SearchOutcome, explored_nodes: usize, started: Instant) -> PlanSearch {
        PlanSearch {
            outcome,
            explored_nodes,
            planning_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn reconstruct(nodes: &[SearchNode<'_>], mut index: usize, goal: &Goal) -> Vec<PlanStep> {
    let mut steps = Vec::new();
    while let Some(action) = nodes[index].action {
        steps.push(action.bind(&goal.context));
        match nodes[index].parent {
            Some(parent) => index = parent,
            None => break,
        }
    }
    steps.reverse();
    steps
}
