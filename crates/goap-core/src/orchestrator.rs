//! Goal assignment and concurrent plan execution.
//!
//! An [`Orchestrator`] owns one world state, one action library and one agent
//! registry. `assign_goal` plans against a snapshot of the live state, binds
//! the plan to an eligible agent and spawns a task that executes it. Tasks
//! talk to each other only through the shared [`WorldStateStore`].
//!
//! Lock order is `plans → agents` and `plans | tasks → lifecycle`; no lock is
//! held across an `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn, Instrument};

use crate::action::ActionLibrary;
use crate::agent::{Agent, AgentRegistry};
use crate::config::OrchestratorConfig;
use crate::error::{GoapError, GoapResult, PlanFailure};
use crate::goal::Goal;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::obs;
use crate::plan::{Plan, PlanStatus, PlanStep};
use crate::planner::{Planner, PlannerConfig, SearchOutcome};
use crate::world_state::{WorldState, WorldStateStore};

const SHUTDOWN_REASON: &str = "orchestrator shutdown";
const CANCEL_REASON: &str = "cancelled by request";

/// Result of one `assign_goal` call.
///
/// Every variant other than `Assigned` is an expected outcome: nothing was
/// committed and the world is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Assigned {
        goal_id: String,
        plan_id: String,
        agent_id: String,
        steps: usize,
        total_cost: f64,
        explored_nodes: usize,
        planning_time_ms: u64,
    },
    /// The search space was exhausted without reaching the goal.
    PlanningInfeasible {
        goal_id: String,
        explored_nodes: usize,
        planning_time_ms: u64,
    },
    PlanningTimeout {
        goal_id: String,
        explored_nodes: usize,
        planning_time_ms: u64,
    },
    /// A plan exists but no free, active agent can perform all of it.
    NoEligibleAgent {
        goal_id: String,
        required_actions: BTreeSet<String>,
        explored_nodes: usize,
        planning_time_ms: u64,
    },
}

impl AssignmentOutcome {
    pub fn is_assigned(&self) -> bool {
        matches!(self, AssignmentOutcome::Assigned { .. })
    }

    pub fn goal_id(&self) -> &str {
        match self {
            AssignmentOutcome::Assigned { goal_id, .. }
            | AssignmentOutcome::PlanningInfeasible { goal_id, .. }
            | AssignmentOutcome::PlanningTimeout { goal_id, .. }
            | AssignmentOutcome::NoEligibleAgent { goal_id, .. } => goal_id,
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        match self {
            AssignmentOutcome::Assigned { plan_id, .. } => Some(plan_id),
            _ => None,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            AssignmentOutcome::Assigned { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }
}

/// Aggregate status for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub active_agents: usize,
    /// Plans not yet terminal (pending or running).
    pub running_plans: usize,
    /// Plans that reached a terminal status. Never decreases.
    pub completed_plans: usize,
    pub system_uptime_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    Created,
    Running { started_at: Instant },
    Stopped,
}

#[derive(Default)]
struct PlanBook {
    active: BTreeMap<String, Plan>,
    completed: Vec<Plan>,
}

struct PlanTask {
    handle: JoinHandle<()>,
    cancel: watch::Sender<Option<String>>,
}

struct Inner {
    config: OrchestratorConfig,
    planner: Planner,
    world: WorldStateStore,
    library: ActionLibrary,
    agents: Mutex<AgentRegistry>,
    plans: Mutex<PlanBook>,
    lifecycle: Mutex<Lifecycle>,
    tasks: Mutex<HashMap<String, PlanTask>>,
    metrics: Metrics,
    /// Bumped every time a plan reaches a terminal status.
    completions: watch::Sender<u64>,
}

/// Binds goals to plans to agents and runs the plans concurrently.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        library: ActionLibrary,
        agents: AgentRegistry,
    ) -> GoapResult<Self> {
        config.validate()?;
        let (completions, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                planner: Planner::new(PlannerConfig::from(&config)),
                config,
                world: WorldStateStore::default(),
                library,
                agents: Mutex::new(agents),
                plans: Mutex::new(PlanBook::default()),
                lifecycle: Mutex::new(Lifecycle::Created),
                tasks: Mutex::new(HashMap::new()),
                metrics: Metrics::new(),
                completions,
            }),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Open the lifecycle bracket. An orchestrator starts at most once.
    pub fn start(&self) -> GoapResult<()> {
        let mut lifecycle = lock(&self.inner.lifecycle);
        match *lifecycle {
            Lifecycle::Created => {
                *lifecycle = Lifecycle::Running {
                    started_at: Instant::now(),
                };
                if self.inner.config.enable_logging {
                    info!(
                        event = "orchestrator.started",
                        actions = self.inner.library.len(),
                        agents = lock(&self.inner.agents).len(),
                    );
                }
                Ok(())
            }
            Lifecycle::Running { .. } | Lifecycle::Stopped => Err(GoapError::AlreadyStarted),
        }
    }

    /// Cancel every unfinished plan and close the lifecycle bracket.
    ///
    /// Returns the ids of the plans that were cancelled. Effects already
    /// applied by those plans stay applied.
    pub async fn stop(&self) -> GoapResult<Vec<String>> {
        {
            let mut lifecycle = lock(&self.inner.lifecycle);
            if !matches!(*lifecycle, Lifecycle::Running { .. }) {
                return Err(GoapError::NotInitialized);
            }
            *lifecycle = Lifecycle::Stopped;
        }

        let tasks: Vec<PlanTask> = lock(&self.inner.tasks).drain().map(|(_, t)| t).collect();
        for task in &tasks {
            let _ = task.cancel.send(Some(SHUTDOWN_REASON.to_string()));
            task.handle.abort();
        }
        futures::future::join_all(tasks.into_iter().map(|t| t.handle)).await;

        let remaining: Vec<String> = lock(&self.inner.plans).active.keys().cloned().collect();
        for plan_id in &remaining {
            self.inner.finalize_plan(
                plan_id,
                Some(PlanFailure::Cancelled {
                    reason: SHUTDOWN_REASON.to_string(),
                }),
            );
        }

        if self.inner.config.enable_logging {
            info!(event = "orchestrator.stopped", cancelled_plans = remaining.len());
        }
        if self.inner.config.enable_metrics {
            self.inner.metrics.flush();
        }
        Ok(remaining)
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Shallow-merge `partial` into the live world. Does not replan.
    pub fn update_world_state(&self, partial: WorldState) -> GoapResult<()> {
        self.inner.ensure_running()?;
        self.inner.world.update(partial);
        Ok(())
    }

    /// Plan for `goal`, bind the plan to an agent and start executing it.
    ///
    /// Fails with `NotInitialized` if `stop()` lands before the plan's task is
    /// registered; the plan is then already recorded as cancelled.
    #[instrument(skip(self, goal), fields(goal_id = %goal.id))]
    pub async fn assign_goal(&self, goal: Goal) -> GoapResult<AssignmentOutcome> {
        let inner = &self.inner;
        inner.ensure_running()?;
        goal.validate()?;

        if inner.config.enable_logging {
            obs::emit_goal_received(&goal.id, goal.priority);
        }
        if inner.config.enable_metrics {
            inner.metrics.inc_goals_received();
        }

        let snapshot = inner.world.snapshot();
        let search = {
            let inner = Arc::clone(inner);
            let goal = goal.clone();
            tokio::task::spawn_blocking(move || {
                inner.planner.plan(&snapshot, &goal, &inner.library)
            })
            .await??
        };
        if inner.config.enable_metrics {
            inner.metrics.add_nodes_explored(search.explored_nodes as u64);
        }

        let goal_id = goal.id.clone();
        let explored_nodes = search.explored_nodes;
        let planning_time_ms = search.planning_time_ms;

        let steps = match search.outcome {
            SearchOutcome::Found { steps, .. } => steps,
            SearchOutcome::Infeasible => {
                inner.on_planning_failed(&goal_id, "planning_infeasible", explored_nodes);
                return Ok(AssignmentOutcome::PlanningInfeasible {
                    goal_id,
                    explored_nodes,
                    planning_time_ms,
                });
            }
            SearchOutcome::TimedOut => {
                inner.on_planning_failed(&goal_id, "planning_timeout", explored_nodes);
                return Ok(AssignmentOutcome::PlanningTimeout {
                    goal_id,
                    explored_nodes,
                    planning_time_ms,
                });
            }
        };

        let mut plan = Plan::new(goal, steps);
        let required_actions = plan.required_actions();

        let agent_id = {
            let mut plans = lock(&inner.plans);
            if !inner.is_running() {
                return Err(GoapError::NotInitialized);
            }
            let mut agents = lock(&inner.agents);
            let Some(agent_id) = agents
                .find_eligible_agent(&required_actions)
                .map(|a| a.id.clone())
            else {
                drop(agents);
                drop(plans);
                if inner.config.enable_logging {
                    obs::emit_assignment_rejected(&goal_id, "no_eligible_agent", explored_nodes);
                }
                if inner.config.enable_metrics {
                    inner.metrics.inc_no_eligible_agent();
                }
                return Ok(AssignmentOutcome::NoEligibleAgent {
                    goal_id,
                    required_actions,
                    explored_nodes,
                    planning_time_ms,
                });
            };
            agents.commit(&agent_id, &plan.id)?;
            plan.agent_id = Some(agent_id.clone());
            plans.active.insert(plan.id.clone(), plan.clone());
            agent_id
        };

        if inner.config.enable_logging {
            obs::emit_plan_assigned(
                &plan.id,
                &goal_id,
                &agent_id,
                plan.steps.len(),
                plan.total_cost,
            );
        }
        if inner.config.enable_metrics {
            inner.metrics.inc_plans_created();
        }

        if !self.spawn_plan(&plan) {
            return Err(GoapError::NotInitialized);
        }

        Ok(AssignmentOutcome::Assigned {
            goal_id,
            plan_id: plan.id,
            agent_id,
            steps: plan.steps.len(),
            total_cost: plan.total_cost,
            explored_nodes,
            planning_time_ms,
        })
    }

    /// Assign `goals` one by one, highest priority first, earliest deadline
    /// breaking ties. Outcomes are returned in assignment order.
    pub async fn assign_goals(&self, mut goals: Vec<Goal>) -> GoapResult<Vec<AssignmentOutcome>> {
        self.inner.ensure_running()?;
        for goal in &goals {
            goal.validate()?;
        }
        goals.sort_by(Goal::contention_cmp);

        let mut outcomes = Vec::with_capacity(goals.len());
        for goal in goals {
            outcomes.push(self.assign_goal(goal).await?);
        }
        Ok(outcomes)
    }

    /// Ask a plan to stop at its next action boundary.
    ///
    /// Returns `false` if the plan already finished.
    pub fn cancel_plan(&self, plan_id: &str) -> GoapResult<bool> {
        self.inner.ensure_running()?;
        {
            let plans = lock(&self.inner.plans);
            if !plans.active.contains_key(plan_id) {
                if plans.completed.iter().any(|p| p.id == plan_id) {
                    return Ok(false);
                }
                return Err(GoapError::UnknownPlan(plan_id.to_string()));
            }
        }
        match lock(&self.inner.tasks).get(plan_id) {
            Some(task) => {
                let _ = task.cancel.send(Some(CANCEL_REASON.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wait until the plan reaches a terminal status and return it.
    pub async fn wait_for_plan(&self, plan_id: &str) -> GoapResult<Plan> {
        self.inner.ensure_running()?;
        let mut completions = self.inner.completions.subscribe();
        loop {
            {
                let plans = lock(&self.inner.plans);
                if let Some(plan) = plans.completed.iter().find(|p| p.id == plan_id) {
                    return Ok(plan.clone());
                }
                if !plans.active.contains_key(plan_id) {
                    return Err(GoapError::UnknownPlan(plan_id.to_string()));
                }
            }
            if completions.changed().await.is_err() {
                return Err(GoapError::NotInitialized);
            }
        }
    }

    pub fn get_status(&self) -> GoapResult<OrchestratorStatus> {
        let started_at = self.inner.ensure_running()?;
        let (running_plans, completed_plans) = {
            let plans = lock(&self.inner.plans);
            (plans.active.len(), plans.completed.len())
        };
        Ok(OrchestratorStatus {
            active_agents: lock(&self.inner.agents).active_count(),
            running_plans,
            completed_plans,
            system_uptime_ms: started_at.elapsed().as_millis() as u64,
        })
    }

    pub fn get_world_state(&self) -> GoapResult<WorldState> {
        self.inner.ensure_running()?;
        Ok(self.inner.world.snapshot())
    }

    pub fn get_agents(&self) -> GoapResult<Vec<Agent>> {
        self.inner.ensure_running()?;
        Ok(lock(&self.inner.agents).list())
    }

    pub fn get_active_plans(&self) -> GoapResult<Vec<Plan>> {
        self.inner.ensure_running()?;
        Ok(lock(&self.inner.plans).active.values().cloned().collect())
    }

    /// Terminal plans in completion order.
    pub fn get_completed_plans(&self) -> GoapResult<Vec<Plan>> {
        self.inner.ensure_running()?;
        Ok(lock(&self.inner.plans).completed.clone())
    }

    pub fn get_plan(&self, plan_id: &str) -> GoapResult<Plan> {
        self.inner.ensure_running()?;
        let plans = lock(&self.inner.plans);
        plans
            .active
            .get(plan_id)
            .or_else(|| plans.completed.iter().find(|p| p.id == plan_id))
            .cloned()
            .ok_or_else(|| GoapError::UnknownPlan(plan_id.to_string()))
    }

    pub fn add_agent(&self, agent: Agent) -> GoapResult<()> {
        self.inner.ensure_running()?;
        lock(&self.inner.agents).add(agent)
    }

    /// Remove an idle agent; busy agents are refused with `AgentBusy`.
    pub fn remove_agent(&self, agent_id: &str) -> GoapResult<Agent> {
        self.inner.ensure_running()?;
        lock(&self.inner.agents).remove(agent_id)
    }

    pub fn set_agent_active(&self, agent_id: &str, active: bool) -> GoapResult<()> {
        self.inner.ensure_running()?;
        lock(&self.inner.agents).set_active(agent_id, active)
    }

    /// Counter values; all zero when metrics are disabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Start the plan's task. Returns `false` when `stop()` won the race and
    /// the plan was already swept into the completed set as cancelled.
    fn spawn_plan(&self, plan: &Plan) -> bool {
        let inner = &self.inner;
        let (cancel_tx, cancel_rx) = watch::channel(None);
        let span = match (&plan.agent_id, inner.config.enable_logging) {
            (Some(agent_id), true) => obs::plan_span(&plan.id, agent_id),
            _ => tracing::Span::none(),
        };
        let handle = tokio::spawn(
            run_plan(
                Arc::clone(inner),
                plan.id.clone(),
                plan.steps.clone(),
                cancel_rx,
            )
            .instrument(span),
        );

        let mut tasks = lock(&inner.tasks);
        tasks.retain(|_, task| !task.handle.is_finished());
        if inner.is_running() {
            tasks.insert(
                plan.id.clone(),
                PlanTask {
                    handle,
                    cancel: cancel_tx,
                },
            );
            true
        } else {
            handle.abort();
            false
        }
    }
}

impl Inner {
    fn is_running(&self) -> bool {
        matches!(*lock(&self.lifecycle), Lifecycle::Running { .. })
    }

    fn ensure_running(&self) -> GoapResult<Instant> {
        match *lock(&self.lifecycle) {
            Lifecycle::Running { started_at } => Ok(started_at),
            Lifecycle::Created | Lifecycle::Stopped => Err(GoapError::NotInitialized),
        }
    }

    fn on_planning_failed(&self, goal_id: &str, reason: &str, explored_nodes: usize) {
        if self.config.enable_logging {
            obs::emit_assignment_rejected(goal_id, reason, explored_nodes);
        }
        if self.config.enable_metrics {
            self.metrics.inc_planning_failures();
        }
    }

    /// Returns `false` when the plan is no longer active.
    fn mark_running(&self, plan_id: &str) -> bool {
        let mut plans = lock(&self.plans);
        let Some(plan) = plans.active.get_mut(plan_id) else {
            return false;
        };
        if let Err(err) = plan.transition(PlanStatus::Running) {
            warn!(plan_id = %plan_id, error = %err, "could not start plan");
            return false;
        }
        true
    }

    async fn execute_steps(
        &self,
        plan_id: &str,
        steps: &[PlanStep],
        cancel: &watch::Receiver<Option<String>>,
    ) -> Result<(), PlanFailure> {
        for (index, step) in steps.iter().enumerate() {
            let cancelled = cancel.borrow().clone();
            if let Some(reason) = cancelled {
                return Err(PlanFailure::Cancelled { reason });
            }

            let action = self.library.get(&step.action_id).ok_or_else(|| {
                PlanFailure::ActionExecutionFailed {
                    action_id: step.action_id.clone(),
                    reason: "action not found in library".to_string(),
                }
            })?;

            let unmet = self.world.unmet_keys(&action.preconditions);
            if !unmet.is_empty() {
                return Err(PlanFailure::PreconditionViolatedAtExecution {
                    action_id: step.action_id.clone(),
                    keys: unmet,
                });
            }

            let snapshot = self.world.snapshot();
            let outcome = action.execute(&snapshot, &step.params).await;
            // The reported delta is ground truth even when the action failed.
            self.world.apply(&outcome.actual_delta);

            if !outcome.success {
                return Err(PlanFailure::ActionExecutionFailed {
                    action_id: step.action_id.clone(),
                    reason: outcome
                        .error
                        .unwrap_or_else(|| "action reported failure".to_string()),
                });
            }
            self.record_step(plan_id, &step.action_id, index);
        }
        Ok(())
    }

    fn record_step(&self, plan_id: &str, action_id: &str, index: usize) {
        if let Some(plan) = lock(&self.plans).active.get_mut(plan_id) {
            plan.executed_steps += 1;
        }
        if self.config.enable_logging {
            obs::emit_step_completed(plan_id, action_id, index);
        }
        if self.config.enable_metrics {
            self.metrics.inc_actions_executed();
        }
    }

    /// Move a plan to the completed set and free its agent.
    ///
    /// Idempotent: a plan that is no longer active is left alone.
    fn finalize_plan(&self, plan_id: &str, failure: Option<PlanFailure>) {
        let plan = {
            let mut plans = lock(&self.plans);
            let Some(mut plan) = plans.active.remove(plan_id) else {
                return;
            };
            let _span = match (&plan.agent_id, self.config.enable_logging) {
                (Some(agent_id), true) => Some(obs::PlanSpan::enter(plan_id, agent_id)),
                _ => None,
            };

            let result = match failure {
                None => plan.transition(PlanStatus::Succeeded),
                Some(failure) => {
                    if self.config.enable_logging {
                        obs::emit_plan_failed(plan_id, &failure);
                    }
                    plan.fail(failure)
                }
            };
            if let Err(err) = result {
                warn!(plan_id = %plan_id, error = %err, "unexpected plan transition");
            }

            if let Some(agent_id) = &plan.agent_id {
                lock(&self.agents).release(agent_id, plan_id);
            }
            plans.completed.push(plan.clone());
            plan
        };
        self.completions.send_modify(|n| *n += 1);

        if self.config.enable_logging {
            let duration_ms = match (plan.started_at, plan.completed_at) {
                (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
                _ => 0,
            };
            obs::emit_plan_finished(plan_id, plan.status, plan.executed_steps, duration_ms);
        }
        if self.config.enable_metrics {
            match plan.status {
                PlanStatus::Succeeded => self.metrics.inc_plans_succeeded(),
                PlanStatus::Cancelled => self.metrics.inc_plans_cancelled(),
                _ => self.metrics.inc_plans_failed(),
            }
        }
    }
}

async fn run_plan(
    inner: Arc<Inner>,
    plan_id: String,
    steps: Vec<PlanStep>,
    cancel: watch::Receiver<Option<String>>,
) {
    if !inner.mark_running(&plan_id) {
        return;
    }
    let limit_ms = inner.config.execution_timeout_ms;
    let execution = inner.execute_steps(&plan_id, &steps, &cancel);
    let failure = match tokio::time::timeout(Duration::from_millis(limit_ms), execution).await {
        Ok(result) => result.err(),
        Err(_) => Some(PlanFailure::ExecutionTimeout { limit_ms }),
    };
    inner.finalize_plan(&plan_id, failure);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
