//! Structured observability hooks for goal and plan lifecycle events.
//!
//! This module provides:
//! - Plan-scoped tracing spans via the `PlanSpan` RAII guard
//! - Emission functions for key lifecycle events: goal received, plan
//!   assigned, step completed, plan finished, assignment rejected
//!
//! The orchestrator only calls these when `enable_logging` is set.

use tracing::info;

use crate::plan::PlanStatus;

/// RAII guard that enters a plan-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = PlanSpan::enter("plan-123", "forklift-1");
/// // every tracing call below carries plan_id and agent_id
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(plan_id: &str, agent_id: &str) -> Self {
        let span = tracing::info_span!("goap.plan", plan_id = %plan_id, agent_id = %agent_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Build (without entering) the span a plan task runs inside.
pub fn plan_span(plan_id: &str, agent_id: &str) -> tracing::Span {
    tracing::info_span!("goap.plan", plan_id = %plan_id, agent_id = %agent_id)
}

pub fn emit_goal_received(goal_id: &str, priority: u8) {
    info!(event = "goal.received", goal_id = %goal_id, priority = priority);
}

/// Emit event: a plan was bound to an agent.
pub fn emit_plan_assigned(plan_id: &str, goal_id: &str, agent_id: &str, steps: usize, cost: f64) {
    info!(
        event = "plan.assigned",
        plan_id = %plan_id,
        goal_id = %goal_id,
        agent_id = %agent_id,
        steps = steps,
        cost = cost,
    );
}

/// Emit event: assignment rejected (infeasible, timed out, or no agent).
pub fn emit_assignment_rejected(goal_id: &str, reason: &str, explored_nodes: usize) {
    info!(
        event = "goal.rejected",
        goal_id = %goal_id,
        reason = %reason,
        explored_nodes = explored_nodes,
    );
}

pub fn emit_step_completed(plan_id: &str, action_id: &str, index: usize) {
    info!(event = "plan.step_completed", plan_id = %plan_id, action_id = %action_id, index = index);
}

/// Emit event: plan reached a terminal status.
pub fn emit_plan_finished(plan_id: &str, status: PlanStatus, executed_steps: usize, duration_ms: u64) {
    info!(
        event = "plan.finished",
        plan_id = %plan_id,
        status = %status,
        executed_steps = executed_steps,
        duration_ms = duration_ms,
    );
}

/// Emit event: plan failed (warning level).
pub fn emit_plan_failed(plan_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "plan.failed", plan_id = %plan_id, error = %error);
}
