//! Plans: ordered, agent-bound action sequences and their lifecycle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GoapError, GoapResult, PlanFailure};
use crate::goal::Goal;

/// Plan lifecycle status.
///
/// `Pending → Running → {Succeeded | Failed | Cancelled}`; a pending plan may
/// also be cancelled or fail before its first action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanStatus::Succeeded | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: PlanStatus) -> bool {
        matches!(
            (self, next),
            (PlanStatus::Pending, PlanStatus::Running)
                | (PlanStatus::Pending, PlanStatus::Failed)
                | (PlanStatus::Pending, PlanStatus::Cancelled)
                | (PlanStatus::Running, PlanStatus::Succeeded)
                | (PlanStatus::Running, PlanStatus::Failed)
                | (PlanStatus::Running, PlanStatus::Cancelled)
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Running => "running",
            PlanStatus::Succeeded => "succeeded",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One action bound into a plan, with its resolved parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action_id: String,
    pub name: String,
    pub cost: f64,
    pub estimated_duration_ms: u64,
    pub params: BTreeMap<String, serde_json::Value>,
}

/// An ordered action sequence computed for a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: Goal,
    pub agent_id: Option<String>,
    pub steps: Vec<PlanStep>,
    pub total_cost: f64,
    pub status: PlanStatus,
    pub estimated_duration_ms: u64,
    /// Number of steps whose action completed successfully.
    pub executed_steps: usize,
    pub failure: Option<PlanFailure>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Plan {
    pub fn new(goal: Goal, steps: Vec<PlanStep>) -> Self {
        let total_cost = steps.iter().map(|s| s.cost).sum();
        let estimated_duration_ms = steps.iter().map(|s| s.estimated_duration_ms).sum();
        Self {
            id: Uuid::new_v4().to_string(),
            goal,
            agent_id: None,
            steps,
            total_cost,
            status: PlanStatus::Pending,
            estimated_duration_ms,
            executed_steps: 0,
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Action ids an agent must be capable of to execute this plan.
    pub fn required_actions(&self) -> BTreeSet<String> {
        self.steps.iter().map(|s| s.action_id.clone()).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, stamping start/completion times.
    pub fn transition(&mut self, next: PlanStatus) -> GoapResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(GoapError::InvalidTransition {
                plan_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        if next == PlanStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Terminate with `failure`, choosing `Failed` or `Cancelled` accordingly.
    pub fn fail(&mut self, failure: PlanFailure) -> GoapResult<()> {
        self.transition(failure.terminal_status())?;
        self.failure = Some(failure);
        Ok(())
    }
}
