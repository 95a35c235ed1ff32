//! Error taxonomy for the GOAP engine.
//!
//! Three families of failure exist, and each travels differently:
//!
//! - Assignment outcomes (`PlanningInfeasible`, `PlanningTimeout`,
//!   `NoEligibleAgent`) are expected and recoverable. They are returned as
//!   [`AssignmentOutcome`](crate::orchestrator::AssignmentOutcome) variants
//!   inside `Ok(..)`.
//! - Execution failures (`ActionExecutionFailed`,
//!   `PreconditionViolatedAtExecution`, `ExecutionTimeout`) terminate one
//!   plan and are recorded on it as a [`PlanFailure`].
//! - Contract violations such as [`GoapError::NotInitialized`] are returned
//!   as `Err(..)`.

use serde::{Deserialize, Serialize};

use crate::plan::PlanStatus;

/// Errors returned by the GOAP engine.
#[derive(Debug, thiserror::Error)]
pub enum GoapError {
    #[error("orchestrator not initialized: call start() before use and do not use after stop()")]
    NotInitialized,

    #[error("orchestrator already started")]
    AlreadyStarted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid goal {goal_id}: {reason}")]
    InvalidGoal { goal_id: String, reason: String },

    #[error("invalid action {action_id}: {reason}")]
    InvalidAction { action_id: String, reason: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    #[error("agent {agent_id} is busy with plan {plan_id}")]
    AgentBusy { agent_id: String, plan_id: String },

    #[error("invalid plan transition for {plan_id}: {from} -> {to}")]
    InvalidTransition {
        plan_id: String,
        from: PlanStatus,
        to: PlanStatus,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("planning task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for GOAP operations.
pub type GoapResult<T> = std::result::Result<T, GoapError>;

/// Why a plan ended without succeeding.
///
/// Recorded on the [`Plan`](crate::plan::Plan) and never propagated past the
/// task that executed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanFailure {
    #[error("action {action_id} failed: {reason}")]
    ActionExecutionFailed { action_id: String, reason: String },

    #[error("precondition violated at execution time for action {action_id} (keys: {keys:?})")]
    PreconditionViolatedAtExecution {
        action_id: String,
        keys: Vec<String>,
    },

    #[error("plan execution exceeded {limit_ms}ms")]
    ExecutionTimeout { limit_ms: u64 },

    #[error("plan cancelled: {reason}")]
    Cancelled { reason: String },
}

impl PlanFailure {
    /// Terminal status a plan takes when it ends with this failure.
    pub fn terminal_status(&self) -> PlanStatus {
        match self {
            PlanFailure::Cancelled { .. } => PlanStatus::Cancelled,
            _ => PlanStatus::Failed,
        }
    }
}
