//! GOAP Core Library
//!
//! Goal-oriented action planning for a team of worker agents sharing one
//! world state. Goals are planned with a forward A* search over the action
//! library, bound to a capable agent, and executed concurrently.

pub mod action;
pub mod agent;
pub mod config;
pub mod error;
pub mod goal;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod telemetry;
pub mod world_state;

pub use action::catalog::warehouse_actions;
pub use action::{
    executor_fn, Action, ActionExecutor, ActionLibrary, ActionOutcome, ActionParams,
    DeclaredEffectExecutor, FnExecutor,
};
pub use agent::{Agent, AgentRegistry, AgentType};
pub use config::OrchestratorConfig;
pub use error::{GoapError, GoapResult, PlanFailure};
pub use goal::Goal;
pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::{AssignmentOutcome, Orchestrator, OrchestratorStatus};
pub use plan::{Plan, PlanStatus, PlanStep};
pub use planner::{PlanSearch, Planner, PlannerConfig, SearchOutcome};
pub use telemetry::init_tracing;
pub use world_state::{
    distance, satisfies, Conditions, Constraint, Effect, Operator, StateDelta, Value, WorldState,
    WorldStateStore,
};

/// Crate version, for status banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
