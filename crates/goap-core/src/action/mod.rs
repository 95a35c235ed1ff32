//! Action library: preconditioned operations the planner chains together.
//!
//! # Module layout
//!
//! - [`executor`]: `ActionExecutor`, `ActionOutcome`, built-in executors
//! - [`catalog`]: the default warehouse catalog and its action ids
//!
//! An [`Action`] is a data record plus an executor handle. Plans refer to
//! actions by id; the orchestrator resolves the executor from the library
//! when the step runs.

pub mod catalog;
pub mod executor;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{GoapError, GoapResult};
use crate::plan::PlanStep;
use crate::world_state::{Conditions, Constraint, Effect, StateDelta, WorldState};

pub use executor::{
    executor_fn, ActionExecutor, ActionOutcome, ActionParams, DeclaredEffectExecutor, FnExecutor,
};

/// Immutable action template.
#[derive(Clone)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub description: String,
    pub preconditions: Conditions,
    /// Predicted effects, used only during search.
    pub effects: StateDelta,
    pub cost: f64,
    pub estimated_duration_ms: u64,
    /// Default parameters bound into every plan step using this action.
    pub params: ActionParams,
    executor: Option<Arc<dyn ActionExecutor>>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .field("cost", &self.cost)
            .field("custom_executor", &self.executor.is_some())
            .finish()
    }
}

impl Action {
    /// New action with unit cost and no preconditions or effects.
    ///
    /// Without [`Action::with_executor`] the action reports its declared
    /// effects as the actual outcome.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            preconditions: Conditions::new(),
            effects: StateDelta::new(),
            cost: 1.0,
            estimated_duration_ms: 0,
            params: ActionParams::new(),
            executor: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_precondition(mut self, key: impl Into<String>, constraint: Constraint) -> Self {
        self.preconditions.insert(key.into(), constraint);
        self
    }

    pub fn with_effect(mut self, key: impl Into<String>, effect: Effect) -> Self {
        self.effects.insert(key.into(), effect);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_duration_ms(mut self, estimated_duration_ms: u64) -> Self {
        self.estimated_duration_ms = estimated_duration_ms;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn is_applicable(&self, state: &WorldState) -> bool {
        state.satisfies(&self.preconditions)
    }

    /// The state the planner expects after running this action on `state`.
    pub fn predict(&self, state: &WorldState) -> WorldState {
        let mut next = state.clone();
        next.apply(&self.effects);
        next
    }

    /// Bind this action into a plan step; `context` overrides default params.
    pub fn bind(&self, context: &BTreeMap<String, serde_json::Value>) -> PlanStep {
        let mut params = self.params.clone();
        params.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        PlanStep {
            action_id: self.id.clone(),
            name: self.name.clone(),
            cost: self.cost,
            estimated_duration_ms: self.estimated_duration_ms,
            params,
        }
    }

    pub async fn execute(&self, state: &WorldState, params: &ActionParams) -> ActionOutcome {
        match &self.executor {
            Some(executor) => executor.execute(state, params).await,
            None => ActionOutcome::succeeded(self.effects.clone()),
        }
    }

    fn validate(&self) -> GoapResult<()> {
        if self.id.trim().is_empty() {
            return Err(GoapError::InvalidAction {
                action_id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(GoapError::InvalidAction {
                action_id: self.id.clone(),
                reason: format!("cost must be finite and non-negative, got {}", self.cost),
            });
        }
        Ok(())
    }
}

/// Flat, static catalog of actions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ActionLibrary {
    actions: BTreeMap<String, Action>,
}

impl ActionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library, rejecting invalid or duplicate actions.
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> GoapResult<Self> {
        let mut library = Self::new();
        for action in actions {
            library.register(action)?;
        }
        Ok(library)
    }

    /// The default warehouse catalog with instantaneous executors.
    pub fn warehouse() -> Self {
        Self {
            actions: catalog::warehouse_actions(false)
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }

    pub fn register(&mut self, action: Action) -> GoapResult<()> {
        action.validate()?;
        if self.actions.contains_key(&action.id) {
            return Err(GoapError::InvalidAction {
                action_id: action.id,
                reason: "duplicate action id".to_string(),
            });
        }
        self.actions.insert(action.id.clone(), action);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Action> {
        self.actions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    pub fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    /// Actions whose preconditions hold in `state`, in id order.
    pub fn applicable<'a>(&'a self, state: &'a WorldState) -> impl Iterator<Item = &'a Action> {
        self.actions.values().filter(move |a| a.is_applicable(state))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
