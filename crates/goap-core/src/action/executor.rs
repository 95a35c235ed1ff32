//! Runtime side of an action: the async executor and its reported outcome.
//!
//! Declared effects only steer the planner. What an executor returns in
//! [`ActionOutcome::actual_delta`] is what gets applied to the live world.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::world_state::{StateDelta, WorldState};

/// Parameters bound to one plan step.
pub type ActionParams = std::collections::BTreeMap<String, serde_json::Value>;

/// What an executor reports after running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub actual_delta: StateDelta,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(actual_delta: StateDelta) -> Self {
        Self {
            success: true,
            actual_delta,
            error: None,
        }
    }

    /// Failure with no observable change to the world.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::failed_with(StateDelta::new(), reason)
    }

    /// Failure that still changed part of the world before giving up.
    pub fn failed_with(actual_delta: StateDelta, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            actual_delta,
            error: Some(reason.into()),
        }
    }
}

/// Performs an action against the world.
///
/// `state` is a snapshot of the live world taken just before the call.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, state: &WorldState, params: &ActionParams) -> ActionOutcome;
}

/// Reports the declared effects as the actual delta, after an optional
/// simulated latency.
#[derive(Debug, Clone)]
pub struct DeclaredEffectExecutor {
    effects: StateDelta,
    latency: Duration,
}

impl DeclaredEffectExecutor {
    pub fn new(effects: StateDelta, latency: Duration) -> Self {
        Self { effects, latency }
    }
}

#[async_trait]
impl ActionExecutor for DeclaredEffectExecutor {
    async fn execute(&self, _state: &WorldState, _params: &ActionParams) -> ActionOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        ActionOutcome::succeeded(self.effects.clone())
    }
}

/// Adapts an async closure into an [`ActionExecutor`].
///
/// The closure receives owned copies of the snapshot and params so the
/// returned future can be `'static`.
pub struct FnExecutor<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ActionExecutor for FnExecutor<F>
where
    F: Fn(WorldState, ActionParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionOutcome> + Send + 'static,
{
    async fn execute(&self, state: &WorldState, params: &ActionParams) -> ActionOutcome {
        (self.f)(state.clone(), params.clone()).await
    }
}

/// Wrap an async closure as a shareable executor.
pub fn executor_fn<F, Fut>(f: F) -> Arc<dyn ActionExecutor>
where
    F: Fn(WorldState, ActionParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionOutcome> + Send + 'static,
{
    Arc::new(FnExecutor { f })
}
