//! Goals: desired world-state configurations submitted by callers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GoapError, GoapResult};
use crate::world_state::{Conditions, Constraint};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
const DEFAULT_PRIORITY: u8 = 5;

/// A target world-state configuration with priority and optional deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub target_state: Conditions,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Free-form parameters bound into every step of the resulting plan.
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Goal {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            target_state: Conditions::new(),
            priority: DEFAULT_PRIORITY,
            deadline: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, key: impl Into<String>, constraint: Constraint) -> Self {
        self.target_state.insert(key.into(), constraint);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> GoapResult<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(GoapError::InvalidGoal {
                goal_id: self.id.clone(),
                reason: format!(
                    "priority {} outside [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                    self.priority
                ),
            });
        }
        Ok(())
    }

    /// Contention order: higher priority first, then earliest deadline.
    ///
    /// Goals without a deadline sort after goals with one.
    pub fn contention_cmp(&self, other: &Goal) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| match (self.deadline, other.deadline) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}
