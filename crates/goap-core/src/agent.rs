//! Worker agents and the registry that owns them.
//!
//! Capabilities are derived from an agent's role when it is created and never
//! change afterwards. An agent holds at most one non-terminal plan; the
//! registry enforces this in [`AgentRegistry::commit`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::catalog::{
    COUNT_INVENTORY, DISPATCH_TRUCK, LOAD_TRUCK, MOVE_PALLET, PACK_ORDER, PROCESS_ORDER,
    RESTOCK_SHELF,
};
use crate::error::{GoapError, GoapResult};

/// Default agent priority.
pub const DEFAULT_AGENT_PRIORITY: u8 = 5;

/// Warehouse roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Picker,
    Packer,
    ForkliftOperator,
    InventoryClerk,
    Dispatcher,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        AgentType::Picker,
        AgentType::Packer,
        AgentType::ForkliftOperator,
        AgentType::InventoryClerk,
        AgentType::Dispatcher,
    ];

    /// Action ids this role may execute.
    pub fn capabilities(self) -> &'static [&'static str] {
        match self {
            AgentType::Picker => &[PROCESS_ORDER],
            AgentType::Packer => &[PACK_ORDER],
            AgentType::ForkliftOperator => &[MOVE_PALLET, RESTOCK_SHELF, LOAD_TRUCK],
            AgentType::InventoryClerk => &[COUNT_INVENTORY],
            AgentType::Dispatcher => &[DISPATCH_TRUCK],
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            AgentType::Picker => "Picker",
            AgentType::Packer => "Packer",
            AgentType::ForkliftOperator => "Forklift Operator",
            AgentType::InventoryClerk => "Inventory Clerk",
            AgentType::Dispatcher => "Dispatcher",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentType::Picker => "picker",
            AgentType::Packer => "packer",
            AgentType::ForkliftOperator => "forklift-operator",
            AgentType::InventoryClerk => "inventory-clerk",
            AgentType::Dispatcher => "dispatcher",
        };
        write!(f, "{s}")
    }
}

/// An autonomous worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: AgentType,
    capabilities: BTreeSet<String>,
    pub priority: u8,
    pub is_active: bool,
    pub current_plan: Option<String>,
    pub location: String,
    /// When the agent last became free; earlier wins ties.
    pub available_since: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent_type,
            capabilities: agent_type
                .capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            priority: DEFAULT_AGENT_PRIORITY,
            is_active: true,
            current_plan: None,
            location: String::new(),
            available_since: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn can_perform(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }

    pub fn is_available(&self) -> bool {
        self.is_active && self.current_plan.is_none()
    }
}

/// Owns every agent of one orchestrator.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Agent>,
    next_seq: u64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an agent with a generated `<role>-<n>` id.
    pub fn create_agent(
        &mut self,
        agent_type: AgentType,
        name: impl Into<String>,
        priority: u8,
        location: impl Into<String>,
    ) -> Agent {
        let id = loop {
            self.next_seq += 1;
            let candidate = format!("{agent_type}-{}", self.next_seq);
            if !self.agents.contains_key(&candidate) {
                break candidate;
            }
        };
        let agent = Agent::new(id.clone(), name, agent_type)
            .with_priority(priority)
            .with_location(location);
        self.agents.insert(id, agent.clone());
        agent
    }

    /// One agent per role, all located at `site_id`.
    pub fn create_team(&mut self, site_id: &str) -> Vec<Agent> {
        AgentType::ALL
            .into_iter()
            .map(|agent_type| {
                self.create_agent(
                    agent_type,
                    format!("{} ({site_id})", agent_type.display_name()),
                    DEFAULT_AGENT_PRIORITY,
                    site_id,
                )
            })
            .collect()
    }

    pub fn add(&mut self, agent: Agent) -> GoapResult<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(GoapError::DuplicateAgent(agent.id));
        }
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    /// Remove an idle agent. Agents holding a plan cannot be removed.
    pub fn remove(&mut self, agent_id: &str) -> GoapResult<Agent> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| GoapError::UnknownAgent(agent_id.to_string()))?;
        if let Some(plan_id) = &agent.current_plan {
            return Err(GoapError::AgentBusy {
                agent_id: agent_id.to_string(),
                plan_id: plan_id.clone(),
            });
        }
        self.agents
            .remove(agent_id)
            .ok_or_else(|| GoapError::UnknownAgent(agent_id.to_string()))
    }

    pub fn set_active(&mut self, agent_id: &str, active: bool) -> GoapResult<()> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| GoapError::UnknownAgent(agent_id.to_string()))?;
        agent.is_active = active;
        Ok(())
    }

    /// Pick the best free agent able to perform every action in `required`.
    ///
    /// Highest priority wins; ties go to the agent free the longest, then to
    /// the lowest id.
    pub fn find_eligible_agent(&self, required: &BTreeSet<String>) -> Option<&Agent> {
        self.agents
            .values()
            .filter(|a| a.is_available() && a.can_perform(required))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.available_since.cmp(&b.available_since))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Bind `plan_id` to the agent. Fails if it already holds a plan.
    pub fn commit(&mut self, agent_id: &str, plan_id: &str) -> GoapResult<()> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| GoapError::UnknownAgent(agent_id.to_string()))?;
        if let Some(current) = &agent.current_plan {
            return Err(GoapError::AgentBusy {
                agent_id: agent_id.to_string(),
                plan_id: current.clone(),
            });
        }
        agent.current_plan = Some(plan_id.to_string());
        Ok(())
    }

    /// Free the agent if it still holds `plan_id`. Returns whether it did.
    pub fn release(&mut self, agent_id: &str, plan_id: &str) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(agent) if agent.current_plan.as_deref() == Some(plan_id) => {
                agent.current_plan = None;
                agent.available_since = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_active).count()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
