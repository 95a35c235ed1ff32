//! Atomic counters for orchestrator observability.
//!
//! Each orchestrator owns its own [`Metrics`]; counters are incremented
//! silently at the call site. Call [`Metrics::flush`] to emit current values
//! as a single `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lightweight atomic counters, no allocations, no locking.
#[derive(Debug, Default)]
pub struct Metrics {
    goals_received: AtomicU64,
    plans_created: AtomicU64,
    plans_succeeded: AtomicU64,
    plans_failed: AtomicU64,
    plans_cancelled: AtomicU64,
    planning_failures: AtomicU64,
    no_eligible_agent: AtomicU64,
    actions_executed: AtomicU64,
    nodes_explored: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub goals_received: u64,
    pub plans_created: u64,
    pub plans_succeeded: u64,
    pub plans_failed: u64,
    pub plans_cancelled: u64,
    pub planning_failures: u64,
    pub no_eligible_agent: u64,
    pub actions_executed: u64,
    pub nodes_explored: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_goals_received(&self) {
        self.goals_received.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "goals_received", "counter incremented");
    }

    pub fn inc_plans_created(&self) {
        self.plans_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plans_created", "counter incremented");
    }

    pub fn inc_plans_succeeded(&self) {
        self.plans_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plans_succeeded", "counter incremented");
    }

    pub fn inc_plans_failed(&self) {
        self.plans_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plans_failed", "counter incremented");
    }

    pub fn inc_plans_cancelled(&self) {
        self.plans_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plans_cancelled", "counter incremented");
    }

    pub fn inc_planning_failures(&self) {
        self.planning_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "planning_failures", "counter incremented");
    }

    pub fn inc_no_eligible_agent(&self) {
        self.no_eligible_agent.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "no_eligible_agent", "counter incremented");
    }

    pub fn inc_actions_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "actions_executed", "counter incremented");
    }

    /// Add the node count of one planning call.
    pub fn add_nodes_explored(&self, n: u64) {
        self.nodes_explored.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            goals_received: self.goals_received.load(Ordering::Relaxed),
            plans_created: self.plans_created.load(Ordering::Relaxed),
            plans_succeeded: self.plans_succeeded.load(Ordering::Relaxed),
            plans_failed: self.plans_failed.load(Ordering::Relaxed),
            plans_cancelled: self.plans_cancelled.load(Ordering::Relaxed),
            planning_failures: self.planning_failures.load(Ordering::Relaxed),
            no_eligible_agent: self.no_eligible_agent.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            nodes_explored: self.nodes_explored.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (shutdown, daemon tick) rather than on
    /// every increment.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            goals_received = s.goals_received,
            plans_created = s.plans_created,
            plans_succeeded = s.plans_succeeded,
            plans_failed = s.plans_failed,
            plans_cancelled = s.plans_cancelled,
            planning_failures = s.planning_failures,
            no_eligible_agent = s.no_eligible_agent,
            actions_executed = s.actions_executed,
            nodes_explored = s.nodes_explored,
        );
    }
}
