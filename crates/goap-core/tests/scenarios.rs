use std::time::{Duration, Instant};

use goap_core::{
    executor_fn, Action, ActionLibrary, ActionOutcome, ActionParams, AgentRegistry,
    AssignmentOutcome, Constraint, Effect, Goal, GoapError, Operator, Orchestrator,
    OrchestratorConfig, PlanFailure, PlanStatus, Planner, PlannerConfig, SearchOutcome,
    StateDelta, Value, WorldState,
};

fn process_order() -> Action {
    Action::new("process_order", "Process order")
        .with_precondition("staff_available", Constraint::literal(true))
        .with_effect("orders_in_queue", Effect::Delta(-1.0))
        .with_cost(1.0)
}

fn three_orders() -> WorldState {
    WorldState::new()
        .with("orders_in_queue", Value::list(["A", "B", "C"]))
        .with("staff_available", true)
}

fn clear_queue() -> Goal {
    Goal::new("clear-queue", "Clear the order queue")
        .with_target("orders_in_queue", Constraint::compare(Operator::Lt, 1))
}

fn team_orchestrator(library: ActionLibrary, config: OrchestratorConfig) -> Orchestrator {
    let mut agents = AgentRegistry::new();
    agents.create_team("north");
    let orch = Orchestrator::new(config, library, agents).unwrap();
    orch.start().unwrap();
    orch
}

#[test]
fn test_planner_finds_three_step_plan_for_three_orders() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let planner = Planner::new(PlannerConfig {
        max_depth: 10,
        timeout: Duration::from_secs(5),
    });

    let search = planner.plan(&three_orders(), &clear_queue(), &library).unwrap();
    match search.outcome {
        SearchOutcome::Found { steps, total_cost } => {
            assert_eq!(steps.len(), 3);
            assert!(steps.iter().all(|s| s.action_id == "process_order"));
            assert_eq!(total_cost, 3.0);
        }
        other => panic!("expected a plan, got {other:?}"),
    }
}

#[tokio::test]
async fn test_assign_goal_binds_queue_plan_to_picker_and_drains_queue() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(three_orders()).unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    let (plan_id, agent_id) = match &outcome {
        AssignmentOutcome::Assigned {
            plan_id,
            agent_id,
            steps,
            total_cost,
            ..
        } => {
            assert_eq!(*steps, 3);
            assert_eq!(*total_cost, 3.0);
            (plan_id.clone(), agent_id.clone())
        }
        other => panic!("expected assignment, got {other:?}"),
    };

    let agent = orch
        .get_agents()
        .unwrap()
        .into_iter()
        .find(|a| a.id == agent_id)
        .unwrap();
    assert!(agent.capabilities().contains("process_order"));

    let plan = orch.wait_for_plan(&plan_id).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Succeeded);
    assert_eq!(plan.executed_steps, 3);
    assert_eq!(
        orch.get_world_state().unwrap().get("orders_in_queue"),
        Some(&Value::list(Vec::<String>::new()))
    );
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_goal_needing_missing_capability_reports_no_eligible_agent() {
    let library = ActionLibrary::from_actions([Action::new("launch_drone", "Launch drone")
        .with_precondition("drone_charged", Constraint::literal(true))
        .with_effect("drone_airborne", Effect::set(true))])
    .unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(WorldState::new().with("drone_charged", true))
        .unwrap();
    let before = orch.get_world_state().unwrap();

    let goal = Goal::new("fly", "Get the drone up")
        .with_target("drone_airborne", Constraint::literal(true));
    let outcome = orch.assign_goal(goal).await.unwrap();

    match outcome {
        AssignmentOutcome::NoEligibleAgent {
            required_actions, ..
        } => assert!(required_actions.contains("launch_drone")),
        other => panic!("expected NoEligibleAgent, got {other:?}"),
    }
    assert_eq!(orch.get_world_state().unwrap(), before);
    assert!(orch.get_active_plans().unwrap().is_empty());
    assert_eq!(orch.metrics().no_eligible_agent, 1);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_infeasible_goal_is_distinct_from_no_eligible_agent() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(three_orders().with("staff_available", false))
        .unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    assert!(matches!(
        outcome,
        AssignmentOutcome::PlanningInfeasible { .. }
    ));
    assert_eq!(orch.metrics().planning_failures, 1);
    assert_eq!(orch.get_status().unwrap().running_plans, 0);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_forklift_goal_sees_committed_operator() {
    let slow = executor_fn(|_state: WorldState, _params: ActionParams| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        ActionOutcome::succeeded(StateDelta::from([(
            "pallets_staged".to_string(),
            Effect::Delta(1.0),
        )]))
    });
    let library = ActionLibrary::from_actions([Action::new("move_pallet", "Move pallet")
        .with_precondition("equipment_available", Constraint::literal(true))
        .with_effect("pallets_staged", Effect::Delta(1.0))
        .with_cost(2.0)
        .with_executor(slow)])
    .unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(
        WorldState::new()
            .with("equipment_available", true)
            .with("pallets_staged", 0),
    )
    .unwrap();

    let goal = |id: &str| {
        Goal::new(id, "Stage a pallet")
            .with_target("pallets_staged", Constraint::compare(Operator::Ge, 1))
    };
    let first = orch.assign_goal(goal("stage-1")).await.unwrap();
    let second = orch.assign_goal(goal("stage-2")).await.unwrap();

    assert!(first.is_assigned());
    assert!(first.agent_id().unwrap().starts_with("forklift-operator"));
    assert!(matches!(
        second,
        AssignmentOutcome::NoEligibleAgent { .. }
    ));

    let plan = orch.wait_for_plan(first.plan_id().unwrap()).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Succeeded);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_action_with_zero_delta_leaves_world_unchanged() {
    let failing = executor_fn(|_state: WorldState, _params: ActionParams| async move {
        ActionOutcome::failed("scanner offline")
    });
    let library =
        ActionLibrary::from_actions([process_order().with_executor(failing)]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(three_orders()).unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    let agent_id = outcome.agent_id().unwrap().to_string();
    let plan = orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.executed_steps, 0);
    assert_eq!(
        plan.failure,
        Some(PlanFailure::ActionExecutionFailed {
            action_id: "process_order".to_string(),
            reason: "scanner offline".to_string(),
        })
    );
    assert_eq!(
        orch.get_world_state().unwrap().get("orders_in_queue"),
        Some(&Value::list(["A", "B", "C"]))
    );
    let agent = orch
        .get_agents()
        .unwrap()
        .into_iter()
        .find(|a| a.id == agent_id)
        .unwrap();
    assert!(agent.current_plan.is_none());
    assert_eq!(orch.metrics().plans_failed, 1);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_precondition_lost_mid_plan_fails_with_violation() {
    let exhausting = executor_fn(|_state: WorldState, _params: ActionParams| async move {
        ActionOutcome::succeeded(StateDelta::from([
            ("orders_in_queue".to_string(), Effect::Delta(-1.0)),
            ("staff_available".to_string(), Effect::set(false)),
        ]))
    });
    let library =
        ActionLibrary::from_actions([process_order().with_executor(exhausting)]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(three_orders()).unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    let plan = orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.executed_steps, 1);
    assert_eq!(
        plan.failure,
        Some(PlanFailure::PreconditionViolatedAtExecution {
            action_id: "process_order".to_string(),
            keys: vec!["staff_available".to_string()],
        })
    );
    // Effects of the step that did run are kept.
    assert_eq!(
        orch.get_world_state().unwrap().get("orders_in_queue"),
        Some(&Value::list(["B", "C"]))
    );
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_slow_plan_is_failed_by_execution_timeout() {
    let stuck = executor_fn(|_state: WorldState, _params: ActionParams| async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        ActionOutcome::succeeded(StateDelta::new())
    });
    let library = ActionLibrary::from_actions([process_order().with_executor(stuck)]).unwrap();
    let config = OrchestratorConfig {
        execution_timeout_ms: 100,
        ..Default::default()
    };
    let orch = team_orchestrator(library, config);
    orch.update_world_state(three_orders()).unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    let plan = orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(
        plan.failure,
        Some(PlanFailure::ExecutionTimeout { limit_ms: 100 })
    );
    assert!(orch
        .get_agents()
        .unwrap()
        .iter()
        .all(|a| a.current_plan.is_none()));
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_already_satisfied_goal_completes_with_zero_steps() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(WorldState::new().with("orders_in_queue", 0))
        .unwrap();

    let outcome = orch.assign_goal(clear_queue()).await.unwrap();
    match &outcome {
        AssignmentOutcome::Assigned { steps, .. } => assert_eq!(*steps, 0),
        other => panic!("expected assignment, got {other:?}"),
    }
    let plan = orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Succeeded);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_goal_with_empty_target_is_assigned_a_zero_step_plan() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());

    let outcome = orch
        .assign_goal(Goal::new("noop", "Nothing to do"))
        .await
        .unwrap();
    match &outcome {
        AssignmentOutcome::Assigned { steps, .. } => assert_eq!(*steps, 0),
        other => panic!("expected assignment, got {other:?}"),
    }
    let plan = orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Succeeded);
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_assign_goal_reports_planning_timeout_within_budget() {
    let counters = (0..12).map(|i| {
        Action::new(format!("inc_{i}"), format!("Increment counter {i}"))
            .with_effect(format!("counter_{i}"), Effect::Delta(1.0))
    });
    let library = ActionLibrary::from_actions(counters).unwrap();
    let config = OrchestratorConfig {
        planning_timeout_ms: 50,
        max_planning_depth: 40,
        ..OrchestratorConfig::default()
    };
    let orch = team_orchestrator(library, config);
    let goal = Goal::new("unreachable", "Set a key no action touches")
        .with_target("never_set", Constraint::literal(true));

    let started = Instant::now();
    let outcome = orch.assign_goal(goal).await.unwrap();
    let elapsed = started.elapsed();

    match &outcome {
        AssignmentOutcome::PlanningTimeout {
            explored_nodes,
            planning_time_ms,
            ..
        } => {
            assert!(*explored_nodes > 0);
            assert!(*planning_time_ms >= 50);
        }
        other => panic!("expected planning timeout, got {other:?}"),
    }
    assert!(elapsed < Duration::from_millis(50 + 500), "took {elapsed:?}");
    assert_eq!(orch.metrics().planning_failures, 1);
    assert!(orch.get_active_plans().unwrap().is_empty());
    orch.stop().await.unwrap();
}

#[tokio::test]
async fn test_operations_after_stop_are_not_initialized() {
    let library = ActionLibrary::from_actions([process_order()]).unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.stop().await.unwrap();

    assert!(matches!(
        orch.assign_goal(clear_queue()).await,
        Err(GoapError::NotInitialized)
    ));
    assert!(matches!(
        orch.update_world_state(WorldState::new()),
        Err(GoapError::NotInitialized)
    ));
    assert!(matches!(orch.get_agents(), Err(GoapError::NotInitialized)));
    assert!(matches!(orch.stop().await, Err(GoapError::NotInitialized)));
}

#[tokio::test]
async fn test_goal_context_reaches_the_executor() {
    let recording = executor_fn(|_state: WorldState, params: ActionParams| async move {
        let dock = params
            .get("dock")
            .and_then(|v| v.as_str())
            .unwrap_or("none")
            .to_string();
        ActionOutcome::succeeded(StateDelta::from([
            ("orders_in_queue".to_string(), Effect::Delta(-1.0)),
            ("last_dock".to_string(), Effect::set(dock)),
        ]))
    });
    let library = ActionLibrary::from_actions([process_order()
        .with_param("dock", serde_json::json!("default"))
        .with_executor(recording)])
    .unwrap();
    let orch = team_orchestrator(library, OrchestratorConfig::default());
    orch.update_world_state(
        WorldState::new()
            .with("orders_in_queue", Value::list(["A"]))
            .with("staff_available", true),
    )
    .unwrap();

    let goal = clear_queue().with_context("dock", serde_json::json!("dock-7"));
    let outcome = orch.assign_goal(goal).await.unwrap();
    orch.wait_for_plan(outcome.plan_id().unwrap()).await.unwrap();

    assert_eq!(
        orch.get_world_state().unwrap().get("last_dock"),
        Some(&Value::from("dock-7"))
    );
    orch.stop().await.unwrap();
}
