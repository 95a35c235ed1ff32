use std::io::Write;
use std::time::Duration;

use goap_core::{
    warehouse_actions, ActionLibrary, AgentRegistry, GoapError, Orchestrator,
    OrchestratorConfig, PlannerConfig,
};

#[test]
fn test_config_file_round_trips_into_orchestrator() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
max_planning_depth = 6
planning_timeout_ms = 250
execution_timeout_ms = 1000
enable_logging = false
"#
    )?;

    let config = OrchestratorConfig::load(file.path())?;
    assert_eq!(config.max_planning_depth, 6);
    assert!(!config.enable_logging);
    assert!(config.enable_metrics);

    let planner = PlannerConfig::from(&config);
    assert_eq!(planner.max_depth, 6);
    assert_eq!(planner.timeout, Duration::from_millis(250));

    let library = ActionLibrary::from_actions(warehouse_actions(false))?;
    let mut agents = AgentRegistry::new();
    agents.create_team("east");
    let orch = Orchestrator::new(config.clone(), library, agents)?;
    assert_eq!(orch.config(), &config);
    Ok(())
}

#[test]
fn test_zero_timeout_in_file_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("goapd.toml");
    std::fs::write(&path, "planning_timeout_ms = 0\n")?;

    let err = OrchestratorConfig::load(&path).unwrap_err();
    assert!(matches!(err, GoapError::InvalidConfig(_)));
    Ok(())
}

#[test]
fn test_missing_config_file_is_an_io_error() {
    let err = OrchestratorConfig::load("/definitely/not/here/goapd.toml").unwrap_err();
    assert!(matches!(err, GoapError::Io(_)));
}
