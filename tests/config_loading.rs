use std::io::Write;

use plansmith_core::config::{AgentKind, PlannerKind, PlansmithConfig, SelectionPolicy};
use plansmith_core::error::PlannerError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[planner]
name = "storyteller"
kind = "p2p"
goal = "story"

[p2p]
max_invocations = 5
selection = "on_state_change"

[p2p.exit]
key = "score"
threshold = 0.8

[executor]
max_steps = 20

[journal]
path = "/tmp/plansmith-test/journal.jsonl"

[log]
level = "debug"

[[agents]]
name = "seed"
output_key = "topic"
kind = { type = "constant", value = "dragons" }

[[agents]]
name = "writer"
description = "Writes a story"
arguments = ["topic"]
output_key = "story"
kind = { type = "template", template = "Once upon a time, {{topic}}." }

[[agents]]
name = "scorer"
arguments = ["story"]
output_key = "score"
kind = { type = "command", command = "echo 0.9" }
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = PlansmithConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.planner.name, "storyteller");
    assert_eq!(config.planner.kind, PlannerKind::PeerToPeer);
    assert_eq!(config.planner.goal.as_deref(), Some("story"));
    assert_eq!(config.p2p.max_invocations, 5);
    assert_eq!(config.p2p.selection, SelectionPolicy::OnStateChange);
    let exit = config.p2p.exit.as_ref().expect("exit condition");
    assert_eq!(exit.key, "score");
    assert_eq!(exit.threshold, 0.8);
    assert_eq!(config.executor.max_steps, 20);

    let journal = config.journal.as_ref().expect("journal present");
    assert!(journal.enabled);
    assert_eq!(
        journal.journal_path().to_str(),
        Some("/tmp/plansmith-test/journal.jsonl")
    );
    assert_eq!(config.log.as_ref().map(|l| l.level.as_str()), Some("debug"));

    assert_eq!(config.agents.len(), 3);
    assert!(matches!(config.agents[0].kind, AgentKind::Constant { .. }));
    assert_eq!(config.agents[1].description, "Writes a story");
    match &config.agents[2].kind {
        AgentKind::Command {
            command,
            timeout_secs,
        } => {
            assert_eq!(command, "echo 0.9");
            assert_eq!(*timeout_secs, 30);
        }
        other => panic!("unexpected agent kind: {:?}", other),
    }
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("PLANSMITH_TEST_GOAL", "summary");

    let toml_content = r#"
[planner]
goal = "${PLANSMITH_TEST_GOAL}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = PlansmithConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.planner.goal.as_deref(), Some("summary"));

    std::env::remove_var("PLANSMITH_TEST_GOAL");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let (_dir, path) = plansmith_test_utils::config_file("[planner]\ngoal = \"story\"\n");

    let config = PlansmithConfig::load(&path).expect("load config");

    assert_eq!(config.planner.kind, PlannerKind::GoalOriented);
    assert_eq!(config.p2p.max_invocations, 10);
    assert!(config.p2p.exit.is_none());
    assert_eq!(config.executor.max_steps, 100);
    assert!(config.journal.is_none());
    assert!(config.log.is_none());
    assert!(config.agents.is_empty());
}

#[test]
fn test_missing_file() {
    let err = PlansmithConfig::load(std::path::Path::new("/nonexistent/plansmith.toml")).unwrap_err();
    assert!(matches!(err, PlannerError::ConfigNotFound(_)));
}

#[test]
fn test_validation_errors() {
    let cases = [
        // goal-oriented without goal
        "[planner]\nkind = \"goal_oriented\"\n",
        // zero invocation cap
        "[planner]\nkind = \"p2p\"\n[p2p]\nmax_invocations = 0\n",
        // duplicate agents
        r#"
[planner]
kind = "sequence"

[[agents]]
name = "a"
output_key = "x"
kind = { type = "constant", value = 1 }

[[agents]]
name = "a"
output_key = "y"
kind = { type = "constant", value = 2 }
"#,
        // malformed toml
        "[planner\n",
    ];

    for case in cases {
        let (_dir, path) = plansmith_test_utils::config_file(case);
        let err = PlansmithConfig::load(&path).unwrap_err();
        assert!(matches!(err, PlannerError::Config(_)), "case: {case}");
    }
}
