use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use plansmith_core::config::PlansmithConfig;
use plansmith_core::error::PlannerError;
use plansmith_core::scope::AgenticScope;
use plansmith_core::types::PlannerAgent;
use plansmith_planner::{
    build_agents, build_planner, planner_agent, GoalOrientedPlanner, GoalOrientedSearchGraph,
    P2PPlanner, PlanExecutor, ReplayingPlanner, RunJournal,
};
use plansmith_test_utils::{agent_names, counter_agent, echo_agent, failing_agent, scope_with};

const STORY_CONFIG: &str = r#"
[planner]
name = "storyteller"
goal = "story"

[[agents]]
name = "outline"
arguments = ["topic"]
output_key = "outline"
kind = { type = "template", template = "outline of {{topic}}" }

[[agents]]
name = "research"
arguments = ["topic"]
output_key = "facts"
kind = { type = "constant", value = ["dragons fly"] }

[[agents]]
name = "draft"
arguments = ["outline", "facts"]
output_key = "story"
kind = { type = "template", template = "{{outline}} / {{facts}}" }

[[agents]]
name = "unused"
arguments = ["story"]
output_key = "review"
kind = { type = "constant", value = "fine" }
"#;

#[tokio::test]
async fn test_configured_goal_oriented_run() {
    let config = PlansmithConfig::from_toml(STORY_CONFIG).unwrap();
    let agents = build_agents(&config.agents).unwrap();
    let mut planner = build_planner(&config);

    let result = PlanExecutor::from_config(&config.executor)
        .run(
            planner.as_mut(),
            &planner_agent(&config),
            &agents,
            scope_with(&[("topic", json!("dragons"))]),
        )
        .await
        .unwrap();

    let names: Vec<_> = result.invocations.iter().map(|r| r.agent_name.as_str()).collect();
    assert_eq!(names, vec!["outline", "research", "draft"]);
    assert_eq!(
        result.output,
        Some(json!("outline of dragons / [\"dragons fly\"]"))
    );
    assert!(!result.scope.has_state("review"));
    assert!(planner.terminated());
}

#[test]
fn test_plan_matches_single_producer_when_inputs_present() {
    let agents = vec![
        echo_agent("A", &["x"], "y"),
        echo_agent("B", &["y"], "z"),
        echo_agent("C", &["z", "w"], "goal"),
    ];
    let graph = GoalOrientedSearchGraph::new(&agents);
    assert_eq!(agent_names(&graph.search(["z", "w"], "goal").unwrap()), vec!["C"]);
    assert_eq!(
        agent_names(&graph.search(["x", "w"], "goal").unwrap()),
        vec!["A", "B", "C"]
    );
    assert!(graph.search(["x"], "goal").unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_goal_fails_run() {
    let agents = vec![echo_agent("A", &["x"], "y")];
    let mut planner = GoalOrientedPlanner::new();
    let err = PlanExecutor::new(10)
        .run(
            &mut planner,
            &PlannerAgent::new("planner").with_output_key("y"),
            &agents,
            AgenticScope::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::NoPathFound { goal } if goal == "y"));
}

#[tokio::test]
async fn test_p2p_review_loop_until_score() {
    let (writer, writes) = counter_agent("writer", &["topic"], "draft");
    let (scorer, scores) = counter_agent("scorer", &["draft"], "score");
    let agents = vec![writer, scorer];

    // scorer yields 1, 2, 3, ... so the loop stops once it has run twice
    let mut planner = P2PPlanner::new(10, |scope: &AgenticScope| scope.read_f64("score", 0.0) >= 2.0);
    let result = PlanExecutor::new(50)
        .run(
            &mut planner,
            &PlannerAgent::new("review-loop").with_output_key("score"),
            &agents,
            scope_with(&[("topic", json!("dragons"))]),
        )
        .await
        .unwrap();

    assert_eq!(writes.load(Ordering::SeqCst), 2);
    assert_eq!(scores.load(Ordering::SeqCst), 2);
    assert_eq!(result.output, Some(json!(2)));
    assert_eq!(result.invocations.len(), 4);
}

#[tokio::test]
async fn test_resume_after_failure_skips_completed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.jsonl");
    let planner_agent = PlannerAgent::new("chain").with_output_key("z");

    // first run: A succeeds, B fails
    let (a, a_calls) = counter_agent("A", &["x"], "y");
    let agents = vec![a.clone(), failing_agent("B", &["y"], "z", "flaky")];
    let journal = Arc::new(RunJournal::open(&path).await.unwrap());
    let err = PlanExecutor::new(10)
        .with_journal(journal)
        .run(
            &mut GoalOrientedPlanner::new(),
            &planner_agent,
            &agents,
            scope_with(&[("x", json!(1))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::AgentFailed { .. }));
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);

    // second run: B fixed, resume from the journal with an empty scope
    let (b, b_calls) = counter_agent("B", &["y"], "z");
    let agents = vec![a, b];
    let entries = RunJournal::load(&path).await.unwrap();
    let mut planner = ReplayingPlanner::new(Box::new(GoalOrientedPlanner::new()), entries);
    let journal = Arc::new(RunJournal::open(&path).await.unwrap());
    let result = PlanExecutor::new(10)
        .with_journal(journal)
        .resuming(true)
        .run(&mut planner, &planner_agent, &agents, AgenticScope::new())
        .await
        .unwrap();

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(planner.replayed_count(), 1);
    assert_eq!(result.invocations.len(), 1);
    let history: Vec<_> = result.scope.invocations().iter().map(|i| i.agent_name.as_str()).collect();
    assert_eq!(history, vec!["A", "B"]);
    assert_eq!(result.scope.read_state("x"), Some(&json!(1)));
    assert_eq!(result.output, Some(json!(1)));

    let entries = RunJournal::load(&path).await.unwrap();
    assert_eq!(entries.len(), 4);
}
