use std::collections::HashMap;

use tracing::{debug, info};

use plansmith_core::error::Result;
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::AgentInvocation;

use super::{Action, InitPlanningContext, Planner, Topology};
use crate::journal::JournalEntry;

/// Replays journaled invocations into the scope on resume, then delegates.
///
/// Replay happens inside `first_action`: recorded outputs are written back
/// under their agents' output keys and the delegate is advanced with a
/// synthetic invocation for each, so its cursor matches the journal. The
/// first action returned is the first one that needs a live agent call.
pub struct ReplayingPlanner {
    delegate: Box<dyn Planner>,
    completed: Vec<(String, String, serde_json::Value)>,
    inputs: Vec<HashMap<String, serde_json::Value>>,
    subagents: Vec<AgentRef>,
    replayed: usize,
    replay_complete: bool,
}

impl ReplayingPlanner {
    pub fn new(delegate: Box<dyn Planner>, entries: Vec<JournalEntry>) -> Self {
        let mut completed = vec![];
        let mut inputs = vec![];
        for entry in entries {
            match entry {
                JournalEntry::Started { input, .. } | JournalEntry::Resumed { input, .. } => {
                    inputs.push(input)
                }
                JournalEntry::AgentCompleted {
                    agent_name,
                    output_key,
                    output,
                    ..
                } => completed.push((agent_name, output_key, output)),
            }
        }
        let replay_complete = completed.is_empty() && inputs.is_empty();
        Self {
            delegate,
            completed,
            inputs,
            subagents: vec![],
            replayed: 0,
            replay_complete,
        }
    }

    /// Invocations taken from the journal instead of being executed.
    pub fn replayed_count(&self) -> usize {
        self.replayed
    }

    pub fn is_replay_complete(&self) -> bool {
        self.replay_complete
    }

    fn output_key_of(&self, agent_name: &str) -> Option<&str> {
        self.subagents
            .iter()
            .find(|a| a.name() == agent_name)
            .map(|a| a.output_key())
    }
}

impl Planner for ReplayingPlanner {
    fn init(&mut self, ctx: InitPlanningContext<'_>) -> Result<()> {
        self.delegate.init(ctx)?;
        self.subagents = ctx.subagents.to_vec();
        Ok(())
    }

    fn first_action(&mut self, scope: &mut AgenticScope) -> Result<Action> {
        if self.replay_complete {
            return self.delegate.first_action(scope);
        }

        info!(
            completed = self.completed.len(),
            inputs = self.inputs.len(),
            "Replaying journal"
        );

        for input in &self.inputs {
            scope.write_states(input.clone());
        }

        let mut action = self.delegate.first_action(scope)?;

        let completed = std::mem::take(&mut self.completed);
        for (agent_name, recorded_key, output) in &completed {
            if action.is_done() {
                info!(replayed = self.replayed, "Delegate finished during replay");
                break;
            }

            let output_key = match self.output_key_of(agent_name) {
                Some(key) => key.to_string(),
                None => {
                    debug!(agent = %agent_name, key = %recorded_key, "Unknown agent, using journaled output key");
                    recorded_key.clone()
                }
            };
            let synthetic =
                AgentInvocation::new(agent_name.clone(), output_key, Default::default(), output.clone());
            if !synthetic.output_key.is_empty() {
                scope.record_invocation(synthetic.clone());
            }
            self.replayed += 1;
            action = self.delegate.next_action(scope, &synthetic)?;
            debug!(agent = %agent_name, replayed = self.replayed, total = completed.len(), "Replayed invocation");
        }
        self.completed = completed;

        self.replay_complete = true;
        info!(replayed = self.replayed, "Replay complete, switching to live execution");
        Ok(action)
    }

    fn next_action(&mut self, scope: &AgenticScope, last: &AgentInvocation) -> Result<Action> {
        self.delegate.next_action(scope, last)
    }

    fn topology(&self) -> Topology {
        self.delegate.topology()
    }

    fn terminated(&self) -> bool {
        self.delegate.terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{GoalOrientedPlanner, SequentialPlanner};
    use plansmith_core::types::PlannerAgent;
    use plansmith_test_utils::{agent_names, echo_agent, scope_with};
    use serde_json::json;

    fn completed(agent: &str, output_key: &str, output: serde_json::Value) -> JournalEntry {
        JournalEntry::agent_completed(&AgentInvocation::new(agent, output_key, Default::default(), output))
    }

    fn chain() -> Vec<AgentRef> {
        vec![
            echo_agent("A", &["x"], "y"),
            echo_agent("B", &["y"], "z"),
            echo_agent("C", &["z"], "w"),
        ]
    }

    #[test]
    fn test_skips_completed_and_resumes_live() {
        let agents = chain();
        let mut scope = AgenticScope::new();
        let mut input = HashMap::new();
        input.insert("x".to_string(), json!(1));
        let entries = vec![
            JournalEntry::started(&plansmith_core::types::RunId::from_str("r"), input),
            completed("A", "y", json!("from-journal")),
        ];

        let mut planner = ReplayingPlanner::new(Box::new(GoalOrientedPlanner::new()), entries);
        let planner_agent = PlannerAgent::new("planner").with_output_key("w");
        planner
            .init(InitPlanningContext {
                scope: &scope,
                planner_agent: &planner_agent,
                subagents: &agents,
            })
            .unwrap();
        assert!(!planner.is_replay_complete());

        let action = planner.first_action(&mut scope).unwrap();
        assert_eq!(agent_names(action.agents()), vec!["B"]);
        assert_eq!(planner.replayed_count(), 1);
        assert!(planner.is_replay_complete());
        assert_eq!(scope.read_str("y"), Some("from-journal"));
        assert_eq!(scope.read_state("x"), Some(&json!(1)));
        assert_eq!(scope.invocations().len(), 1);
        assert_eq!(scope.invocations_of("A")[0].output, json!("from-journal"));
        assert_eq!(planner.topology(), Topology::GoalOriented);
    }

    #[test]
    fn test_stops_when_delegate_done() {
        let agents = vec![echo_agent("A", &[], "a")];
        let mut scope = AgenticScope::new();
        let entries = vec![completed("A", "a", json!(1)), completed("A", "a", json!(2))];

        let mut planner = ReplayingPlanner::new(Box::new(SequentialPlanner::new()), entries);
        planner
            .init(InitPlanningContext {
                scope: &scope,
                planner_agent: &PlannerAgent::new("seq"),
                subagents: &agents,
            })
            .unwrap();

        assert!(planner.first_action(&mut scope).unwrap().is_done());
        assert_eq!(planner.replayed_count(), 1);
        assert!(planner.terminated());
    }

    #[test]
    fn test_unknown_agent_uses_journaled_key() {
        let agents = vec![echo_agent("B", &["y"], "z")];
        let mut scope = AgenticScope::new();
        let entries = vec![completed("renamed", "y", json!("kept"))];

        let mut planner = ReplayingPlanner::new(Box::new(SequentialPlanner::new()), entries);
        planner
            .init(InitPlanningContext {
                scope: &scope,
                planner_agent: &PlannerAgent::new("seq"),
                subagents: &agents,
            })
            .unwrap();

        planner.first_action(&mut scope).unwrap();
        assert_eq!(scope.read_str("y"), Some("kept"));
        assert_eq!(planner.replayed_count(), 1);
    }

    #[test]
    fn test_empty_journal_passes_through() {
        let agents = chain();
        let mut scope = scope_with(&[("x", json!(1))]);
        let mut planner = ReplayingPlanner::new(Box::new(SequentialPlanner::new()), vec![]);
        assert!(planner.is_replay_complete());
        planner
            .init(InitPlanningContext {
                scope: &scope,
                planner_agent: &PlannerAgent::new("seq"),
                subagents: &agents,
            })
            .unwrap();

        let action = planner.first_action(&mut scope).unwrap();
        assert_eq!(agent_names(action.agents()), vec!["A"]);
        assert_eq!(planner.replayed_count(), 0);
    }
}
