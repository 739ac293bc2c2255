use tracing::{debug, info};

use plansmith_core::error::{PlannerError, Result};
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::AgentInvocation;

use super::{Action, InitPlanningContext, Planner, Topology};
use crate::graph::GoalOrientedSearchGraph;

/// Computes a plan for the planner agent's output key once, then hands out
/// one agent per step.
pub struct GoalOrientedPlanner {
    goal: Option<String>,
    graph: Option<GoalOrientedSearchGraph>,
    plan: Vec<AgentRef>,
    cursor: usize,
    terminated: bool,
}

impl GoalOrientedPlanner {
    pub fn new() -> Self {
        Self {
            goal: None,
            graph: None,
            plan: vec![],
            cursor: 0,
            terminated: false,
        }
    }

    /// The plan computed by `first_action`; empty before that.
    pub fn plan(&self) -> &[AgentRef] {
        &self.plan
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    fn initialized(&self) -> Result<(&GoalOrientedSearchGraph, &str)> {
        match (&self.graph, &self.goal) {
            (Some(graph), Some(goal)) => Ok((graph, goal.as_str())),
            _ => Err(PlannerError::InvalidArgument(
                "goal-oriented planner used before init".into(),
            )),
        }
    }

    fn finish(&mut self) -> Action {
        self.terminated = true;
        Action::Done
    }
}

impl Default for GoalOrientedPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner for GoalOrientedPlanner {
    fn init(&mut self, ctx: InitPlanningContext<'_>) -> Result<()> {
        let goal = ctx
            .planner_agent
            .output_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PlannerError::InvalidArgument(format!(
                    "planner agent '{}' has no output key to use as goal",
                    ctx.planner_agent.name
                ))
            })?;

        self.goal = Some(goal.to_string());
        self.graph = Some(GoalOrientedSearchGraph::new(ctx.subagents));
        self.plan.clear();
        self.cursor = 0;
        self.terminated = false;
        Ok(())
    }

    fn first_action(&mut self, scope: &mut AgenticScope) -> Result<Action> {
        let (graph, goal) = self.initialized()?;

        if scope.has_state(goal) {
            info!(goal, "Goal already present in scope, nothing to plan");
            return Ok(self.finish());
        }

        let plan = graph.search(scope.state_keys(), goal)?;
        if plan.is_empty() {
            return Err(PlannerError::NoPathFound {
                goal: goal.to_string(),
            });
        }

        info!(
            goal,
            steps = plan.len(),
            plan = ?plan.iter().map(|a| a.name()).collect::<Vec<_>>(),
            "Plan computed"
        );

        let first = plan[0].clone();
        self.plan = plan;
        self.cursor = 1;
        Ok(Action::call(first))
    }

    fn next_action(&mut self, _scope: &AgenticScope, last: &AgentInvocation) -> Result<Action> {
        self.initialized()?;

        if self.cursor >= self.plan.len() {
            debug!(last = %last.agent_name, "Plan exhausted");
            return Ok(self.finish());
        }

        let agent = self.plan[self.cursor].clone();
        self.cursor += 1;
        debug!(agent = %agent.name(), step = self.cursor, total = self.plan.len(), "Next plan step");
        Ok(Action::call(agent))
    }

    fn topology(&self) -> Topology {
        Topology::GoalOriented
    }

    fn terminated(&self) -> bool {
        self.terminated
    }
}
