use tracing::debug;

use plansmith_core::error::{PlannerError, Result};
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::AgentInvocation;

use super::{Action, InitPlanningContext, Planner, Topology};

/// Invokes every subagent once, in declaration order.
#[derive(Default)]
pub struct SequentialPlanner {
    agents: Option<Vec<AgentRef>>,
    cursor: usize,
    terminated: bool,
}

impl SequentialPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self) -> Result<Action> {
        let agents = self.agents.as_ref().ok_or_else(|| {
            PlannerError::InvalidArgument("sequential planner used before init".into())
        })?;

        match agents.get(self.cursor).cloned() {
            Some(agent) => {
                self.cursor += 1;
                debug!(agent = %agent.name(), step = self.cursor, "Next in sequence");
                Ok(Action::call(agent))
            }
            None => {
                self.terminated = true;
                Ok(Action::Done)
            }
        }
    }
}

impl Planner for SequentialPlanner {
    fn init(&mut self, ctx: InitPlanningContext<'_>) -> Result<()> {
        self.agents = Some(ctx.subagents.to_vec());
        self.cursor = 0;
        self.terminated = false;
        Ok(())
    }

    fn first_action(&mut self, _scope: &mut AgenticScope) -> Result<Action> {
        self.cursor = 0;
        self.advance()
    }

    fn next_action(&mut self, _scope: &AgenticScope, _last: &AgentInvocation) -> Result<Action> {
        self.advance()
    }

    fn topology(&self) -> Topology {
        Topology::Sequence
    }

    fn terminated(&self) -> bool {
        self.terminated
    }
}
