use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use plansmith_core::config::ExecutorConfig;
use plansmith_core::error::{PlannerError, Result};
use plansmith_core::event::EventBus;
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::{AgentInput, AgentRef};
use plansmith_core::types::{AgentInvocation, PlannerAgent, PlannerEvent, RunId};

use crate::journal::{JournalEntry, RunJournal};
use crate::planner::{Action, InitPlanningContext, Planner};

/// One executed agent invocation.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub agent_name: String,
    pub output_key: String,
    pub elapsed_ms: u64,
}

/// Result of driving a planner to completion.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// Live invocations in completion order. Replayed ones are not listed.
    pub invocations: Vec<InvocationRecord>,
    /// Final scope with everything written during the run.
    pub scope: AgenticScope,
    /// Value under the planner agent's output key, if any.
    pub output: Option<serde_json::Value>,
    pub total_elapsed_ms: u64,
}

/// Drives a planner: asks for actions, invokes the agents they name, writes
/// outputs back to the scope, and feeds each completed invocation back to
/// the planner.
///
/// A `Call` naming several agents runs them concurrently; their follow-up
/// actions are composed into the next action.
pub struct PlanExecutor {
    max_steps: usize,
    event_bus: Option<Arc<EventBus>>,
    journal: Option<Arc<RunJournal>>,
    resuming: bool,
}

impl PlanExecutor {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            event_bus: None,
            journal: None,
            resuming: false,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.max_steps)
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_journal(mut self, journal: Arc<RunJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Mark the run as a resume: the journal gets a `resumed` entry instead
    /// of `started`.
    pub fn resuming(mut self, resuming: bool) -> Self {
        self.resuming = resuming;
        self
    }

    fn publish(&self, event: PlannerEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Run `planner` over `subagents` until it answers `Done`.
    pub async fn run(
        &self,
        planner: &mut dyn Planner,
        planner_agent: &PlannerAgent,
        subagents: &[AgentRef],
        mut scope: AgenticScope,
    ) -> Result<ExecutionResult> {
        let run_id = RunId::new();
        let start = Instant::now();

        info!(
            run_id = %run_id,
            planner = %planner.topology(),
            agents = subagents.len(),
            "Run started"
        );
        self.publish(PlannerEvent::RunStarted {
            run_id: run_id.clone(),
            planner: planner.topology().to_string(),
        });

        let mut invocations = Vec::new();
        let outcome = self
            .drive(&run_id, planner, planner_agent, subagents, &mut scope, &mut invocations)
            .await;

        if let Err(e) = outcome {
            error!(run_id = %run_id, error = %e, "Run failed");
            self.publish(PlannerEvent::RunError {
                run_id,
                error: e.to_string(),
            });
            return Err(e);
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        let output = planner_agent
            .output_key
            .as_deref()
            .and_then(|key| scope.read_state(key))
            .cloned();

        info!(
            run_id = %run_id,
            invocations = invocations.len(),
            total_elapsed_ms,
            "Run complete"
        );
        self.publish(PlannerEvent::RunComplete {
            run_id: run_id.clone(),
            invocations: invocations.len(),
        });

        Ok(ExecutionResult {
            run_id,
            invocations,
            scope,
            output,
            total_elapsed_ms,
        })
    }

    async fn drive(
        &self,
        run_id: &RunId,
        planner: &mut dyn Planner,
        planner_agent: &PlannerAgent,
        subagents: &[AgentRef],
        scope: &mut AgenticScope,
        records: &mut Vec<InvocationRecord>,
    ) -> Result<()> {
        if let Some(journal) = &self.journal {
            let input = scope.state().clone();
            let entry = if self.resuming {
                JournalEntry::resumed(input)
            } else {
                JournalEntry::started(run_id, input)
            };
            journal.append(&entry).await?;
        }

        planner.init(InitPlanningContext {
            scope: &*scope,
            planner_agent,
            subagents,
        })?;

        let mut action = planner.first_action(scope)?;
        let mut steps = 0usize;

        loop {
            let agents = match action {
                Action::Done => break,
                Action::Call(agents) => agents,
            };

            steps += agents.len();
            if steps > self.max_steps {
                warn!(max_steps = self.max_steps, "Step guard tripped");
                return Err(PlannerError::MaxStepsExceeded(self.max_steps));
            }

            let mut completed = Vec::with_capacity(agents.len());
            let mut failure = None;
            for result in self.invoke_all(&agents, scope).await {
                match result {
                    Ok(done) => completed.push(done),
                    Err(e) => {
                        if failure.is_none() {
                            failure = Some(e);
                        }
                    }
                }
            }

            // successful siblings of a failed call are still recorded and journaled
            for (invocation, elapsed_ms) in &completed {
                scope.record_invocation(invocation.clone());
                if let Some(journal) = &self.journal {
                    journal
                        .append(&JournalEntry::agent_completed(invocation))
                        .await?;
                }
                records.push(InvocationRecord {
                    agent_name: invocation.agent_name.clone(),
                    output_key: invocation.output_key.clone(),
                    elapsed_ms: *elapsed_ms,
                });
            }

            if let Some(e) = failure {
                return Err(e);
            }

            let mut next = Action::Done;
            for (invocation, _) in &completed {
                next = next.compose(planner.next_action(scope, invocation)?);
            }
            action = next;
        }

        debug!(steps, terminated = planner.terminated(), "Planner finished");
        Ok(())
    }

    /// Invoke `agents` concurrently with inputs read from the current scope.
    /// Results come back in the order of `agents`.
    async fn invoke_all(
        &self,
        agents: &[AgentRef],
        scope: &AgenticScope,
    ) -> Vec<Result<(AgentInvocation, u64)>> {
        let calls = agents.iter().map(|agent| {
            let input = scope.arguments_for(agent.as_ref());
            self.invoke_one(agent.clone(), input)
        });
        join_all(calls).await
    }

    async fn invoke_one(
        &self,
        agent: AgentRef,
        input: AgentInput,
    ) -> Result<(AgentInvocation, u64)> {
        let name = agent.name().to_string();
        if input.len() < agent.arguments().len() {
            warn!(agent = %name, "Invoking agent with missing arguments");
        }

        self.publish(PlannerEvent::AgentStarted { agent: name.clone() });
        info!(agent = %name, "Invoking agent");

        let started = Instant::now();
        let result = agent.invoke(input.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                debug!(agent = %name, output_key = %agent.output_key(), elapsed_ms, "Agent completed");
                self.publish(PlannerEvent::AgentCompleted {
                    agent: name.clone(),
                    output_key: agent.output_key().to_string(),
                    elapsed_ms,
                });
                Ok((
                    AgentInvocation::new(name, agent.output_key(), input, output),
                    elapsed_ms,
                ))
            }
            Err(e) => {
                error!(agent = %name, error = %e, "Agent failed");
                self.publish(PlannerEvent::AgentFailed {
                    agent: name.clone(),
                    error: e.to_string(),
                });
                Err(match e {
                    e @ (PlannerError::AgentFailed { .. } | PlannerError::AgentTimeout { .. }) => e,
                    other => PlannerError::AgentFailed {
                        agent: name,
                        message: other.to_string(),
                    },
                })
            }
        }
    }
}
