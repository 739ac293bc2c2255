use std::collections::HashMap;

use tracing::{debug, info};

use plansmith_core::config::SelectionPolicy;
use plansmith_core::error::{PlannerError, Result};
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::AgentInvocation;

use super::{Action, InitPlanningContext, Planner, Topology};

/// Decides, from the live scope, whether a peer-to-peer run is finished.
pub type CompletionPredicate = Box<dyn Fn(&AgenticScope) -> bool + Send + Sync>;

/// Predicate that never holds; the run ends on the invocation cap or when no
/// agent is ready.
pub fn never_complete() -> CompletionPredicate {
    Box::new(|_| false)
}

/// Holds once the numeric value under `key` is at least `threshold`.
pub fn score_at_least(key: impl Into<String>, threshold: f64) -> CompletionPredicate {
    let key = key.into();
    Box::new(move |scope| {
        scope
            .read_state(&key)
            .and_then(|v| v.as_f64())
            .is_some_and(|score| score >= threshold)
    })
}

/// Peer-to-peer planner: keeps picking a ready agent until the completion
/// predicate holds or the invocation cap is reached.
///
/// An agent is ready when every one of its arguments is in the scope. With
/// `SelectionPolicy::OnStateChange` it must also have never run, or have had
/// an input rewritten since it was last selected.
pub struct P2PPlanner {
    max_invocations: usize,
    predicate: CompletionPredicate,
    selection: SelectionPolicy,
    agents: Vec<AgentRef>,
    initialized: bool,
    invocations: usize,
    last_selected: Option<usize>,
    /// Write counter per scope key, bumped on every completed invocation.
    versions: HashMap<String, u64>,
    /// Input versions each agent saw when it was last selected.
    seen: Vec<Option<HashMap<String, u64>>>,
    terminated: bool,
}

impl P2PPlanner {
    pub fn new<F>(max_invocations: usize, predicate: F) -> Self
    where
        F: Fn(&AgenticScope) -> bool + Send + Sync + 'static,
    {
        Self {
            max_invocations,
            predicate: Box::new(predicate),
            selection: SelectionPolicy::default(),
            agents: vec![],
            initialized: false,
            invocations: 0,
            last_selected: None,
            versions: HashMap::new(),
            seen: vec![],
            terminated: false,
        }
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Completed invocations observed so far.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    fn step(&mut self, scope: &AgenticScope) -> Action {
        if (self.predicate)(scope) {
            info!(invocations = self.invocations, "Completion condition met");
            return self.finish();
        }
        if self.invocations >= self.max_invocations {
            info!(max = self.max_invocations, "Invocation cap reached");
            return self.finish();
        }

        let selected = match self.selection {
            SelectionPolicy::RoundRobin => self.select_round_robin(scope),
            SelectionPolicy::OnStateChange => self.select_on_state_change(scope),
        };

        match selected {
            Some(index) => {
                self.last_selected = Some(index);
                self.seen[index] = Some(self.input_versions(index));
                let agent = self.agents[index].clone();
                debug!(agent = %agent.name(), invocation = self.invocations + 1, "Selected agent");
                Action::call(agent)
            }
            None => {
                info!(invocations = self.invocations, "No agent ready");
                self.finish()
            }
        }
    }

    fn select_round_robin(&self, scope: &AgenticScope) -> Option<usize> {
        let count = self.agents.len();
        let start = self.last_selected.map_or(0, |i| i + 1);
        (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&index| scope.satisfies(self.agents[index].as_ref()))
    }

    fn select_on_state_change(&self, scope: &AgenticScope) -> Option<usize> {
        (0..self.agents.len()).find(|&index| {
            if !scope.satisfies(self.agents[index].as_ref()) {
                return false;
            }
            match &self.seen[index] {
                None => true,
                Some(seen) => self.input_versions(index) != *seen,
            }
        })
    }

    fn input_versions(&self, index: usize) -> HashMap<String, u64> {
        self.agents[index]
            .arguments()
            .iter()
            .map(|arg| (arg.clone(), self.versions.get(arg).copied().unwrap_or(0)))
            .collect()
    }

    fn finish(&mut self) -> Action {
        self.terminated = true;
        Action::Done
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PlannerError::InvalidArgument(
                "peer-to-peer planner used before init".into(),
            ))
        }
    }
}

impl Planner for P2PPlanner {
    fn init(&mut self, ctx: InitPlanningContext<'_>) -> Result<()> {
        self.agents = ctx.subagents.to_vec();
        self.seen = vec![None; self.agents.len()];
        self.versions.clear();
        self.invocations = 0;
        self.last_selected = None;
        self.terminated = false;
        self.initialized = true;
        Ok(())
    }

    fn first_action(&mut self, scope: &mut AgenticScope) -> Result<Action> {
        self.ensure_initialized()?;
        Ok(self.step(scope))
    }

    fn next_action(&mut self, scope: &AgenticScope, last: &AgentInvocation) -> Result<Action> {
        self.ensure_initialized()?;
        self.invocations += 1;
        *self.versions.entry(last.output_key.clone()).or_insert(0) += 1;
        Ok(self.step(scope))
    }

    fn topology(&self) -> Topology {
        Topology::PeerToPeer
    }

    fn terminated(&self) -> bool {
        self.terminated
    }
}
