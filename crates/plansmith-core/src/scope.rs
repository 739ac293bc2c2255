use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::traits::{Agent, AgentInput};
use crate::types::AgentInvocation;

/// Shared state for a planning/execution session.
///
/// Keys are variable names; values are JSON. The scope also keeps the
/// ordered log of agent invocations that wrote into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgenticScope {
    state: HashMap<String, serde_json::Value>,
    #[serde(default)]
    invocations: Vec<AgentInvocation>,
}

impl AgenticScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope from initial state.
    pub fn from_map(state: HashMap<String, serde_json::Value>) -> Self {
        Self {
            state,
            invocations: vec![],
        }
    }

    /// Get a value by key.
    pub fn read_state(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn read_str(&self, key: &str) -> Option<&str> {
        self.state.get(key).and_then(|v| v.as_str())
    }

    /// Get a numeric value, falling back to `default` when absent or not a number.
    pub fn read_f64(&self, key: &str, default: f64) -> f64 {
        self.state
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    pub fn has_state(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Set a value.
    pub fn write_state(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.state.insert(key.into(), value);
    }

    /// Set several values (overwrites on conflict).
    pub fn write_states(&mut self, values: HashMap<String, serde_json::Value>) {
        self.state.extend(values);
    }

    /// Keys currently present, sorted.
    pub fn state_keys(&self) -> BTreeSet<String> {
        self.state.keys().cloned().collect()
    }

    /// Whether every argument of `agent` is present.
    pub fn satisfies(&self, agent: &dyn Agent) -> bool {
        agent.arguments().iter().all(|arg| self.state.contains_key(arg))
    }

    /// Collect the argument values for `agent`. Missing arguments are omitted.
    pub fn arguments_for(&self, agent: &dyn Agent) -> AgentInput {
        agent
            .arguments()
            .iter()
            .filter_map(|arg| self.state.get(arg).map(|v| (arg.clone(), v.clone())))
            .collect()
    }

    /// Write an invocation's output under its key and log it.
    pub fn record_invocation(&mut self, invocation: AgentInvocation) {
        self.state
            .insert(invocation.output_key.clone(), invocation.output.clone());
        self.invocations.push(invocation);
    }

    /// All invocations in execution order.
    pub fn invocations(&self) -> &[AgentInvocation] {
        &self.invocations
    }

    /// Invocations of a single agent, in execution order.
    pub fn invocations_of(&self, agent_name: &str) -> Vec<&AgentInvocation> {
        self.invocations
            .iter()
            .filter(|inv| inv.agent_name == agent_name)
            .collect()
    }

    /// Get the underlying state map.
    pub fn state(&self) -> &HashMap<String, serde_json::Value> {
        &self.state
    }
}
