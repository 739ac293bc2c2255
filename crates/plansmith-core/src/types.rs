use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::traits::{Agent, AgentInput, AgentRef};

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The agent that owns a planner: its output key is the planner's goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerAgent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub output_key: Option<String>,
}

impl PlannerAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            output_key: None,
        }
    }

    /// Set the output key (the goal for goal-oriented planning).
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

/// Record of a single completed agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocation {
    pub agent_name: String,
    pub output_key: String,
    #[serde(default)]
    pub input: AgentInput,
    pub output: serde_json::Value,
}

impl AgentInvocation {
    pub fn new(
        agent_name: impl Into<String>,
        output_key: impl Into<String>,
        input: AgentInput,
        output: serde_json::Value,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            output_key: output_key.into(),
            input,
            output,
        }
    }
}

type AgentFn = dyn Fn(AgentInput) -> Result<serde_json::Value> + Send + Sync;

/// An agent backed by a plain closure.
#[derive(Clone)]
pub struct FnAgent {
    name: String,
    description: String,
    arguments: Vec<String>,
    output_key: String,
    func: Arc<AgentFn>,
}

impl FnAgent {
    pub fn new<F>(name: impl Into<String>, output_key: impl Into<String>, func: F) -> Self
    where
        F: Fn(AgentInput) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            arguments: vec![],
            output_key: output_key.into(),
            func: Arc::new(func),
        }
    }

    /// Set the argument names.
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn into_ref(self) -> AgentRef {
        Arc::new(self)
    }
}

impl std::fmt::Debug for FnAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAgent")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("output_key", &self.output_key)
            .finish()
    }
}

impl Agent for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn output_key(&self) -> &str {
        &self.output_key
    }

    fn invoke(&self, input: AgentInput) -> BoxFuture<'_, Result<serde_json::Value>> {
        let result = (self.func)(input);
        Box::pin(async move { result })
    }
}

/// Events emitted while a planner-driven run executes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerEvent {
    /// Run started.
    RunStarted { run_id: RunId, planner: String },
    /// Agent invocation started.
    AgentStarted { agent: String },
    /// Agent invocation completed and its output was written to the scope.
    AgentCompleted {
        agent: String,
        output_key: String,
        elapsed_ms: u64,
    },
    /// Agent invocation failed.
    AgentFailed { agent: String, error: String },
    /// Run completed.
    RunComplete { run_id: RunId, invocations: usize },
    /// Run failed.
    RunError { run_id: RunId, error: String },
}
