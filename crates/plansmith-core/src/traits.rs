use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;

/// Argument values handed to an agent, keyed by argument name.
pub type AgentInput = HashMap<String, serde_json::Value>;

/// Shared handle to an agent. Planners clone these freely.
pub type AgentRef = Arc<dyn Agent>;

/// A named unit of work with declared inputs and one output.
///
/// Planners only read `name`, `arguments` and `output_key`; the executor
/// calls `invoke` with the argument values taken from the scope and writes
/// the returned value under `output_key`.
pub trait Agent: Send + Sync + 'static {
    /// Unique agent name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Names of the scope variables this agent reads.
    fn arguments(&self) -> &[String];

    /// Name of the scope variable this agent writes.
    fn output_key(&self) -> &str;

    /// Produce a new value for `output_key`.
    fn invoke(&self, input: AgentInput) -> BoxFuture<'_, Result<serde_json::Value>>;
}
