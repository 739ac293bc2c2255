//! Fixture agents and helpers shared by the plansmith test suites.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use plansmith_core::error::PlannerError;
use plansmith_core::scope::AgenticScope;
use plansmith_core::traits::AgentRef;
use plansmith_core::types::FnAgent;

/// Agent that reports its own name and the inputs it received.
pub fn echo_agent(name: &str, arguments: &[&str], output_key: &str) -> AgentRef {
    let agent_name = name.to_string();
    FnAgent::new(name, output_key, move |input| {
        let mut inputs: Vec<_> = input.into_iter().collect();
        inputs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(json!({ "agent": agent_name, "inputs": inputs }))
    })
    .with_arguments(arguments.iter().copied())
    .into_ref()
}

/// Argument-less agent that always yields `value`.
pub fn source_agent(name: &str, output_key: &str, value: Value) -> AgentRef {
    constant_agent(name, &[], output_key, value)
}

/// Agent that ignores its inputs and yields `value`.
pub fn constant_agent(name: &str, arguments: &[&str], output_key: &str, value: Value) -> AgentRef {
    FnAgent::new(name, output_key, move |_| Ok(value.clone()))
        .with_arguments(arguments.iter().copied())
        .into_ref()
}

/// Agent that yields 1, 2, 3, ... on successive calls. The returned counter
/// tracks the number of calls.
pub fn counter_agent(name: &str, arguments: &[&str], output_key: &str) -> (AgentRef, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let agent = FnAgent::new(name, output_key, move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!(n))
    })
    .with_arguments(arguments.iter().copied())
    .into_ref();
    (agent, calls)
}

/// Agent whose invocation always fails with `message`.
pub fn failing_agent(name: &str, arguments: &[&str], output_key: &str, message: &str) -> AgentRef {
    let agent_name = name.to_string();
    let message = message.to_string();
    FnAgent::new(name, output_key, move |_| {
        Err(PlannerError::AgentFailed {
            agent: agent_name.clone(),
            message: message.clone(),
        })
    })
    .with_arguments(arguments.iter().copied())
    .into_ref()
}

/// Names of `agents`, in order.
pub fn agent_names(agents: &[AgentRef]) -> Vec<String> {
    agents.iter().map(|a| a.name().to_string()).collect()
}

/// Scope holding the given values.
pub fn scope_with(values: &[(&str, Value)]) -> AgenticScope {
    let mut scope = AgenticScope::new();
    for (key, value) in values {
        scope.write_state(*key, value.clone());
    }
    scope
}

/// Write `content` to a `plansmith.toml` inside a fresh temp dir.
///
/// Keep the returned `TempDir` alive for as long as the path is used.
pub fn config_file(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plansmith.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
