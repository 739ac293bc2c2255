//! Agents described in configuration rather than code.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use plansmith_core::config::{AgentDefinition, AgentKind};
use plansmith_core::error::{PlannerError, Result};
use plansmith_core::traits::{Agent, AgentInput, AgentRef};

/// `{{ name }}` placeholder.
const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

/// Agent built from an `[[agents]]` entry.
pub struct ConfiguredAgent {
    definition: AgentDefinition,
    placeholder: Option<Regex>,
}

impl ConfiguredAgent {
    pub fn new(definition: AgentDefinition) -> Result<Self> {
        let placeholder = match definition.kind {
            AgentKind::Template { .. } => Some(
                Regex::new(PLACEHOLDER).map_err(|e| PlannerError::Config(e.to_string()))?,
            ),
            _ => None,
        };
        Ok(Self {
            definition,
            placeholder,
        })
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    fn render(&self, template: &str, input: &AgentInput) -> String {
        let Some(re) = &self.placeholder else {
            return template.to_string();
        };
        re.replace_all(template, |caps: &regex::Captures| match input.get(&caps[1]) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            // unknown placeholders stay as written
            None => caps[0].to_string(),
        })
        .into_owned()
    }

    async fn run_command(&self, command: &str, timeout_secs: u64, input: AgentInput) -> Result<serde_json::Value> {
        let name = &self.definition.name;
        let failed = |message: String| PlannerError::AgentFailed {
            agent: name.clone(),
            message,
        };

        debug!(agent = %name, command, "Running command agent");
        let payload = serde_json::to_vec(&input)?;

        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("spawn failed: {}", e)))?;

        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return;
            };
            // commands may exit without reading stdin
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "Command did not read its input");
            }
        };

        // stdin is fed while stdout drains, and both count against the timeout
        let timeout = Duration::from_secs(timeout_secs);
        let run = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };
        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failed(e.to_string())),
            Err(_) => {
                return Err(PlannerError::AgentTimeout {
                    agent: name.clone(),
                    timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("exit code {}: {}", code, stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        Ok(serde_json::from_str(stdout)
            .unwrap_or_else(|_| serde_json::Value::String(stdout.to_string())))
    }
}

impl Agent for ConfiguredAgent {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        &self.definition.description
    }

    fn arguments(&self) -> &[String] {
        &self.definition.arguments
    }

    fn output_key(&self) -> &str {
        &self.definition.output_key
    }

    fn invoke(&self, input: AgentInput) -> BoxFuture<'_, Result<serde_json::Value>> {
        Box::pin(async move {
            match &self.definition.kind {
                AgentKind::Constant { value } => Ok(value.clone()),
                AgentKind::Template { template } => {
                    Ok(serde_json::Value::String(self.render(template, &input)))
                }
                AgentKind::Command {
                    command,
                    timeout_secs,
                } => self.run_command(command, *timeout_secs, input).await,
            }
        })
    }
}

/// Build agents for every definition, in order.
pub fn build_agents(definitions: &[AgentDefinition]) -> Result<Vec<AgentRef>> {
    definitions
        .iter()
        .map(|definition| {
            let agent: AgentRef = Arc::new(ConfiguredAgent::new(definition.clone())?);
            Ok(agent)
        })
        .collect()
}
