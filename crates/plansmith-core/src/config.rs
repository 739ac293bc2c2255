use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PlannerError, Result};

/// Top-level plansmith configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlansmithConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub p2p: P2pConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub journal: Option<JournalConfig>,
    #[serde(default)]
    pub log: Option<LogConfig>,
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

/// Which planner drives a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    #[default]
    GoalOriented,
    #[serde(rename = "p2p")]
    PeerToPeer,
    Sequence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Name of the planner agent that owns the run.
    #[serde(default = "default_planner_name")]
    pub name: String,
    #[serde(default)]
    pub kind: PlannerKind,
    /// Goal variable. Required for goal-oriented planning; for other
    /// planners it names the value reported as the run output.
    #[serde(default)]
    pub goal: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            name: default_planner_name(),
            kind: PlannerKind::default(),
            goal: None,
        }
    }
}

fn default_planner_name() -> String {
    "plansmith".to_string()
}

/// How the peer-to-peer planner picks among several ready agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Next ready agent after the previously selected one, in declaration order.
    #[default]
    RoundRobin,
    /// First agent, in declaration order, that never ran or saw one of its
    /// inputs rewritten since it last ran.
    OnStateChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    /// Maximum number of agent invocations.
    #[serde(default = "default_max_invocations")]
    pub max_invocations: usize,
    #[serde(default)]
    pub selection: SelectionPolicy,
    /// Stop as soon as a numeric state value reaches a threshold.
    #[serde(default)]
    pub exit: Option<ExitCondition>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            max_invocations: default_max_invocations(),
            selection: SelectionPolicy::default(),
            exit: None,
        }
    }
}

fn default_max_invocations() -> usize {
    10
}

/// `key >= threshold` over a numeric scope value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitCondition {
    pub key: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Hard cap on planner steps for a single run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

fn default_max_steps() -> usize {
    100
}

/// JSONL invocation journal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Enable journaling (default: true when section is present).
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// Journal file. Default: ./plansmith-journal.jsonl
    #[serde(default)]
    pub path: Option<String>,
}

fn default_journal_enabled() -> bool {
    true
}

impl JournalConfig {
    pub fn journal_path(&self) -> PathBuf {
        PathBuf::from(
            self.path
                .as_deref()
                .unwrap_or("plansmith-journal.jsonl"),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// An agent described in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    pub output_key: String,
    pub kind: AgentKind,
}

/// What a configured agent does when invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentKind {
    /// Always returns the same value.
    Constant { value: serde_json::Value },
    /// Renders `{{argument}}` placeholders with the argument values.
    Template { template: String },
    /// Runs a shell command; arguments arrive as a JSON object on stdin.
    Command {
        command: String,
        #[serde(default = "default_command_timeout")]
        timeout_secs: u64,
    },
}

fn default_command_timeout() -> u64 {
    30
}

impl PlansmithConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| PlannerError::ConfigNotFound(path.display().to_string()))?;
        debug!(path = %path.display(), "Loading config");
        Self::from_toml(&content)
    }

    /// Parse config from TOML text, with env var expansion and validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| PlannerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(PlannerError::Config("agent name cannot be empty".into()));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(PlannerError::Config(format!(
                    "duplicate agent name: {}",
                    agent.name
                )));
            }
            if agent.output_key.trim().is_empty() {
                return Err(PlannerError::Config(format!(
                    "agent '{}' has an empty output_key",
                    agent.name
                )));
            }
        }

        if self.planner.kind == PlannerKind::GoalOriented && self.planner.goal.is_none() {
            return Err(PlannerError::Config(
                "goal_oriented planner requires planner.goal".into(),
            ));
        }

        if self.p2p.max_invocations == 0 {
            return Err(PlannerError::Config(
                "p2p.max_invocations must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// `${NAME}` or `${NAME:-fallback}`.
const ENV_REFERENCE: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}";

/// Substitute environment references. Unset variables take their fallback
/// when one is given and are left as written otherwise.
fn expand_env_vars(input: &str) -> Result<String> {
    let reference = Regex::new(ENV_REFERENCE).map_err(|e| PlannerError::Config(e.to_string()))?;
    let expanded = reference.replace_all(input, |caps: &Captures| {
        match (std::env::var(&caps[1]), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                warn!(var = &caps[1], "Environment variable not set");
                caps[0].to_string()
            }
        }
    });
    Ok(expanded.into_owned())
}
