use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    // Planning errors
    #[error("No path found for goal: {goal}")]
    NoPathFound { goal: String },

    #[error("Dependency graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Execution errors
    #[error("Agent failed: {agent}: {message}")]
    AgentFailed { agent: String, message: String },

    #[error("Agent timeout after {timeout_secs}s: {agent}")]
    AgentTimeout { agent: String, timeout_secs: u64 },

    #[error("Execution exceeded max steps ({0})")]
    MaxStepsExceeded(usize),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Journal errors
    #[error("Journal error: {0}")]
    Journal(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
