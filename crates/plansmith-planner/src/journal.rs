use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use plansmith_core::error::{PlannerError, Result};
use plansmith_core::types::{AgentInvocation, RunId};

/// One line of the run journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A run began with these initial scope values.
    Started {
        run_id: String,
        #[serde(default)]
        input: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    /// An agent finished and its output was written to the scope.
    AgentCompleted {
        agent_name: String,
        output_key: String,
        output: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    /// A run was resumed, optionally with extra input.
    Resumed {
        #[serde(default)]
        input: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
}

impl JournalEntry {
    pub fn started(run_id: &RunId, input: HashMap<String, serde_json::Value>) -> Self {
        Self::Started {
            run_id: run_id.to_string(),
            input,
            timestamp: Utc::now(),
        }
    }

    pub fn agent_completed(invocation: &AgentInvocation) -> Self {
        Self::AgentCompleted {
            agent_name: invocation.agent_name.clone(),
            output_key: invocation.output_key.clone(),
            output: invocation.output.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn resumed(input: HashMap<String, serde_json::Value>) -> Self {
        Self::Resumed {
            input,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only JSONL journal of a run.
///
/// Every entry is flushed as soon as it is written, so a crashed run leaves
/// all completed invocations on disk.
pub struct RunJournal {
    path: PathBuf,
    writer: Mutex<tokio::io::BufWriter<tokio::fs::File>>,
}

impl RunJournal {
    /// Open (or create) the journal at `path` for appending.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PlannerError::Journal(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Run journal opened");
        Ok(Self {
            path,
            writer: Mutex::new(tokio::io::BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it.
    pub async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read every entry of a journal file. Lines that do not parse are skipped.
    pub async fn load(path: &Path) -> Result<Vec<JournalEntry>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PlannerError::Journal(format!("{}: {}", path.display(), e)))?;

        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(line = number + 1, error = %e, "Skipping unparseable journal line");
                }
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "Journal loaded");
        Ok(entries)
    }
}
