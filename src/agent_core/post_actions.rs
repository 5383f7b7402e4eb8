//! Post-run actions selected by configuration.

use serde::{Deserialize, Serialize};

use super::errors::AgentError;
use super::memory::MemoryStore;
use crate::inference::ClassificationResult;

/// Newest metric entries kept per agent.
const MAX_METRIC_ENTRIES: usize = 100;

fn default_max_entries() -> usize {
    50
}

/// An action run after every pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PostAction {
    /// Append `"[HH:MM AM] <label>"` to the agent's memory.
    AppendMemory {
        #[serde(default = "default_max_entries")]
        max_entries: usize,
    },
    /// Append the result to `<agent_id>_metrics.json`.
    RecordMetric,
    /// Emit the result as a structured log event.
    LogResult,
}

/// One line of the metrics file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub timestamp: String,
    pub agent_id: String,
    pub label: String,
    pub confidence: f64,
}

impl PostAction {
    pub fn name(&self) -> &'static str {
        match self {
            PostAction::AppendMemory { .. } => "append_memory",
            PostAction::RecordMetric => "record_metric",
            PostAction::LogResult => "log_result",
        }
    }

    pub async fn apply(
        &self,
        store: &MemoryStore,
        agent_id: &str,
        result: &ClassificationResult,
    ) -> Result<(), AgentError> {
        match self {
            PostAction::AppendMemory { max_entries } => {
                let time = chrono::Local::now().format("%I:%M %p");
                store
                    .append_entry(agent_id, &format!("[{time}] {}", result.label), *max_entries)
                    .await
            }
            PostAction::RecordMetric => record_metric(store, agent_id, result).await,
            PostAction::LogResult => {
                tracing::info!(
                    agent_id,
                    label = %result.label,
                    confidence = result.confidence,
                    raw = result.raw_provider_text.as_deref().unwrap_or(""),
                    "pipeline result"
                );
                Ok(())
            }
        }
    }
}

/// Run every action; failures are logged and never propagate.
pub async fn run_post_actions(
    actions: &[PostAction],
    store: &MemoryStore,
    agent_id: &str,
    result: &ClassificationResult,
) {
    for action in actions {
        if let Err(e) = action.apply(store, agent_id, result).await {
            tracing::warn!(agent_id, action = action.name(), error = %e, "post action failed");
        }
    }
}

async fn record_metric(
    store: &MemoryStore,
    agent_id: &str,
    result: &ClassificationResult,
) -> Result<(), AgentError> {
    let path = store.metrics_path(agent_id);
    let entry = MetricEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        agent_id: agent_id.to_string(),
        label: result.label.clone(),
        confidence: result.confidence,
    };

    store
        .update_file(&path, |raw| {
            let mut entries: Vec<MetricEntry> = if raw.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(raw).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "metrics file unreadable; starting fresh");
                    Vec::new()
                })
            };

            entries.push(entry);
            let skip = entries.len().saturating_sub(MAX_METRIC_ENTRIES);
            entries.drain(..skip);

            Ok(serde_json::to_string_pretty(&entries)?)
        })
        .await
}
