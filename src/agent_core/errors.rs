//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent configuration could not be read or parsed.
    #[error("config error in '{path}': {reason}")]
    ConfigError { path: String, reason: String },

    /// No agent with this id was discovered.
    #[error("agent not found: '{agent_id}'")]
    AgentNotFound { agent_id: String },

    /// Discovery found no loadable agents.
    #[error("no agents found in '{dir}'")]
    NoAgents { dir: String },

    /// Memory or metrics file I/O failed.
    #[error("storage error for '{path}': {reason}")]
    StorageError { path: String, reason: String },

    /// Sensor payload could not be decoded.
    #[error("invalid sensor input: {reason}")]
    InvalidSensorInput { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

impl AgentError {
    /// Wrap an inference config error with the file it came from.
    pub fn config(path: &std::path::Path, err: InferenceError) -> Self {
        let reason = match err {
            InferenceError::ConfigError { reason } => reason,
            other => other.to_string(),
        };
        AgentError::ConfigError {
            path: path.display().to_string(),
            reason,
        }
    }
}
