//! Agent discovery and the explicit "current agent" switch.
//!
//! Agents are `*-agent.yaml` files in one directory. Discovery loads all of
//! them once; files that fail to parse are logged and skipped so one broken
//! agent never hides the rest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::config::AgentConfig;
use super::errors::AgentError;

/// Selected after discovery when present.
pub const PREFERRED_AGENT: &str = "vygil-focus-assistant";

const AGENT_FILE_SUFFIX: &str = "-agent.yaml";

/// One discovered agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub config_path: PathBuf,
    pub features: Vec<String>,
    #[serde(skip)]
    pub config: Arc<AgentConfig>,
}

impl AgentEntry {
    fn new(config: AgentConfig, config_path: PathBuf) -> Self {
        Self {
            id: config.id().to_string(),
            name: config.display_name().to_string(),
            description: config.agent.description.clone().unwrap_or_default(),
            version: config.agent.version.clone().unwrap_or_else(|| "1.0.0".to_string()),
            features: config.features(),
            config_path,
            config: Arc::new(config),
        }
    }
}

/// Discovered agents, sorted by id, plus the current selection.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentEntry>,
    current: Option<usize>,
}

impl AgentRegistry {
    /// Load every `*-agent.yaml` in `dir`.
    ///
    /// Selects [`PREFERRED_AGENT`] when present, else the first agent.
    pub fn discover(dir: &Path) -> Result<Self, AgentError> {
        let read_dir = std::fs::read_dir(dir).map_err(|e| AgentError::ConfigError {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        // Sorted so the first file by name wins a duplicate id.
        let mut paths: Vec<PathBuf> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(AGENT_FILE_SUFFIX))
                    && path.is_file()
            })
            .collect();
        paths.sort();

        let mut agents: Vec<AgentEntry> = Vec::new();

        for path in paths {
            match AgentConfig::load(&path) {
                Ok(config) => {
                    if agents.iter().any(|a| a.id == config.id()) {
                        tracing::warn!(
                            path = %path.display(),
                            agent_id = config.id(),
                            "duplicate agent id; skipping"
                        );
                        continue;
                    }
                    agents.push(AgentEntry::new(config, path));
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to load agent; skipping");
                }
            }
        }

        agents.sort_by(|a, b| a.id.cmp(&b.id));

        let current = agents
            .iter()
            .position(|a| a.id == PREFERRED_AGENT)
            .or(if agents.is_empty() { None } else { Some(0) });

        tracing::info!(
            dir = %dir.display(),
            count = agents.len(),
            agents = ?agents.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
            current = current.map(|i| agents[i].id.as_str()).unwrap_or("none"),
            "agents discovered"
        );

        Ok(Self { agents, current })
    }

    /// Switch the current agent.
    pub fn select(&mut self, agent_id: &str) -> Result<(), AgentError> {
        let index = self
            .agents
            .iter()
            .position(|a| a.id == agent_id)
            .ok_or_else(|| AgentError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;
        self.current = Some(index);
        tracing::info!(agent_id, "agent selected");
        Ok(())
    }

    pub fn current(&self) -> Option<&AgentEntry> {
        self.current.and_then(|i| self.agents.get(i))
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentEntry> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    pub fn agents(&self) -> &[AgentEntry] {
        &self.agents
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
