//! Agent configuration loading.
//!
//! One YAML file per agent. Loaded once, then shared read-only behind an
//! `Arc` by every run of that agent.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::AgentError;
use super::post_actions::PostAction;
use crate::inference::client::MEMORY_PLACEHOLDER;
use crate::inference::config::{expand_tilde, load_yaml, ClassificationSettings, LlmConfig};
use crate::mcp_client::types::{ServerConfig, ToolDescriptor};

/// Tool chosen when selection cannot decide.
pub const DEFAULT_TOOL: &str = "extract_text";

// ─── Sections ────────────────────────────────────────────────────────────────

/// The `agent` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Declared sensors, e.g. `["screen"]`.
    #[serde(default)]
    pub sensors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prompts {
    /// Template with `{available_tools}` and `{has_screen}` placeholders.
    #[serde(default)]
    pub tool_selection: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instructions {
    /// Classification system prompt; may contain `$MEMORY`.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemorySettings {
    /// Directory for memory and metrics files. Defaults to `<data_dir>/memory`.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

// ─── AgentConfig ─────────────────────────────────────────────────────────────

/// A complete agent definition.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentInfo,
    /// Absent means the agent has no tool server.
    #[serde(default)]
    pub mcp_server: Option<ServerConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub classification: ClassificationSettings,
    /// Step names, in order. Parsed leniently by the pipeline.
    #[serde(default)]
    pub pipeline: Vec<String>,
    #[serde(default = "default_tool")]
    pub default_tool: String,
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub instructions: Instructions,
    #[serde(default)]
    pub memory: Option<MemorySettings>,
    #[serde(default)]
    pub post_actions: Vec<PostAction>,
}

impl AgentConfig {
    /// Load an agent file, interpolating `${VAR}` references.
    ///
    /// A missing `agent.id` is filled from the file stem.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let mut config: AgentConfig = load_yaml(path).map_err(|e| AgentError::config(path, e))?;

        if config.agent.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("agent")
                .to_string();
            config.agent.id = Some(stem);
        }

        tracing::debug!(
            path = %path.display(),
            agent_id = config.id(),
            steps = config.pipeline.len(),
            tools = config.tool_catalog().len(),
            "agent config loaded"
        );
        Ok(config)
    }

    pub fn id(&self) -> &str {
        self.agent.id.as_deref().unwrap_or("agent")
    }

    pub fn display_name(&self) -> &str {
        self.agent.name.as_deref().unwrap_or_else(|| self.id())
    }

    /// Ordered tool catalog; empty when no tool server is configured.
    pub fn tool_catalog(&self) -> &[ToolDescriptor] {
        self.mcp_server
            .as_ref()
            .map(|s| s.tools.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_sensor(&self, sensor: &str) -> bool {
        self.agent.sensors.iter().any(|s| s == sensor)
    }

    /// Resolved memory directory, falling back to `fallback`.
    pub fn memory_dir(&self, fallback: &Path) -> PathBuf {
        self.memory
            .as_ref()
            .and_then(|m| m.dir.as_deref())
            .filter(|d| !d.trim().is_empty())
            .map(|d| PathBuf::from(expand_tilde(d)))
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    /// Human-readable capability list shown when listing agents.
    pub fn features(&self) -> Vec<String> {
        let mut features = Vec::new();
        if self.memory.is_some() {
            features.push("Memory Persistence".to_string());
        }
        if self
            .instructions
            .system_prompt
            .as_deref()
            .is_some_and(|p| p.contains(MEMORY_PLACEHOLDER))
        {
            features.push("Context Injection".to_string());
        }
        if !self.post_actions.is_empty() {
            features.push("Post Actions".to_string());
        }
        if self.mcp_server.is_some() {
            features.push("MCP Tools".to_string());
        }
        if !self.llm.fallback_providers.is_empty() {
            features.push("Multi-LLM Support".to_string());
        }
        features
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::config::{AnswerFormat, ProviderKind};

    const FULL: &str = r#"
agent:
  id: vygil-activity-tracker
  name: Activity Tracker
  description: Tracks what you are doing
  version: 1.2.0
  sensors: [screen]
mcp_server:
  command: node
  args: ["${__VYGIL_TEST_SERVER_DIR__:-/opt/vygil}/server.js"]
  tools:
    extract_text:
      description: OCR a screenshot
    get_focus_history:
      description: Recent focus entries
llm:
  provider: openai
  model: gpt-4o-mini
  fallback_providers:
    - provider: anthropic
classification:
  label_prefix: "ACTIVITY:"
  answer_format: json_activity
pipeline: [tool_selection, execute_tools, analyze_results]
prompts:
  tool_selection: "Tools:\n{available_tools}\nScreen: {has_screen}"
instructions:
  system_prompt: "Recent: $MEMORY"
memory: {}
post_actions:
  - action: append_memory
    max_entries: 20
  - action: record_metric
"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "activity-agent.yaml", FULL);
        let config = AgentConfig::load(&path).unwrap();

        assert_eq!(config.id(), "vygil-activity-tracker");
        assert_eq!(config.display_name(), "Activity Tracker");
        assert!(config.has_sensor("screen"));
        assert_eq!(
            config.mcp_server.as_ref().unwrap().args,
            vec!["/opt/vygil/server.js".to_string()]
        );

        let names: Vec<&str> = config.tool_catalog().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["extract_text", "get_focus_history"]);

        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
        assert_eq!(config.classification.label_prefix, "ACTIVITY:");
        assert_eq!(config.classification.answer_format, AnswerFormat::JsonActivity);
        assert_eq!(config.default_tool, "extract_text");
        assert_eq!(config.post_actions.len(), 2);
        assert_eq!(
            config.features(),
            vec![
                "Memory Persistence",
                "Context Injection",
                "Post Actions",
                "MCP Tools",
                "Multi-LLM Support"
            ]
        );
    }

    #[test]
    fn test_minimal_config_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bare-agent.yaml", "pipeline: [analyze-results]\n");
        let config = AgentConfig::load(&path).unwrap();

        assert_eq!(config.id(), "bare-agent");
        assert!(config.tool_catalog().is_empty());
        assert!(config.features().is_empty());
        assert_eq!(config.classification.label_prefix, "label:");
        assert_eq!(config.memory_dir(Path::new("/fallback")), PathBuf::from("/fallback"));
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken-agent.yaml", "agent: [unclosed\n");
        match AgentConfig::load(&path) {
            Err(AgentError::ConfigError { path: p, .. }) => assert!(p.ends_with("broken-agent.yaml")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_memory_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "m-agent.yaml", "memory:\n  dir: /var/lib/vygil/memory\n");
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(
            config.memory_dir(Path::new("/fallback")),
            PathBuf::from("/var/lib/vygil/memory")
        );
    }
}
