//! Declarative agent pipeline: select a tool, execute it, analyze the result.
//!
//! Steps come from the agent file:
//! 1. **select-tool**: ask the LLM which cataloged tool fits the inputs
//! 2. **execute-tools**: call the chosen tool on a fresh MCP client
//! 3. **analyze-results**: classify the extracted text
//!
//! Each run owns its [`PipelineContext`] and its [`McpClient`]; nothing
//! mutable is shared between runs except the atomic metrics.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::config::AgentConfig;
use super::context::{PipelineContext, SensorInputs};
use super::memory::MemoryStore;
use super::metrics::PipelineMetrics;
use super::post_actions::run_post_actions;
use crate::inference::scoring::extract_json_span;
use crate::inference::{ClassificationClient, ClassificationResult, ProviderRegistry};
use crate::mcp_client::lifecycle::{CommandLauncher, ProcessLauncher};
use crate::mcp_client::types::ToolDescriptor;
use crate::mcp_client::McpClient;

/// The OCR tool, the only one whose arguments are built from sensor data.
const OCR_TOOL: &str = "extract_text";

const FOCUS_HISTORY_TOOL: &str = "get_focus_history";
const FOCUS_HISTORY_LIMIT: u32 = 10;

// ─── Steps ──────────────────────────────────────────────────────────────────

/// One pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    SelectTool,
    ExecuteTools,
    AnalyzeResults,
}

impl PipelineStep {
    /// Parse a step name; snake_case aliases are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "select-tool" | "tool_selection" => Some(PipelineStep::SelectTool),
            "execute-tools" | "execute_tools" => Some(PipelineStep::ExecuteTools),
            "analyze-results" | "analyze_results" => Some(PipelineStep::AnalyzeResults),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::SelectTool => "select-tool",
            PipelineStep::ExecuteTools => "execute-tools",
            PipelineStep::AnalyzeResults => "analyze-results",
        }
    }
}

/// Parse configured step names, skipping unknown ones with a warning.
pub fn parse_steps(names: &[String]) -> Vec<PipelineStep> {
    names
        .iter()
        .filter_map(|name| {
            let step = PipelineStep::parse(name);
            if step.is_none() {
                tracing::warn!(step = %name, "unknown pipeline step; skipping");
            }
            step
        })
        .collect()
}

// ─── Executor ───────────────────────────────────────────────────────────────

/// Runs one agent's pipeline. Cheap to share; every run is independent.
pub struct PipelineExecutor {
    config: Arc<AgentConfig>,
    classifier: Arc<ClassificationClient>,
    memory: MemoryStore,
    launcher: Arc<dyn ProcessLauncher>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineExecutor {
    pub fn new(
        config: Arc<AgentConfig>,
        classifier: Arc<ClassificationClient>,
        memory: MemoryStore,
    ) -> Self {
        Self {
            config,
            classifier,
            memory,
            launcher: Arc::new(CommandLauncher),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build the executor and its classifier from an agent config.
    ///
    /// Providers come from `llm`, memory from `memory.dir` (or
    /// `default_memory_dir`).
    pub fn from_config(config: Arc<AgentConfig>, default_memory_dir: &Path) -> Self {
        let memory = MemoryStore::new(config.memory_dir(default_memory_dir));
        let providers = ProviderRegistry::from_config(&config.llm);
        if providers.is_empty() {
            tracing::warn!(agent_id = config.id(), "no LLM provider available; analysis will fail");
        }

        let classifier = ClassificationClient::new(
            providers,
            config.classification.clone(),
            config.instructions.system_prompt.clone(),
        )
        .with_memory(Arc::new(memory.clone()));

        Self::new(config, Arc::new(classifier), memory)
    }

    /// Launch tool servers through `launcher` instead of OS processes.
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    // ─── Run ────────────────────────────────────────────────────────────

    /// Run the configured steps once. Always yields a result.
    pub async fn run(&self, inputs: &SensorInputs) -> ClassificationResult {
        let agent_id = self.config.id();
        let run_id = uuid::Uuid::new_v4();
        self.metrics.record_run();

        let mut context = PipelineContext::capture(&self.config, inputs);
        let steps = parse_steps(&self.config.pipeline);

        tracing::info!(
            agent_id,
            %run_id,
            steps = ?steps.iter().map(PipelineStep::as_str).collect::<Vec<_>>(),
            has_screen = context.has_screen(),
            "pipeline: starting run"
        );

        let client = self.config.mcp_server.as_ref().map(|server| {
            McpClient::with_launcher(agent_id, server.clone(), self.launcher.clone())
        });
        if let Some(client) = &client {
            if !client.initialize().await {
                tracing::warn!(agent_id, "pipeline: MCP initialization failed; tools will be retried on use");
            }
        }

        let result = self.run_steps(&steps, client.as_ref(), &mut context).await;

        if let Some(client) = client {
            client.close().await;
        }

        if result.raw_provider_text.is_none() && result.confidence == 0.0 {
            self.metrics.record_classification_failure();
        }

        run_post_actions(&self.config.post_actions, &self.memory, agent_id, &result).await;

        tracing::info!(
            agent_id,
            %run_id,
            label = %result.label,
            confidence = result.confidence,
            tool = context.selected_tool.as_deref().unwrap_or("none"),
            "pipeline: run complete"
        );
        result
    }

    async fn run_steps(
        &self,
        steps: &[PipelineStep],
        client: Option<&McpClient>,
        context: &mut PipelineContext,
    ) -> ClassificationResult {
        for step in steps {
            match step {
                PipelineStep::SelectTool => {
                    context.selected_tool = self.select_tool(context).await;
                }
                PipelineStep::ExecuteTools => {
                    self.execute_tool(client, context).await;
                }
                PipelineStep::AnalyzeResults => {
                    return self.analyze(context).await;
                }
            }
        }

        tracing::debug!("pipeline: no analyze-results step reached; running best-effort analysis");
        self.analyze(context).await
    }

    // ── Phase 1: Select ─────────────────────────────────────────────────

    async fn select_tool(&self, context: &PipelineContext) -> Option<String> {
        let catalog = self.config.tool_catalog();
        if catalog.is_empty() {
            tracing::info!("pipeline: tool catalog is empty; nothing to select");
            return None;
        }

        let Some(template) = self
            .config
            .prompts
            .tool_selection
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        else {
            return fallback_tool(catalog, &self.config.default_tool);
        };

        let listing = catalog
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = template
            .replace("{available_tools}", &listing)
            .replace("{has_screen}", if context.has_screen() { "true" } else { "false" });

        let Some(answer) = self.classifier.complete("", &prompt).await else {
            tracing::warn!("pipeline: tool selection got no answer; using fallback");
            return fallback_tool(catalog, &self.config.default_tool);
        };

        match parse_tool_choice(&answer) {
            Some(tool) if catalog.iter().any(|t| t.name == tool) => {
                tracing::info!(tool = %tool, "pipeline: tool selected");
                Some(tool)
            }
            choice => {
                tracing::warn!(
                    answer = %answer,
                    choice = choice.as_deref().unwrap_or(""),
                    "pipeline: tool selection unusable; using fallback"
                );
                fallback_tool(catalog, &self.config.default_tool)
            }
        }
    }

    // ── Phase 2: Execute ────────────────────────────────────────────────

    async fn execute_tool(&self, client: Option<&McpClient>, context: &mut PipelineContext) {
        let agent_id = self.config.id();

        let Some(tool) = context.selected_tool.clone() else {
            tracing::warn!(agent_id, "pipeline: no tool selected before execute-tools");
            return;
        };
        let Some(client) = client else {
            tracing::warn!(agent_id, tool = %tool, "pipeline: no tool server configured");
            return;
        };

        let arguments = match (tool.as_str(), context.screen_data_uri()) {
            (OCR_TOOL, Some(uri)) => serde_json::json!({ "imageData": uri }),
            _ => serde_json::json!({}),
        };

        self.metrics.record_tool_call();
        let result = client.call_tool(&tool, arguments).await;

        if result.success {
            context.intermediate_text = result.text();
            tracing::debug!(
                agent_id,
                tool = %tool,
                chars = context.intermediate_text.as_ref().map_or(0, |t| t.chars().count()),
                "pipeline: tool succeeded"
            );
        } else {
            self.metrics.record_tool_fault();
            tracing::warn!(
                agent_id,
                tool = %tool,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "pipeline: tool failed; continuing with empty text"
            );
        }
    }

    // ── Phase 3: Analyze ────────────────────────────────────────────────

    async fn analyze(&self, context: &PipelineContext) -> ClassificationResult {
        let text = context.intermediate_text.as_deref().unwrap_or("");
        self.classifier.classify(text, self.config.id()).await
    }

    // ─── Focus Summary ──────────────────────────────────────────────────

    /// Recent focus history from the tool server, when it exposes one.
    ///
    /// Uses its own client, closed before returning. Servers without
    /// `get_focus_history` (or agents without a server) yield a summary with
    /// no entries.
    pub async fn focus_summary(&self) -> FocusSummary {
        let agent = self.config.display_name().to_string();
        let unavailable = || FocusSummary {
            message: "Focus summary not available".to_string(),
            summary: None,
            agent: agent.clone(),
        };

        let Some(server) = self.config.mcp_server.as_ref() else {
            return unavailable();
        };
        let client = McpClient::with_launcher(self.config.id(), server.clone(), self.launcher.clone());

        let tools = client.list_tools().await;
        let summary = if tools.iter().any(|t| t.name == FOCUS_HISTORY_TOOL) {
            let result = client
                .call_tool(FOCUS_HISTORY_TOOL, serde_json::json!({ "limit": FOCUS_HISTORY_LIMIT }))
                .await;
            let history = if result.success {
                result.payload.get("history").cloned().unwrap_or_default()
            } else {
                tracing::warn!(
                    agent_id = self.config.id(),
                    error = result.error.as_deref().unwrap_or("unknown error"),
                    "pipeline: focus history unavailable"
                );
                serde_json::Value::Null
            };
            FocusSummary {
                message: "Focus summary retrieved".to_string(),
                summary: Some(match history {
                    serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
                    other => other,
                }),
                agent: agent.clone(),
            }
        } else {
            unavailable()
        };

        client.close().await;
        summary
    }
}

/// Outcome of [`PipelineExecutor::focus_summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusSummary {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
    pub agent: String,
}

/// `default_tool` when cataloged, else the first cataloged tool.
fn fallback_tool(catalog: &[ToolDescriptor], default_tool: &str) -> Option<String> {
    catalog
        .iter()
        .find(|t| t.name == default_tool)
        .or_else(|| catalog.first())
        .map(|t| t.name.clone())
}

/// Extract `tool` from a `{"tool": "..."}` answer, tolerating surrounding prose.
fn parse_tool_choice(answer: &str) -> Option<String> {
    let span = extract_json_span(answer.trim())?;
    let value: serde_json::Value = serde_json::from_str(span).ok()?;
    value.get("tool")?.as_str().map(|s| s.trim().to_string())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
