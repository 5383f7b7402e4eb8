use std::path::Path;

use anyhow::Context;

use vygil_agent::agent_core::{AgentError, AgentRegistry, PipelineExecutor, SensorInputs};

const USAGE: &str =
    "usage: vygil-agent <config-dir> [agent-id] [image-base64-file | --focus-summary]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(config_dir) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let agent_id = args.next();
    let image_file = args.next();

    // ── Tracing ────────────────────────────────────────────────────
    if let Err(e) = vygil_agent::init_tracing() {
        eprintln!("warning: file logging disabled: {e}");
    }

    // ── Agents ─────────────────────────────────────────────────────
    let config_dir = Path::new(&config_dir);
    let mut registry = AgentRegistry::discover(config_dir)
        .with_context(|| format!("failed to read agents from {}", config_dir.display()))?;
    if registry.is_empty() {
        return Err(AgentError::NoAgents {
            dir: config_dir.display().to_string(),
        }
        .into());
    }

    if let Some(id) = agent_id.as_deref().filter(|id| *id != "-") {
        registry.select(id)?;
    }
    let agent = registry.current().context("no agent selected")?;
    tracing::info!(
        agent_id = %agent.id,
        features = ?agent.features,
        path = %agent.config_path.display(),
        "running agent"
    );

    let executor = PipelineExecutor::from_config(agent.config.clone(), &vygil_agent::default_memory_dir());

    if image_file.as_deref() == Some("--focus-summary") {
        let summary = executor.focus_summary().await;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    // ── Sensor inputs ──────────────────────────────────────────────
    // The file holds either a raw base64 screenshot or a sensor-input JSON document.
    let inputs = match image_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {path}"))?;
            let raw = raw.trim();
            if raw.starts_with('{') {
                SensorInputs::from_json(raw)?
            } else {
                SensorInputs::with_screen(raw)
            }
        }
        None => SensorInputs::default(),
    };

    // ── Run ────────────────────────────────────────────────────────
    let result = executor.run(&inputs).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    tracing::info!(metrics = ?executor.metrics().snapshot(), "agent run finished");
    Ok(())
}
