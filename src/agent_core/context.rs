//! Per-run pipeline state and sensor inputs.

use std::collections::HashMap;

use serde::Deserialize;

use super::config::AgentConfig;
use super::errors::AgentError;

/// Sensor name for screen captures.
pub const SCREEN_SENSOR: &str = "screen";

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Raw sensor payloads for one run, e.g. `{"screen": {"image": "<base64>"}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SensorInputs(pub HashMap<String, serde_json::Value>);

impl SensorInputs {
    /// Inputs carrying only a screen capture.
    pub fn with_screen(image: impl Into<String>) -> Self {
        let mut sensors = HashMap::new();
        sensors.insert(
            SCREEN_SENSOR.to_string(),
            serde_json::json!({ "image": image.into() }),
        );
        Self(sensors)
    }

    /// Parse inputs from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, AgentError> {
        serde_json::from_str(raw).map_err(|e| AgentError::InvalidSensorInput {
            reason: e.to_string(),
        })
    }

    /// The screen image payload, if present and non-empty.
    pub fn screen_image(&self) -> Option<&str> {
        self.0
            .get(SCREEN_SENSOR)?
            .get("image")?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }
}

/// State owned by exactly one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineContext {
    /// Sensor name → captured input (screen images as `data:` URIs).
    captures: HashMap<String, String>,
    pub selected_tool: Option<String>,
    pub intermediate_text: Option<String>,
}

impl PipelineContext {
    /// Capture the inputs of the sensors the agent declares.
    pub fn capture(config: &AgentConfig, inputs: &SensorInputs) -> Self {
        let mut context = Self::default();

        if config.has_sensor(SCREEN_SENSOR) {
            if let Some(image) = inputs.screen_image() {
                let uri = if image.starts_with("data:") {
                    image.to_string()
                } else {
                    format!("{PNG_DATA_URI_PREFIX}{image}")
                };
                context.captures.insert(SCREEN_SENSOR.to_string(), uri);
            }
        }

        context
    }

    /// The screen capture as a `data:` URI.
    pub fn screen_data_uri(&self) -> Option<&str> {
        self.captures.get(SCREEN_SENSOR).map(String::as_str)
    }

    pub fn has_screen(&self) -> bool {
        self.captures.contains_key(SCREEN_SENSOR)
    }
}
