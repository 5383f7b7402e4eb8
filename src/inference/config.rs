//! LLM provider configuration loading and resolution.
//!
//! Parses the `llm` and `classification` sections of an agent file and
//! resolves the ordered provider chain. Also owns `${VAR}` interpolation for
//! every config file the crate reads.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::errors::InferenceError;

// ─── Defaults ────────────────────────────────────────────────────────────────

const DEFAULT_MAX_TOKENS: u32 = 50;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Label prefix used when the agent file does not set one.
pub const DEFAULT_LABEL_PREFIX: &str = "label:";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Which backend API a provider entry speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI Chat Completions.
    #[serde(alias = "open_ai")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Anything else; skipped when building the registry.
    #[serde(other)]
    Unknown,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
            ProviderKind::Unknown => "",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Unknown => "",
        }
    }

    fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Unknown => "",
        }
    }
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::OpenAi
}

/// One entry in `llm.fallback_providers`. Unset fields inherit from the
/// primary entry (model, URL and key only when the backend matches).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// The `llm` section: primary provider plus ordered fallbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider_kind")]
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Per-attempt timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub fallback_providers: Vec<ProviderEntry>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_kind(),
            model: None,
            max_tokens: None,
            temperature: None,
            timeout: None,
            base_url: None,
            api_key_env: None,
            fallback_providers: Vec::new(),
        }
    }
}

/// Fully resolved call parameters for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub base_url: String,
    pub api_key_env: String,
}

/// How the provider's answer is turned into a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    /// Use the answer as-is, adding the label prefix when missing.
    #[default]
    Plain,
    /// The answer embeds a JSON object; its `activity` field is the label.
    JsonActivity,
}

/// The `classification` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationSettings {
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
    #[serde(default)]
    pub answer_format: AnswerFormat,
    /// Inputs shorter than this (after trimming) are not sent to a provider.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Inputs longer than this are truncated before sending.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}
fn default_min_chars() -> usize {
    10
}
fn default_max_chars() -> usize {
    2000
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            label_prefix: default_label_prefix(),
            answer_format: AnswerFormat::default(),
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
        }
    }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolve the ordered provider chain: primary first, then fallbacks.
///
/// "Resolved" here means every parameter has a value; whether a provider is
/// usable (API key present) is decided when the registry is built.
pub fn resolve_providers(config: &LlmConfig) -> Vec<ProviderSettings> {
    let kind = config.provider;
    let primary = ProviderSettings {
        kind,
        model: config
            .model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string()),
        max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        timeout_secs: config.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        base_url: config
            .base_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string()),
        api_key_env: config
            .api_key_env
            .clone()
            .unwrap_or_else(|| kind.default_api_key_env().to_string()),
    };

    let mut chain = Vec::with_capacity(1 + config.fallback_providers.len());
    for entry in &config.fallback_providers {
        let same_backend = entry.provider == primary.kind;
        let inherit = |own: &Option<String>, primary_value: &str, kind_default: &str| {
            own.clone().unwrap_or_else(|| {
                if same_backend {
                    primary_value.to_string()
                } else {
                    kind_default.to_string()
                }
            })
        };
        chain.push(ProviderSettings {
            kind: entry.provider,
            model: inherit(&entry.model, primary.model.as_str(), entry.provider.default_model()),
            max_tokens: entry.max_tokens.unwrap_or(primary.max_tokens),
            temperature: entry.temperature.unwrap_or(primary.temperature),
            timeout_secs: entry.timeout.unwrap_or(primary.timeout_secs),
            base_url: inherit(
                &entry.base_url,
                primary.base_url.as_str(),
                entry.provider.default_base_url(),
            ),
            api_key_env: inherit(
                &entry.api_key_env,
                primary.api_key_env.as_str(),
                entry.provider.default_api_key_env(),
            ),
        });
    }
    chain.insert(0, primary);
    chain
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Read a YAML file, interpolate environment variables, and parse it.
///
/// Interpolation handles `${VAR_NAME}` and `${VAR_NAME:-default}`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to parse {}: {e}", path.display()),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Substitute `${NAME}` and `${NAME:-fallback}` references from the environment.
///
/// Unset names without a fallback become empty. An unterminated `${` is kept
/// as written.
pub fn interpolate_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let body = &rest[open + 2..];
        let Some(close) = body.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        out.push_str(&lookup_env(&body[..close]));
        rest = &body[close + 1..];
    }

    out.push_str(rest);
    out
}

fn lookup_env(reference: &str) -> String {
    match reference.split_once(":-") {
        Some((name, fallback)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(fallback)),
        None => std::env::var(reference).unwrap_or_default(),
    }
}

/// `~/x` becomes `<home>/x`; anything else is returned unchanged.
pub fn expand_tilde(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
        _ => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
