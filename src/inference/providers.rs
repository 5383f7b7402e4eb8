//! Completion providers and the ordered provider registry.
//!
//! Each backend implements [`CompletionProvider`]; the classification client
//! only ever sees the trait. The registry keeps configuration order, primary
//! first.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;

use super::config::{resolve_providers, LlmConfig, ProviderKind, ProviderSettings};
use super::errors::InferenceError;
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, MessagesRequest, MessagesResponse,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// One LLM backend that turns (system, user) prompts into text.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short name used in logs, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Upper bound for a single `query`.
    fn timeout(&self) -> Duration;

    /// Send one request and return the trimmed answer text.
    async fn query(&self, system: &str, user: &str) -> Result<String, InferenceError>;
}

fn build_http(settings: &ProviderSettings) -> Result<HttpClient, InferenceError> {
    HttpClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| InferenceError::ConnectionFailed {
            endpoint: settings.base_url.clone(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

fn map_send_error(e: reqwest::Error, url: &str, settings: &ProviderSettings) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout {
            provider: settings.kind.as_str().to_string(),
            duration_secs: settings.timeout_secs,
        }
    } else {
        InferenceError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

async fn read_success_body(
    response: reqwest::Response,
    settings: &ProviderSettings,
) -> Result<String, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(InferenceError::HttpError {
            status: status.as_u16(),
            body,
        });
    }
    response
        .text()
        .await
        .map_err(|e| InferenceError::InvalidResponse {
            provider: settings.kind.as_str().to_string(),
            reason: format!("failed to read response body: {e}"),
        })
}

fn non_empty(text: Option<&str>, provider: &str) -> Result<String, InferenceError> {
    match text.map(str::trim) {
        Some(answer) if !answer.is_empty() => Ok(answer.to_string()),
        _ => Err(InferenceError::EmptyResponse {
            provider: provider.to_string(),
        }),
    }
}

// ─── OpenAI ──────────────────────────────────────────────────────────────────

/// OpenAI Chat Completions backend (bearer auth).
pub struct OpenAiProvider {
    settings: ProviderSettings,
    api_key: String,
    http: HttpClient,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings, api_key: String) -> Result<Self, InferenceError> {
        let http = build_http(&settings)?;
        Ok(Self {
            settings,
            api_key,
            http,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    async fn query(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(user));

        let body = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        tracing::debug!(
            url = %url,
            model = %body.model,
            max_tokens = body.max_tokens,
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, &self.settings))?;

        let text = read_success_body(response, &self.settings).await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| InferenceError::InvalidResponse {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let answer = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref());
        non_empty(answer, self.name())
    }
}

// ─── Anthropic ───────────────────────────────────────────────────────────────

/// Anthropic Messages API backend (`x-api-key` auth).
pub struct AnthropicProvider {
    settings: ProviderSettings,
    api_key: String,
    http: HttpClient,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings, api_key: String) -> Result<Self, InferenceError> {
        let http = build_http(&settings)?;
        Ok(Self {
            settings,
            api_key,
            http,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    async fn query(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));

        let body = MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: (!system.is_empty()).then(|| system.to_string()),
            messages: vec![ChatMessage::user(user)],
        };

        tracing::debug!(
            url = %url,
            model = %body.model,
            max_tokens = body.max_tokens,
            "sending messages request"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, &self.settings))?;

        let text = read_success_body(response, &self.settings).await?;
        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| InferenceError::InvalidResponse {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let answer = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.as_deref());
        non_empty(answer, self.name())
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Ordered, immutable list of usable providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    /// Build the registry from the `llm` section, reading API keys from the
    /// environment.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::from_settings(&resolve_providers(config), |var| std::env::var(var).ok())
    }

    /// Build from resolved settings with a custom key lookup.
    ///
    /// Entries with an unknown backend or no API key are skipped.
    pub fn from_settings<F>(settings: &[ProviderSettings], lookup_key: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::new();

        for entry in settings {
            let api_key = lookup_key(&entry.api_key_env).filter(|k| !k.trim().is_empty());
            let Some(api_key) = api_key else {
                tracing::warn!(
                    provider = entry.kind.as_str(),
                    api_key_env = %entry.api_key_env,
                    "API key not set; provider unavailable"
                );
                continue;
            };

            let built: Result<Arc<dyn CompletionProvider>, InferenceError> = match entry.kind {
                ProviderKind::OpenAi => {
                    OpenAiProvider::new(entry.clone(), api_key).map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
                }
                ProviderKind::Anthropic => {
                    AnthropicProvider::new(entry.clone(), api_key).map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
                }
                ProviderKind::Unknown => {
                    tracing::warn!("unknown LLM provider in config; skipping");
                    continue;
                }
            };

            match built {
                Ok(provider) => {
                    tracing::info!(
                        provider = provider.name(),
                        model = %entry.model,
                        timeout_secs = entry.timeout_secs,
                        "provider configured"
                    );
                    providers.push(provider);
                }
                Err(e) => {
                    tracing::warn!(provider = entry.kind.as_str(), error = %e, "provider unavailable");
                }
            }
        }

        Self { providers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CompletionProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in call order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
