//! Classification client.
//!
//! Sends screen text to the configured providers in order and turns the first
//! usable answer into a [`ClassificationResult`]. Handles the fallback chain
//! when a provider errors, times out, or answers with nothing.

use std::sync::Arc;
use std::time::Instant;

use super::config::ClassificationSettings;
use super::errors::InferenceError;
use super::providers::ProviderRegistry;
use super::scoring::{confidence, format_label, screen_prompt};
use super::types::ClassificationResult;

/// Placeholder in system prompts replaced with the agent's memory.
pub const MEMORY_PLACEHOLDER: &str = "$MEMORY";

const EMPTY_MEMORY: &str = "No previous activities recorded.";

/// Source of per-agent memory text for `$MEMORY` injection.
pub trait MemorySource: Send + Sync {
    /// The agent's memory, or `None` when nothing is recorded.
    fn recall(&self, agent_id: &str) -> Option<String>;
}

/// Substitute `memory` for every `$MEMORY` in `template`.
///
/// Blank or missing memory renders as a fixed "nothing recorded" line.
pub fn render_memory(template: &str, memory: Option<&str>) -> String {
    let memory = memory
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(EMPTY_MEMORY);
    template.replace(MEMORY_PLACEHOLDER, memory)
}

// ─── ClassificationClient ────────────────────────────────────────────────────

/// Turns text into labels using an ordered provider chain.
///
/// Immutable after construction; share it behind an `Arc` across runs.
pub struct ClassificationClient {
    providers: ProviderRegistry,
    settings: ClassificationSettings,
    system_prompt: Option<String>,
    memory: Option<Arc<dyn MemorySource>>,
}

impl ClassificationClient {
    pub fn new(
        providers: ProviderRegistry,
        settings: ClassificationSettings,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            providers,
            settings,
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
            memory: None,
        }
    }

    /// Attach a memory source for `$MEMORY` injection.
    pub fn with_memory(mut self, memory: Arc<dyn MemorySource>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn label_prefix(&self) -> &str {
        &self.settings.label_prefix
    }

    /// Provider names in fallback order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.names()
    }

    // ─── Classification ──────────────────────────────────────────────────

    /// Classify `text` on behalf of `agent_id`.
    ///
    /// Never fails: every failure path yields a fixed, zero- or
    /// low-confidence result.
    pub async fn classify(&self, text: &str, agent_id: &str) -> ClassificationResult {
        let prefix = self.settings.label_prefix.as_str();

        if text.trim().chars().count() < self.settings.min_chars {
            tracing::debug!(agent_id, "insufficient screen content; skipping providers");
            return ClassificationResult::fixed(prefix, "Insufficient screen content", 0.2);
        }

        let Some(template) = self.system_prompt.as_deref() else {
            tracing::warn!(agent_id, "no system prompt configured");
            return ClassificationResult::fixed(prefix, "Configuration error", 0.0);
        };

        let system = self.inject_memory(template, agent_id);
        let user = screen_prompt(text, self.settings.max_chars);

        match self.query_chain(&system, &user).await {
            Ok(answer) => {
                let confidence = confidence(text, &answer, prefix);
                let label = format_label(&answer, prefix, self.settings.answer_format);
                tracing::info!(agent_id, label = %label, confidence, "classified");
                ClassificationResult {
                    label,
                    confidence,
                    raw_provider_text: Some(answer),
                }
            }
            Err(e) => {
                tracing::error!(agent_id, error = %e, "all LLM providers failed");
                ClassificationResult::fixed(prefix, "LLM analysis failed", 0.0)
            }
        }
    }

    /// Free-form completion through the same fallback chain, no scoring.
    pub async fn complete(&self, system: &str, user: &str) -> Option<String> {
        match self.query_chain(system, user).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!(error = %e, "completion failed");
                None
            }
        }
    }

    /// Replace `$MEMORY` in `template` with the agent's memory.
    pub fn inject_memory(&self, template: &str, agent_id: &str) -> String {
        if !template.contains(MEMORY_PLACEHOLDER) {
            return template.to_string();
        }
        let memory = self.memory.as_ref().and_then(|m| m.recall(agent_id));
        render_memory(template, memory.as_deref())
    }

    // ─── Fallback Chain ──────────────────────────────────────────────────

    /// Try providers strictly in order; first non-empty answer wins.
    async fn query_chain(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        let mut attempted = Vec::with_capacity(self.providers.len());

        for provider in self.providers.iter() {
            let name = provider.name().to_string();
            let start = Instant::now();

            let outcome = match tokio::time::timeout(provider.timeout(), provider.query(system, user)).await {
                Ok(result) => result,
                Err(_) => Err(InferenceError::Timeout {
                    provider: name.clone(),
                    duration_secs: provider.timeout().as_secs(),
                }),
            };

            match outcome {
                Ok(answer) if !answer.trim().is_empty() => {
                    tracing::debug!(
                        provider = %name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "provider answered"
                    );
                    return Ok(answer.trim().to_string());
                }
                Ok(_) => {
                    tracing::warn!(provider = %name, "provider returned an empty answer; trying next");
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "provider failed; trying next");
                }
            }
            attempted.push(name);
        }

        Err(InferenceError::AllProvidersFailed { attempted })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::config::AnswerFormat;
    use crate::inference::providers::CompletionProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    enum Behavior {
        Answer(&'static str),
        Fail,
        Blank,
        Hang,
    }

    struct MockProvider {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
        last_system: Mutex<Option<String>>,
        last_user: Mutex<Option<String>>,
    }

    impl MockProvider {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(None),
                last_user: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CompletionProvider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn query(&self, system: &str, user: &str) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_system.lock().unwrap() = Some(system.to_string());
            *self.last_user.lock().unwrap() = Some(user.to_string());
            match self.behavior {
                Behavior::Answer(text) => Ok(text.to_string()),
                Behavior::Fail => Err(InferenceError::HttpError {
                    status: 503,
                    body: "unavailable".into(),
                }),
                Behavior::Blank => Ok("   ".to_string()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    struct FixedMemory(&'static str);

    impl MemorySource for FixedMemory {
        fn recall(&self, _agent_id: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn client(providers: Vec<Arc<MockProvider>>) -> ClassificationClient {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn CompletionProvider>)
            .collect();
        ClassificationClient::new(
            ProviderRegistry::new(providers),
            ClassificationSettings::default(),
            Some("Classify the activity. History: $MEMORY".into()),
        )
    }

    const SCREEN: &str = "Quarterly planning doc: goals, owners, deadlines";

    #[tokio::test]
    async fn test_short_input_skips_providers() {
        let primary = MockProvider::new("primary", Behavior::Answer("label: x"));
        let client = client(vec![primary.clone()]);

        for input in ["", "   ", "too short"] {
            let result = client.classify(input, "agent").await;
            assert_eq!(result.label, "label: Insufficient screen content");
            assert_eq!(result.confidence, 0.2);
            assert!(result.raw_provider_text.is_none());
        }
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_system_prompt() {
        let primary = MockProvider::new("primary", Behavior::Answer("label: x"));
        let client = ClassificationClient::new(
            ProviderRegistry::new(vec![primary.clone() as Arc<dyn CompletionProvider>]),
            ClassificationSettings::default(),
            None,
        );

        let result = client.classify(SCREEN, "agent").await;
        assert_eq!(result.label, "label: Configuration error");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_answer_skips_fallback() {
        let primary = MockProvider::new("primary", Behavior::Answer("label: writing notes"));
        let fallback = MockProvider::new("fallback", Behavior::Answer("label: other"));
        let client = client(vec![primary.clone(), fallback.clone()]);

        let result = client.classify(SCREEN, "agent").await;
        assert_eq!(result.label, "label: writing notes");
        assert_eq!(result.raw_provider_text.as_deref(), Some("label: writing notes"));
        assert!((0.1..=0.95).contains(&result.confidence));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_advance_in_order() {
        let failing = MockProvider::new("failing", Behavior::Fail);
        let blank = MockProvider::new("blank", Behavior::Blank);
        let hanging = MockProvider::new("hanging", Behavior::Hang);
        let last = MockProvider::new("last", Behavior::Answer("reviewing a pull request"));
        let client = client(vec![failing.clone(), blank.clone(), hanging.clone(), last.clone()]);

        let result = client.classify(SCREEN, "agent").await;
        assert_eq!(result.label, "label: reviewing a pull request");
        assert_eq!(result.raw_provider_text.as_deref(), Some("reviewing a pull request"));
        for provider in [&failing, &blank, &hanging, &last] {
            assert_eq!(provider.calls(), 1, "{} called wrong number of times", provider.name);
        }
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let a = MockProvider::new("a", Behavior::Fail);
        let b = MockProvider::new("b", Behavior::Blank);
        let client = client(vec![a, b]);

        let result = client.classify(SCREEN, "agent").await;
        assert_eq!(result.label, "label: LLM analysis failed");
        assert_eq!(result.confidence, 0.0);
        assert!(result.raw_provider_text.is_none());
    }

    #[tokio::test]
    async fn test_no_providers_configured() {
        let client = client(vec![]);
        let result = client.classify(SCREEN, "agent").await;
        assert_eq!(result.label, "label: LLM analysis failed");
        assert!(client.complete("", "anything").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_injected_and_input_wrapped() {
        let primary = MockProvider::new("primary", Behavior::Answer("label: coding"));
        let client = client(vec![primary.clone()]).with_memory(Arc::new(FixedMemory(
            "[09:15 AM] label: reading email",
        )));

        client.classify(SCREEN, "agent").await;
        let system = primary.last_system.lock().unwrap().clone().unwrap();
        assert_eq!(system, "Classify the activity. History: [09:15 AM] label: reading email");
        let user = primary.last_user.lock().unwrap().clone().unwrap();
        assert_eq!(user, format!("<Screen Content>\n{SCREEN}\n</Screen Content>"));
    }

    #[tokio::test]
    async fn test_empty_memory_placeholder() {
        let client = client(vec![]);
        assert_eq!(
            client.inject_memory("Before: $MEMORY", "agent"),
            "Before: No previous activities recorded."
        );
        assert_eq!(client.inject_memory("no placeholder", "agent"), "no placeholder");
    }

    #[tokio::test]
    async fn test_json_activity_format() {
        let primary = MockProvider::new(
            "primary",
            Behavior::Answer(r#"{"activity": "Deep work", "focus_score": 9}"#),
        );
        let providers = vec![primary as Arc<dyn CompletionProvider>];
        let settings = ClassificationSettings {
            answer_format: AnswerFormat::JsonActivity,
            label_prefix: "ACTIVITY:".into(),
            ..ClassificationSettings::default()
        };
        let client = ClassificationClient::new(
            ProviderRegistry::new(providers),
            settings,
            Some("prompt".into()),
        );

        let result = client.classify(SCREEN, "focus").await;
        assert_eq!(result.label, "ACTIVITY: Deep work");
        assert_eq!(
            result.raw_provider_text.as_deref(),
            Some(r#"{"activity": "Deep work", "focus_score": 9}"#)
        );
    }

    #[tokio::test]
    async fn test_complete_uses_chain_without_system_prompt() {
        let failing = MockProvider::new("failing", Behavior::Fail);
        let ok = MockProvider::new("ok", Behavior::Answer(r#"{"tool": "extract_text"}"#));
        let client = client(vec![failing.clone(), ok.clone()]);

        let answer = client.complete("", "choose").await;
        assert_eq!(answer.as_deref(), Some(r#"{"tool": "extract_text"}"#));
        assert_eq!(ok.last_system.lock().unwrap().as_deref(), Some(""));
    }
}
