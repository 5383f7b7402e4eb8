//! Inference: classification over interchangeable LLM providers.
//!
//! This module handles all communication with the remote model endpoints:
//! - Provider trait with OpenAI and Anthropic backends
//! - Ordered fallback chain with per-attempt timeouts
//! - Confidence heuristic and label normalization
//! - Provider configuration loading and env interpolation
//!
//! Switching from one backend to another is a config change, not a code
//! change.

pub mod client;
pub mod config;
pub mod errors;
pub mod providers;
pub mod scoring;
pub mod types;

// Re-exports for convenience
pub use client::{ClassificationClient, MemorySource};
pub use config::{AnswerFormat, ClassificationSettings, LlmConfig, ProviderKind};
pub use errors::InferenceError;
pub use providers::{AnthropicProvider, CompletionProvider, OpenAiProvider, ProviderRegistry};
pub use types::ClassificationResult;
