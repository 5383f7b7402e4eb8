//! Agent Core: declarative pipeline and agent plumbing for Vygil.
//!
//! Submodules:
//! - `config`: Agent YAML definitions
//! - `context`: Sensor inputs and single-run pipeline state
//! - `pipeline`: select-tool / execute-tools / analyze-results executor
//! - `registry`: Agent discovery and the current-agent switch
//! - `memory`: Per-agent memory files and `$MEMORY` injection
//! - `post_actions`: Closed set of actions run after each pass
//! - `metrics`: Run counters
//! - `errors`: Agent-level error types

pub mod config;
pub mod context;
pub mod errors;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod post_actions;
pub mod registry;

// Re-exports for convenience
pub use config::AgentConfig;
pub use context::{PipelineContext, SensorInputs};
pub use errors::AgentError;
pub use memory::MemoryStore;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{FocusSummary, PipelineExecutor, PipelineStep};
pub use post_actions::PostAction;
pub use registry::{AgentEntry, AgentRegistry};
