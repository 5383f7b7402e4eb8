//! Run counters shared across pipeline runs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters for pipeline outcomes.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    runs: AtomicU64,
    tool_calls: AtomicU64,
    tool_faults: AtomicU64,
    classification_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub tool_calls: u64,
    pub tool_faults: u64,
    pub classification_failures: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_fault(&self) {
        self.tool_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification_failure(&self) {
        self.classification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tool_faults(&self) -> u64 {
        self.tool_faults.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_faults: self.tool_faults.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_run();
        metrics.record_tool_call();
        metrics.record_tool_call();
        metrics.record_tool_fault();

        let snap = metrics.snapshot();
        assert_eq!(snap.runs, 1);
        assert_eq!(snap.tool_calls, 2);
        assert_eq!(snap.tool_faults, 1);
        assert_eq!(snap.classification_failures, 0);
        assert_eq!(metrics.tool_faults(), 1);
    }
}
