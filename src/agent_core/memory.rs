//! Per-agent memory files.
//!
//! Memory is a plain text file per agent, one entry per line, injected into
//! the classification prompt at `$MEMORY`.
//!
//! Runs of one agent may finish concurrently, so every read-modify-write of a
//! store file holds that file's lock, and writes land through a rename so
//! readers never see a partial file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::errors::AgentError;
use crate::inference::client::{render_memory, MemorySource};

type FileLocks = Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>;

/// Reads and writes `<agent_id>_memory.txt` files under one directory.
///
/// Clones share their file locks.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dir: PathBuf,
    locks: FileLocks,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: FileLocks::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn memory_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{}_memory.txt", file_safe(agent_id)))
    }

    pub fn metrics_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{}_metrics.json", file_safe(agent_id)))
    }

    /// The agent's memory, trimmed. Missing or unreadable files read as empty.
    pub fn read(&self, agent_id: &str) -> String {
        let path = self.memory_path(agent_id);
        match std::fs::read_to_string(&path) {
            Ok(content) => content.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read memory");
                String::new()
            }
        }
    }

    /// Replace the agent's memory.
    pub async fn write(&self, agent_id: &str, content: &str) -> Result<(), AgentError> {
        let content = content.to_string();
        self.update_file(&self.memory_path(agent_id), move |_| Ok(content))
            .await?;
        tracing::debug!(agent_id, "memory updated");
        Ok(())
    }

    /// Append one line, keeping only the newest `max_entries` lines.
    pub async fn append_entry(
        &self,
        agent_id: &str,
        line: &str,
        max_entries: usize,
    ) -> Result<(), AgentError> {
        let line = line.trim().to_string();
        self.update_file(&self.memory_path(agent_id), move |existing| {
            let mut lines: Vec<&str> = existing.lines().filter(|l| !l.trim().is_empty()).collect();
            lines.push(&line);
            let skip = lines.len().saturating_sub(max_entries);
            Ok(lines[skip..].join("\n"))
        })
        .await
    }

    /// Replace `$MEMORY` in `prompt` with this agent's memory.
    pub fn inject(&self, prompt: &str, agent_id: &str) -> String {
        render_memory(prompt, Some(&self.read(agent_id)))
    }

    /// Rewrite `path` from its current content while holding its lock.
    ///
    /// A missing file reads as empty.
    pub(crate) async fn update_file<F>(&self, path: &Path, edit: F) -> Result<(), AgentError>
    where
        F: FnOnce(&str) -> Result<String, AgentError>,
    {
        let lock = self.file_lock(path);
        let _guard = lock.lock().await;

        let existing = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(storage_error(path, e)),
        };
        let updated = edit(&existing)?;
        write_file(path, &updated).await
    }

    fn file_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }
}

impl MemorySource for MemoryStore {
    fn recall(&self, agent_id: &str) -> Option<String> {
        let memory = self.read(agent_id);
        (!memory.is_empty()).then_some(memory)
    }
}

/// Write `content` next to `path` and rename it into place.
async fn write_file(path: &Path, content: &str) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_error(path, e))?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| storage_error(path, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(storage_error(path, e));
    }
    Ok(())
}

fn storage_error(path: &Path, e: std::io::Error) -> AgentError {
    AgentError::StorageError {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Agent ids come from config files; keep them inside the store directory.
fn file_safe(agent_id: &str) -> String {
    agent_id
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect()
}
