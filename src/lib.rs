pub mod agent_core;
pub mod inference;
pub mod mcp_client;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Return the platform-standard data directory for Vygil.
///
/// - macOS: `~/Library/Application Support/vygil/`
/// - Windows: `{FOLDERID_RoamingAppData}\vygil\`
/// - Linux: `$XDG_DATA_HOME/vygil/` (fallback `~/.local/share/vygil`)
///
/// Falls back to `~/.vygil/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("vygil");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vygil")
}

/// Default directory for agent memory and metrics files.
pub fn default_memory_dir() -> PathBuf {
    data_dir().join("memory")
}

/// Rotated log files kept next to `agent.log`.
pub const KEPT_LOGS: u32 = 3;

/// Initialize the tracing subscriber, writing structured logs to the data directory.
///
/// Earlier logs are rotated first, keeping [`KEPT_LOGS`] generations. Returns
/// the path of the fresh `agent.log`.
pub fn init_tracing() -> std::io::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("agent.log");
    rotate_log_file(&log_path, KEPT_LOGS);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vygil_agent=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== Vygil agent starting ==="
    );

    Ok(log_path)
}

/// Push each existing log one generation back (`agent.log` becomes
/// `agent.log.1`, and so on), dropping anything past `keep`.
fn rotate_log_file(base: &Path, keep: u32) {
    let _ = std::fs::remove_file(log_generation(base, keep));
    for n in (1..=keep).rev() {
        let newer = log_generation(base, n - 1);
        if newer.exists() {
            let _ = std::fs::rename(&newer, log_generation(base, n));
        }
    }
}

/// `base` itself for generation 0, `base.<n>` otherwise.
fn log_generation(base: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return base.to_path_buf();
    }
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Log sink shared by every subscriber writer; each write reaches the file
/// before returning.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<Mutex<File>>,
}

impl FlushingWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        op(&mut *file)
    }
}

impl Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| {
            let written = file.write(buf)?;
            file.flush()?;
            Ok(written)
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
