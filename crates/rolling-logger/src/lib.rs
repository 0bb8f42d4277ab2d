//! Rolling Logger
//!
//! File logger that rotates by size and keeps the most recent lines in memory.
//! `log` records are bridged into `tracing`, so libraries using either facade
//! end up in the same file.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

static LOGGER: OnceLock<RollingFile> = OnceLock::new();

/// Errors raised while setting up or using the logger
#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized,
    NotInitialized,
    Subscriber(String),
}

impl std::fmt::Display for LoggerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "Log file error: {}", e),
            LoggerError::AlreadyInitialized => write!(f, "Logger already initialized"),
            LoggerError::NotInitialized => write!(f, "Logger not initialized"),
            LoggerError::Subscriber(msg) => write!(f, "Subscriber error: {}", msg),
        }
    }
}

impl std::error::Error for LoggerError {}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

/// Rotation and buffer limits
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Rotate once the active file would grow past this many bytes
    pub max_file_bytes: u64,
    /// Number of rotated files kept next to the active one
    pub max_backups: usize,
    /// Lines kept in the in-memory ring buffer
    pub buffer_lines: usize,
    /// Default filter when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_backups: 3,
            buffer_lines: 500,
            default_filter: "info".to_string(),
        }
    }
}

struct RollingState {
    dir: PathBuf,
    file_name: String,
    file: File,
    written: u64,
    config: LoggerConfig,
    recent: VecDeque<String>,
}

impl RollingState {
    fn active_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", self.file_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.config.max_backups == 0 {
            fs::remove_file(self.active_path())?;
        } else {
            let oldest = self.backup_path(self.config.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.config.max_backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(self.active_path(), self.backup_path(1))?;
        }

        self.file = open_append(&self.active_path())?;
        self.written = 0;
        Ok(())
    }

    fn remember(&mut self, buf: &[u8]) {
        if self.config.buffer_lines == 0 {
            return;
        }
        let text = String::from_utf8_lossy(buf);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if self.recent.len() == self.config.buffer_lines {
                self.recent.pop_front();
            }
            self.recent.push_back(line.to_string());
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Size-rotated log file plus a ring buffer of recent lines
#[derive(Clone)]
pub struct RollingFile {
    state: Arc<Mutex<RollingState>>,
}

impl RollingFile {
    /// Open (or continue) `<dir>/<app_name>.log`
    pub fn open(dir: impl AsRef<Path>, app_name: &str, config: LoggerConfig) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let file_name = format!("{}.log", app_name);
        let path = dir.join(&file_name);
        let file = open_append(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        let recent = VecDeque::with_capacity(config.buffer_lines);

        Ok(Self {
            state: Arc::new(Mutex::new(RollingState {
                dir,
                file_name,
                file,
                written,
                config,
                recent,
            })),
        })
    }

    /// Path of the file currently written to
    pub fn path(&self) -> PathBuf {
        match self.state.lock() {
            Ok(state) => state.active_path(),
            Err(poisoned) => poisoned.into_inner().active_path(),
        }
    }

    /// Most recent lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log state poisoned"))?;

        if state.written > 0 && state.written + buf.len() as u64 > state.config.max_file_bytes {
            state.rotate()?;
        }

        state.file.write_all(buf)?;
        state.written += buf.len() as u64;
        state.remember(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log state poisoned"))?;
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingFile {
    type Writer = RollingFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initialize the global logger with default limits
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerConfig::default())
}

/// Initialize the global logger
///
/// Installs a file layer (no ANSI) and a stderr layer, both filtered by
/// RUST_LOG or `config.default_filter`. Can only succeed once per process.
pub fn init_logger_with(
    log_dir: PathBuf,
    app_name: &str,
    config: LoggerConfig,
) -> Result<(), LoggerError> {
    if LOGGER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }

    let default_filter = config.default_filter.clone();
    let rolling = RollingFile::open(&log_dir, app_name, config)?;

    let file_layer = fmt::layer()
        .with_writer(rolling.clone())
        .with_ansi(false)
        .with_target(true)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter)),
        );

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter)),
        );

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggerError::Subscriber(e.to_string()))?;

    LOGGER
        .set(rolling)
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    tracing::info!(
        "Logger started at {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    );
    Ok(())
}

/// Log an info line through the global logger
pub fn info(message: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::info!("{}", message);
    Ok(())
}

/// Log an error line through the global logger
pub fn error(message: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::error!("{}", message);
    Ok(())
}

/// Recent lines captured by the global logger (empty before init)
pub fn recent_lines() -> Vec<String> {
    LOGGER
        .get()
        .map(RollingFile::recent_lines)
        .unwrap_or_default()
}
