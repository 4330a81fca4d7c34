//! Rolling Logger
//!
//! Installs a `tracing` subscriber that writes to stderr and to a size-rotated
//! log file, and keeps the most recent lines in a circular buffer so they can
//! be shown or attached to bug reports without reading the file back.
//!
//! `log` records are bridged into the same subscriber.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;

/// Rotation and buffer limits
#[derive(Debug, Clone, Copy)]
pub struct LoggerOptions {
    /// Rotate once the active file reaches this many bytes
    pub max_file_bytes: u64,
    /// Rotated files kept next to the active one (`app.log.1` .. `app.log.N`)
    pub max_rotated_files: usize,
    /// Lines kept in memory
    pub buffer_lines: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_rotated_files: 3,
            buffer_lines: 500,
        }
    }
}

struct RollingState {
    path: PathBuf,
    file: File,
    written: u64,
    recent: VecDeque<String>,
    partial: String,
    options: LoggerOptions,
}

impl RollingState {
    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.options.max_rotated_files == 0 {
            self.file = File::create(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.rotated_path(self.options.max_rotated_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.options.max_rotated_files).rev() {
            let from = self.rotated_path(index);
            if from.exists() {
                fs::rename(&from, self.rotated_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.rotated_path(1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }

    fn remember(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            if self.recent.len() == self.options.buffer_lines {
                self.recent.pop_front();
            }
            if self.options.buffer_lines > 0 {
                self.recent.push_back(line.trim_end().to_string());
            }
        }
    }
}

/// A cloneable handle to the rolling log file
#[derive(Clone)]
pub struct RollingFileWriter {
    state: Arc<Mutex<RollingState>>,
}

impl RollingFileWriter {
    /// Open (or create) `<dir>/<app_name>.log` for appending
    pub fn new(dir: &Path, app_name: &str, options: LoggerOptions) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.log", app_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            state: Arc::new(Mutex::new(RollingState {
                path,
                file,
                written,
                recent: VecDeque::with_capacity(options.buffer_lines),
                partial: String::new(),
                options,
            })),
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> PathBuf {
        match self.state.lock() {
            Ok(state) => state.path.clone(),
            Err(poisoned) => poisoned.into_inner().path.clone(),
        }
    }

    /// Most recent complete lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;

        state.file.write_all(buf)?;
        state.written += buf.len() as u64;
        state.remember(buf);

        if state.written >= state.options.max_file_bytes {
            state.rotate()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingFileWriter {
    type Writer = RollingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

static LOGGER: OnceLock<RollingFileWriter> = OnceLock::new();

/// Initialize the global logger with default options
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), String> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize the global logger
///
/// Fails if a global subscriber is already installed.
pub fn init_logger_with(log_dir: PathBuf, app_name: &str, options: LoggerOptions) -> Result<(), String> {
    let writer = RollingFileWriter::new(&log_dir, app_name, options)
        .map_err(|e| format!("Failed to open log file in {}: {}", log_dir.display(), e))?;

    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(true)
        .with_max_level(tracing::Level::INFO)
        .with_writer(io::stderr.and(writer.clone()));

    #[cfg(not(target_os = "android"))]
    {
        use tracing_subscriber::util::SubscriberInitExt;
        subscriber
            .finish()
            .try_init()
            .map_err(|e| format!("Failed to install subscriber: {}", e))?;
    }

    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag(app_name.to_string()),
        );
        tracing::subscriber::set_global_default(subscriber.finish())
            .map_err(|e| format!("Failed to install subscriber: {}", e))?;
    }

    LOGGER
        .set(writer)
        .map_err(|_| "Logger already initialized".to_string())?;

    tracing::info!(
        app = app_name,
        started_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        "logger initialized"
    );
    Ok(())
}

/// Most recent lines written through the global logger
pub fn recent_lines() -> Vec<String> {
    LOGGER.get().map(|w| w.recent_lines()).unwrap_or_default()
}

fn ensure_initialized() -> Result<(), String> {
    if LOGGER.get().is_some() {
        Ok(())
    } else {
        Err("Logger not initialized".to_string())
    }
}

pub fn info(msg: &str) -> Result<(), String> {
    tracing::info!("{}", msg);
    ensure_initialized()
}

pub fn warn(msg: &str) -> Result<(), String> {
    tracing::warn!("{}", msg);
    ensure_initialized()
}

pub fn error(msg: &str) -> Result<(), String> {
    tracing::error!("{}", msg);
    ensure_initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_options() -> LoggerOptions {
        LoggerOptions {
            max_file_bytes: 64,
            max_rotated_files: 2,
            buffer_lines: 3,
        }
    }

    #[test]
    fn test_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingFileWriter::new(dir.path(), "app", LoggerOptions::default()).unwrap();

        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_ring_buffer_keeps_latest_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingFileWriter::new(dir.path(), "app", small_options()).unwrap();

        for i in 0..5 {
            writer.write_all(format!("line {}\n", i).as_bytes()).unwrap();
        }

        assert_eq!(writer.recent_lines(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_partial_lines_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingFileWriter::new(dir.path(), "app", LoggerOptions::default()).unwrap();

        writer.write_all(b"first ").unwrap();
        assert!(writer.recent_lines().is_empty());
        writer.write_all(b"half\nsecond\n").unwrap();

        assert_eq!(writer.recent_lines(), vec!["first half", "second"]);
    }

    #[test]
    fn test_rotation_keeps_bounded_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RollingFileWriter::new(dir.path(), "app", small_options()).unwrap();

        let line = [b'x'; 40];
        for _ in 0..8 {
            writer.write_all(&line).unwrap();
            writer.write_all(b"\n").unwrap();
        }

        assert!(dir.path().join("app.log").exists());
        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());
    }

    #[test]
    fn test_helpers_report_uninitialized() {
        // The global logger is never installed in unit tests
        assert!(info("not installed").is_err());
    }
}
