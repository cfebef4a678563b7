//! Logging backend for the `log` facade.
//!
//! Every record goes to stdout and is appended to
//! `<exe_dir>/logs/gold_card_tracker.log` with a local timestamp.

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub const LOG_FILE_NAME: &str = "gold_card_tracker.log";

/// Writes timestamped lines to the console and a log file.
pub struct FileLogger {
    level: LevelFilter,
    path: PathBuf,
    /// Serializes file appends from the UI and tracker threads
    write_lock: Mutex<()>,
}

impl FileLogger {
    pub fn new(level: LevelFilter, path: PathBuf) -> Self {
        Self {
            level,
            path,
            write_lock: Mutex::new(()),
        }
    }
}

/// Formats one log line, including the trailing newline.
pub fn format_line(record: &Record) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    format!("[{}] {:<5} {}\n", timestamp, record.level(), record.args())
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record);
        print!("{}", line);

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Installs the file logger as the global logger. Call once at startup.
///
/// Filtering is done by the global max level so `set_level` can change it
/// after the config file is read.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let path = crate::paths::get_logs_dir().join(LOG_FILE_NAME);
    log::set_boxed_logger(Box::new(FileLogger::new(LevelFilter::Trace, path)))?;
    set_level(level);
    Ok(())
}

pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
