use crate::error::{PipelineError, Result};
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record as LogRecord};
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const CSV_URL: &str =
    "https://tyroo-engineering-assesments.s3.us-west-2.amazonaws.com/Tyroo-dummy-data.csv.gz";
pub const LOCAL_FILE: &str = "Tyroo-dummy-data.csv.gz";
pub const CHUNK_SIZE: usize = 100_000;
pub const TABLE_NAME: &str = "tyroo_data";
pub const DATABASE_URL: &str = "sqlite://tyroo_db.sqlite";
pub const LOG_FILE: &str = "logs/process.log";

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Appends `timestamp - LEVEL - message` lines to a log file.
pub struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    /// Opens `path` for appending, creating its parent directory if needed.
    pub fn open(path: &Path, level: LevelFilter) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            level,
            file: Mutex::new(file),
        })
    }

    /// Installs this logger as the global `log` backend.
    pub fn install(self) -> Result<()> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &LogRecord) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} - {} - {}",
            Local::now().format(LOG_TIMESTAMP_FORMAT),
            record.level(),
            record.args()
        );
        // A poisoned lock still guards a usable file handle.
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(file, "{line}");
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

/// Source, destination and sizing for a single pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub url: String,
    pub local_path: PathBuf,
    pub chunk_size: usize,
    pub table_name: String,
    pub database_url: String,
    pub log_file: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            url: CSV_URL.to_string(),
            local_path: PathBuf::from(LOCAL_FILE),
            chunk_size: CHUNK_SIZE,
            table_name: TABLE_NAME.to_string(),
            database_url: DATABASE_URL.to_string(),
            log_file: PathBuf::from(LOG_FILE),
        }
    }
}

impl PipelineConfig {
    /// Rejects configurations the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if:
    /// - the URL is malformed or not http(s)
    /// - the chunk size is zero
    /// - the table name is not a plain SQL identifier
    /// - the local path is empty
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.url)
            .map_err(|e| PipelineError::Config(format!("invalid URL {}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::Config(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        if self.chunk_size == 0 {
            return Err(PipelineError::Config(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        if !identifier.is_match(&self.table_name) {
            return Err(PipelineError::Config(format!(
                "invalid table name: {:?}",
                self.table_name
            )));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("local path is empty".to_string()));
        }
        Ok(())
    }
}

/// Row and chunk counts for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub chunks: usize,
    pub rows_read: usize,
    pub rows_loaded: usize,
}
