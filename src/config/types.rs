//! Core configuration types.
//! - Config holds application settings with sensible defaults.
//! - MigrationConfig holds the parameters of one migration run.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths;
use super::{DEFAULT_COPY_THREADS, DEFAULT_LARGE_FILE_MB, DEFAULT_SAMPLE_MS};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Application settings loaded from config.xml and overridden by CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Files at or above this size (MB) are counted as large during scan
    pub large_file_threshold_mb: u64,
    /// Worker threads handed to the mirror tool
    pub copy_threads: u32,
    /// Progress polling interval
    pub sample_interval: Duration,
    /// Override for the mirror tool executable
    pub copy_tool: Option<PathBuf>,
    /// Keep the `.bak_` directory after a successful migration
    pub keep_backup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: paths::default_log_path(),
            large_file_threshold_mb: DEFAULT_LARGE_FILE_MB,
            copy_threads: DEFAULT_COPY_THREADS,
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_MS),
            copy_tool: None,
            keep_backup: false,
        }
    }
}

impl Config {
    /// Build the per-run parameters for a source/target pair from these settings.
    pub fn migration_config(
        &self,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> MigrationConfig {
        MigrationConfig {
            source: source.into(),
            target: target.into(),
            large_file_threshold_mb: self.large_file_threshold_mb,
            copy_threads: self.copy_threads,
            sample_interval: self.sample_interval,
        }
    }
}

/// Parameters for a single migration run.
///
/// Owned by the orchestrator for the duration of the run. Only phase 1 may
/// change `target` (appending the source leaf name to a non-empty target).
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub source: PathBuf,
    pub target: PathBuf,
    pub large_file_threshold_mb: u64,
    pub copy_threads: u32,
    pub sample_interval: Duration,
}

impl MigrationConfig {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            large_file_threshold_mb: DEFAULT_LARGE_FILE_MB,
            copy_threads: DEFAULT_COPY_THREADS,
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_MS),
        }
    }

    pub fn large_file_threshold_bytes(&self) -> u64 {
        self.large_file_threshold_mb.saturating_mul(1024 * 1024)
    }
}
