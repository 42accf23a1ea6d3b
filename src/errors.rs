//! Typed error definitions for linkmove.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Source path not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Source path is not a directory: {0}")]
    SourceNotDirectory(PathBuf),

    #[error("Source path is already a symbolic link: {0}")]
    SourceIsLink(PathBuf),

    #[error("Source path is not a symbolic link, nothing to restore: {0}")]
    SourceNotLink(PathBuf),

    #[error("Target path is invalid: {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("Target directory is not empty: {0}")]
    TargetNotEmpty(PathBuf),

    #[error("Source and target overlap: '{source_path}' and '{target}' {relation}")]
    PathOverlap {
        source_path: PathBuf,
        target: PathBuf,
        relation: &'static str,
    },

    #[error("Insufficient disk space for destination {dest}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },

    #[error("Failed to start copy tool '{program}': {reason}")]
    ToolLaunch { program: String, reason: String },

    #[error("Copy tool exited with code {code} (failure threshold {threshold})")]
    ToolFailed { code: i32, threshold: i32 },

    #[error("Failed to create symbolic link {link} -> {target}: {reason}")]
    LinkCreation {
        link: PathBuf,
        target: PathBuf,
        reason: String,
    },

    #[error("Link verification failed for {path}: {reason}")]
    LinkVerification { path: PathBuf, reason: String },

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl MigrationError {
    /// Stable machine-readable kind, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            MigrationError::SourceNotFound(_) => "source_not_found",
            MigrationError::SourceNotDirectory(_) => "source_not_directory",
            MigrationError::SourceIsLink(_) => "source_is_link",
            MigrationError::SourceNotLink(_) => "source_not_link",
            MigrationError::InvalidTarget { .. } => "invalid_target",
            MigrationError::TargetNotEmpty(_) => "target_not_empty",
            MigrationError::PathOverlap { .. } => "path_overlap",
            MigrationError::InsufficientSpace { .. } => "insufficient_space",
            MigrationError::ToolLaunch { .. } => "tool_launch",
            MigrationError::ToolFailed { .. } => "tool_failed",
            MigrationError::LinkCreation { .. } => "link_creation",
            MigrationError::LinkVerification { .. } => "link_verification",
            MigrationError::Cancelled => "cancelled",
        }
    }

    /// Validation errors are reported immediately and never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MigrationError::SourceNotFound(_)
                | MigrationError::SourceNotDirectory(_)
                | MigrationError::SourceIsLink(_)
                | MigrationError::SourceNotLink(_)
                | MigrationError::InvalidTarget { .. }
                | MigrationError::TargetNotEmpty(_)
                | MigrationError::PathOverlap { .. }
                | MigrationError::InsufficientSpace { .. }
        )
    }
}

/// True when `err` (or anything in its chain) is a cancellation.
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        matches!(
            e.downcast_ref::<MigrationError>(),
            Some(MigrationError::Cancelled)
        )
    })
}
