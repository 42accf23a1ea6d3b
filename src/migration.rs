//! Migration orchestrator: the six-phase run in both directions plus rollback.
//!
//! Migrate: validate, scan source, mirror source into target, move source aside
//! to `<name>.bak_<ts>` and put a directory link in its place, verify, clean up.
//! Restore: validate the link, scan the data directory, mirror it into a
//! `.restore_temp_` sibling, swap the link for the restored tree, verify,
//! clean up.
//!
//! Any error aborts the remaining phases and runs a best-effort rollback. The
//! outcome is always a `MigrationResult`; `execute` never returns `Err`.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::MigrationConfig;
use crate::config::paths::leaf_name;
use crate::copy::{CopyOperation, MirrorTool};
use crate::errors::{MigrationError, is_cancellation};
use crate::fs_ops::markers::{self, Marker};
use crate::fs_ops::{FileStats, check_disk_space, directory_size, format_bytes, io_error_with_help, scan_directory};
use crate::link;
use crate::progress::{MigrationMode, MigrationProgress, Phase, Reporter};
use crate::shutdown::CancelToken;

/// Terminal outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    /// Triggering error, with context chain.
    pub error: Option<String>,
    /// Stable kind of the triggering error when it is a `MigrationError`.
    pub error_kind: Option<&'static str>,
    pub source: PathBuf,
    /// Effective target (after any leaf-name append).
    pub target: PathBuf,
    pub stats: FileStats,
    pub rolled_back: bool,
    pub rollback_error: Option<String>,
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct MigrationService {
    config: MigrationConfig,
    mode: MigrationMode,
    keep_backup: bool,
    keep_target: bool,
    tool: MirrorTool,
    stats: FileStats,
    // Run-private recovery state.
    backup_path: Option<PathBuf>,
    restore_temp: Option<PathBuf>,
    link_removed: bool,
}

fn ensure_not_cancelled(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MigrationError::Cancelled.into());
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> Result<PathBuf> {
    let leaf = leaf_name(path).ok_or_else(|| MigrationError::SourceNotFound(path.to_path_buf()))?;
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(format!("{leaf}{suffix}")))
}

impl MigrationService {
    pub fn new(config: MigrationConfig, mode: MigrationMode) -> Self {
        Self {
            config,
            mode,
            keep_backup: false,
            keep_target: false,
            tool: MirrorTool::platform_default(),
            stats: FileStats::default(),
            backup_path: None,
            restore_temp: None,
            link_removed: false,
        }
    }

    /// Restore only: leave the data directory in place afterwards.
    pub fn keep_target_on_restore(mut self, keep: bool) -> Self {
        self.keep_target = keep;
        self
    }

    /// Migrate only: keep the `.bak_` directory after success.
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    pub fn copy_tool(mut self, tool: MirrorTool) -> Self {
        self.tool = tool;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run all six phases. Rolls back on failure or cancellation.
    pub fn execute(&mut self, reporter: &Reporter, cancel: &CancelToken) -> MigrationResult {
        info!(
            mode = %self.mode,
            source = %self.config.source.display(),
            target = %self.config.target.display(),
            "run starting"
        );
        self.stats = FileStats::default();
        self.backup_path = None;
        self.restore_temp = None;
        self.link_removed = false;

        let outcome = match self.mode {
            MigrationMode::Migrate => self.run_migrate(reporter, cancel),
            MigrationMode::Restore => self.run_restore(reporter, cancel),
        };

        let mut result = MigrationResult {
            success: outcome.is_ok(),
            error: None,
            error_kind: None,
            source: self.config.source.clone(),
            target: self.config.target.clone(),
            stats: self.stats,
            rolled_back: false,
            rollback_error: None,
            cancelled: false,
        };

        match outcome {
            Ok(()) => {
                let done = match self.mode {
                    MigrationMode::Migrate => "Migration complete",
                    MigrationMode::Restore => "Restore complete",
                };
                reporter.progress(&MigrationProgress {
                    copied_bytes: self.stats.total_bytes,
                    total_bytes: self.stats.total_bytes,
                    message: done.to_string(),
                    ..MigrationProgress::phase_start(Phase::Done, self.mode)
                });
                reporter.log(done);
            }
            Err(err) => {
                result.cancelled = is_cancellation(&err);
                result.error_kind = err.downcast_ref::<MigrationError>().map(MigrationError::code);
                result.error = Some(format!("{err:#}"));
                let validation = err
                    .downcast_ref::<MigrationError>()
                    .is_some_and(MigrationError::is_validation);
                if result.cancelled {
                    reporter.warn("Operation cancelled; rolling back");
                } else if validation {
                    reporter.warn(format!("Validation failed: {err:#}"));
                } else {
                    error!(kind = result.error_kind.unwrap_or("io"), "{err:#}");
                    reporter.warn(format!("Error: {err:#}"));
                }

                let rollback = match self.mode {
                    MigrationMode::Migrate => self.rollback_migrate(reporter),
                    MigrationMode::Restore => self.rollback_restore(reporter),
                };
                match rollback {
                    Ok(()) => result.rolled_back = true,
                    Err(e) => {
                        reporter.warn(format!("Rollback failed: {e:#}"));
                        result.rollback_error = Some(format!("{e:#}"));
                    }
                }
            }
        }
        result.target = self.config.target.clone();
        result
    }

    fn begin_phase(&self, phase: Phase, reporter: &Reporter) {
        reporter.log(format!("[{}/6] {}", phase.number(), phase.description(self.mode)));
        // Copy reports its own snapshots.
        if phase != Phase::Copy {
            reporter.progress(&MigrationProgress::phase_start(phase, self.mode));
        }
    }

    fn copy(&self, from: &Path, to: &Path, reporter: &Reporter, cancel: &CancelToken) -> Result<u64> {
        CopyOperation {
            source: from,
            target: to,
            total_bytes: self.stats.total_bytes,
            threads: self.config.copy_threads,
            sample_interval: self.config.sample_interval,
            tool: &self.tool,
            mode: self.mode,
        }
        .execute(reporter, cancel)
    }

    fn scan(&mut self, dir: &Path, reporter: &Reporter, cancel: &CancelToken) -> Result<()> {
        let stats = scan_directory(dir, self.config.large_file_threshold_bytes(), reporter, cancel)?;
        reporter.log(format!(
            "Found {} files, {} total, {} large",
            stats.total_files,
            format_bytes(stats.total_bytes),
            stats.large_files
        ));
        self.stats = stats;
        Ok(())
    }

    // ---------------------------------------------------------------- migrate

    fn run_migrate(&mut self, reporter: &Reporter, cancel: &CancelToken) -> Result<()> {
        self.begin_phase(Phase::Validate, reporter);
        self.validate_migrate(reporter)?;

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Scan, reporter);
        let source = self.config.source.clone();
        let target = self.config.target.clone();
        self.scan(&source, reporter, cancel)?;
        let space = check_disk_space(&target, self.stats.total_bytes)?;
        reporter.log(format!(
            "Free space at {}: {}",
            space.measured.display(),
            format_bytes(space.available)
        ));
        if !space.sufficient {
            return Err(MigrationError::InsufficientSpace {
                required: space.required,
                available: space.available,
                dest: target,
            }
            .into());
        }

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Copy, reporter);
        self.copy(&source, &target, reporter, cancel)?;
        markers::write_migrate_done(&target);

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Link, reporter);
        let backup = sibling(&source, &format!(".bak_{}", Local::now().format("%Y%m%d_%H%M%S")))?;
        fs::rename(&source, &backup).map_err(io_error_with_help("move source aside", &source))?;
        self.backup_path = Some(backup.clone());
        reporter.log(format!("Source moved to backup: {}", backup.display()));
        let method = link::create_directory_link(&source, &target)?;
        if !source.exists() {
            return Err(MigrationError::LinkVerification {
                path: source,
                reason: "link was created but does not resolve".into(),
            }
            .into());
        }
        reporter.log(format!(
            "Link created ({method:?}): {} -> {}",
            source.display(),
            target.display()
        ));

        self.begin_phase(Phase::Verify, reporter);
        verify_link(&source)?;
        reporter.log("Link verified");

        self.begin_phase(Phase::Cleanup, reporter);
        markers::delete_migrate_markers(&target);
        if self.keep_backup {
            reporter.log(format!("Backup kept at {}", backup.display()));
        } else {
            match fs::remove_dir_all(&backup) {
                Ok(()) => reporter.log("Backup removed"),
                Err(e) => reporter.warn(format!(
                    "Could not remove backup {}: {e}",
                    backup.display()
                )),
            }
        }
        Ok(())
    }

    fn validate_migrate(&mut self, reporter: &Reporter) -> Result<()> {
        let source = self.config.source.clone();
        // Restore copies markers back; a former target may now be a source.
        if source.is_dir() && !link::is_symbolic_link(&source) {
            markers::delete_migrate_markers(&source);
            markers::delete_restore_markers(&source);
        }

        if link::is_symbolic_link(&source) {
            return Err(MigrationError::SourceIsLink(source).into());
        }
        if !source.exists() {
            return Err(MigrationError::SourceNotFound(source).into());
        }
        if !source.is_dir() {
            return Err(MigrationError::SourceNotDirectory(source).into());
        }

        let mut target = self.config.target.clone();
        let resuming = target.is_dir() && markers::marker_exists(&target, Marker::MigrateLock);
        if !resuming && target.is_dir() && markers::has_user_content(&target) {
            let source_leaf = leaf_name(&source).unwrap_or_default();
            let target_leaf = leaf_name(&target).unwrap_or_default();
            if !source_leaf.is_empty() && !same_leaf(&source_leaf, &target_leaf) {
                let adjusted = target.join(&source_leaf);
                reporter.warn(format!(
                    "Target is not empty; using {} instead",
                    adjusted.display()
                ));
                target = adjusted;
            }
        }

        if link::is_symbolic_link(&target) {
            return Err(MigrationError::InvalidTarget {
                path: target,
                reason: "target is a symbolic link".into(),
            }
            .into());
        }
        if target.exists() && !target.is_dir() {
            return Err(MigrationError::InvalidTarget {
                path: target,
                reason: "target exists and is not a directory".into(),
            }
            .into());
        }
        let resuming = target.is_dir() && markers::marker_exists(&target, Marker::MigrateLock);
        if resuming {
            reporter.log("Target holds an interrupted copy; resuming into it");
        } else if target.is_dir() && markers::has_user_content(&target) {
            return Err(MigrationError::TargetNotEmpty(target).into());
        }

        self.config.target = target;
        self.config.validate_relation()?;

        if !link::can_create_links() {
            reporter.warn(
                "Symbolic link creation looks unavailable for this user; \
                 phase 4 may fail without elevation or Developer Mode",
            );
        }

        let target = &self.config.target;
        fs::create_dir_all(target).map_err(io_error_with_help("create target directory", target))?;
        markers::write_migrate_lock(target, &self.config.source);
        reporter.log(format!("Source: {}", self.config.source.display()));
        reporter.log(format!("Target: {}", target.display()));
        Ok(())
    }

    fn rollback_migrate(&mut self, reporter: &Reporter) -> Result<()> {
        let Some(backup) = self.backup_path.take() else {
            // Source untouched; a lock left in the target marks the copy as resumable.
            return Ok(());
        };
        reporter.log("Rolling back...");
        let source = &self.config.source;
        if link::is_symbolic_link(source) {
            link::remove_link(source).context("remove link during rollback")?;
        }
        if backup.is_dir() {
            fs::rename(&backup, source).map_err(io_error_with_help("restore backup", &backup))?;
            reporter.log("Rolled back to the pre-migration state");
        }
        markers::delete_migrate_markers(&self.config.target);
        Ok(())
    }

    // ---------------------------------------------------------------- restore

    fn run_restore(&mut self, reporter: &Reporter, cancel: &CancelToken) -> Result<()> {
        self.begin_phase(Phase::Validate, reporter);
        self.validate_restore(reporter)?;
        let source = self.config.source.clone();
        let data_dir = self.config.target.clone();

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Scan, reporter);
        self.scan(&data_dir, reporter, cancel)?;

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Copy, reporter);
        let temp = match self.restore_temp.clone() {
            Some(temp) => temp,
            None => restore_temp_path(&source)?,
        };
        fs::create_dir_all(&temp).map_err(io_error_with_help("create restore directory", &temp))?;
        self.copy(&data_dir, &temp, reporter, cancel)?;
        markers::write_restore_done(&temp);

        ensure_not_cancelled(cancel)?;
        self.begin_phase(Phase::Link, reporter);
        link::remove_link(&source)?;
        self.link_removed = true;
        fs::rename(&temp, &source).map_err(io_error_with_help("move restored data into place", &temp))?;
        reporter.log(format!("Restored data moved to {}", source.display()));

        self.begin_phase(Phase::Verify, reporter);
        if link::is_symbolic_link(&source) || !source.is_dir() {
            return Err(MigrationError::LinkVerification {
                path: source,
                reason: "restored path is not a real directory".into(),
            }
            .into());
        }
        reporter.log("Restored directory verified");

        self.begin_phase(Phase::Cleanup, reporter);
        markers::delete_restore_markers(&source);
        if self.keep_target {
            markers::delete_restore_markers(&data_dir);
            reporter.log(format!("Data directory kept at {}", data_dir.display()));
        } else {
            match fs::remove_dir_all(&data_dir) {
                Ok(()) => reporter.log(format!("Removed data directory {}", data_dir.display())),
                Err(e) => reporter.warn(format!(
                    "Could not remove data directory {}: {e}",
                    data_dir.display()
                )),
            }
        }
        Ok(())
    }

    fn validate_restore(&mut self, reporter: &Reporter) -> Result<()> {
        let source = self.config.source.clone();
        if !link::is_symbolic_link(&source) {
            if fs::symlink_metadata(&source).is_err() {
                return Err(MigrationError::SourceNotFound(source).into());
            }
            return Err(MigrationError::SourceNotLink(source).into());
        }

        if self.config.target.as_os_str().is_empty() {
            self.config.target = link::link_target(&source)?;
        }
        let target = self.config.target.clone();
        if !target.is_dir() {
            return Err(MigrationError::InvalidTarget {
                path: target,
                reason: "data directory does not exist".into(),
            }
            .into());
        }
        self.config.validate_relation()?;

        let target = &self.config.target;
        let raw = directory_size(target);
        // Measure where the restored copy will live: beside the link, not through it.
        let temp = restore_temp_path(&self.config.source)?;
        let space = check_disk_space(&temp, raw)?;
        reporter.log(format!(
            "Free space at {}: {}",
            space.measured.display(),
            format_bytes(space.available)
        ));
        self.restore_temp = Some(temp);
        if !space.sufficient {
            return Err(MigrationError::InsufficientSpace {
                required: space.required,
                available: space.available,
                dest: self.config.source.clone(),
            }
            .into());
        }

        markers::write_restore_lock(target, &self.config.source);
        reporter.log(format!("Link: {}", self.config.source.display()));
        reporter.log(format!("Data: {}", target.display()));
        Ok(())
    }

    fn rollback_restore(&mut self, reporter: &Reporter) -> Result<()> {
        reporter.log("Rolling back restore...");
        let source = self.config.source.clone();
        let target = self.config.target.clone();
        let mut first_err: Option<anyhow::Error> = None;

        if let (Some(parent), Some(leaf)) = (source.parent(), leaf_name(&source)) {
            let prefix = format!("{leaf}.restore_temp_");
            if let Ok(entries) = fs::read_dir(parent) {
                for entry in entries.filter_map(Result::ok) {
                    if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                        continue;
                    }
                    let path = entry.path();
                    match fs::remove_dir_all(&path) {
                        Ok(()) => reporter.log(format!("Removed temporary directory {}", path.display())),
                        Err(e) => warn!(path = %path.display(), error = %e, "temp cleanup failed"),
                    }
                }
            }
        }

        if self.link_removed && fs::symlink_metadata(&source).is_err() && target.is_dir() {
            match link::create_directory_link(&source, &target) {
                Ok(_) => reporter.log("Link recreated"),
                Err(e) => first_err = Some(e.into()),
            }
        }

        if target.is_dir() {
            markers::delete_restore_markers(&target);
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                reporter.log("Rollback complete");
                Ok(())
            }
        }
    }
}

#[cfg(windows)]
fn same_leaf(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(windows))]
fn same_leaf(a: &str, b: &str) -> bool {
    a == b
}

/// `<source>.restore_temp_<ts>`, beside the link.
fn restore_temp_path(source: &Path) -> Result<PathBuf> {
    sibling(
        source,
        &format!(".restore_temp_{}", Local::now().format("%Y%m%d%H%M%S")),
    )
}

fn verify_link(path: &Path) -> Result<()> {
    if !link::is_symbolic_link(path) {
        return Err(MigrationError::LinkVerification {
            path: path.to_path_buf(),
            reason: "path is not a symbolic link".into(),
        }
        .into());
    }
    if !path.is_dir() {
        return Err(MigrationError::LinkVerification {
            path: path.to_path_buf(),
            reason: "link does not resolve to a directory".into(),
        }
        .into());
    }
    Ok(())
}
