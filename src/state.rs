//! Migration state detection.
//!
//! Classifies a source path from on-disk observations only: whether it is a
//! link, which marker files sit in the target, and whether a `.bak_` sibling
//! exists. Nothing is stored; every call re-probes the filesystem. The result
//! is advisory and the orchestrator re-validates before acting.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::config::paths::leaf_name;
use crate::fs_ops::markers::{Marker, marker_exists};
use crate::link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    /// Never migrated (or an interrupted copy that can be resumed).
    Pending,
    /// Source is a link to an existing target.
    Migrated,
    /// Source is a link but its target is missing.
    Inconsistent,
    /// Migrated, but a backup directory is still lying around.
    NeedsCleanup,
    /// Data copied and source backed up, link not yet in place.
    NeedsCompletion,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationState::Pending => "pending",
            MigrationState::Migrated => "migrated",
            MigrationState::Inconsistent => "inconsistent",
            MigrationState::NeedsCleanup => "needs-cleanup",
            MigrationState::NeedsCompletion => "needs-completion",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub state: MigrationState,
    /// A previous copy into the target was interrupted and can be resumed.
    pub resumable: bool,
    pub backup_path: Option<PathBuf>,
    /// Destination of the link when the source is one.
    pub link_target: Option<PathBuf>,
    /// Target used for the checks (given, or read from the link).
    pub target: Option<PathBuf>,
    pub message: String,
}

impl StateReport {
    fn new(state: MigrationState, target: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            state,
            resumable: false,
            backup_path: None,
            link_target: None,
            target,
            message: message.into(),
        }
    }
}

/// Newest sibling directory named `<source name>.bak_*`, by modification time.
pub fn find_backup_path(source: &Path) -> Option<PathBuf> {
    let parent = source.parent()?;
    let prefix = format!("{}.bak_", leaf_name(source)?);
    let entries = fs::read_dir(parent).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| {
            let modified = e
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, e.path())
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}

/// Classify `source` (and optionally its `target`).
///
/// For a link source without an explicit target, the link's own destination
/// is used. Link precedence: Inconsistent, then NeedsCleanup, then Migrated.
pub fn detect(source: &Path, target: Option<&Path>) -> StateReport {
    let report = if link::is_symbolic_link(source) {
        detect_linked(source, target)
    } else if source.is_dir() {
        detect_directory(source, target)
    } else {
        detect_absent(source, target)
    };
    debug!(
        source = %source.display(),
        state = %report.state,
        resumable = report.resumable,
        "state detected"
    );
    report
}

fn detect_linked(source: &Path, target: Option<&Path>) -> StateReport {
    let link_target = link::link_target(source).ok();
    let target = target.map(Path::to_path_buf).or_else(|| link_target.clone());

    let mut report = StateReport::new(MigrationState::Migrated, target.clone(), "Migrated");
    report.link_target = link_target;

    let target_missing = match &target {
        Some(t) => !t.is_dir(),
        None => !source.is_dir(),
    };
    if target_missing {
        report.state = MigrationState::Inconsistent;
        report.message = "Link exists but its target is missing".into();
        return report;
    }
    if let Some(backup) = find_backup_path(source) {
        report.state = MigrationState::NeedsCleanup;
        report.message = "Migrated, but a backup is waiting to be cleaned up".into();
        report.backup_path = Some(backup);
    }
    report
}

fn detect_directory(source: &Path, target: Option<&Path>) -> StateReport {
    let target_buf = target.map(Path::to_path_buf);
    let mut report = StateReport::new(MigrationState::Pending, target_buf, "Not migrated");
    let Some(target) = target.filter(|t| t.is_dir()) else {
        return report;
    };

    let has_lock = marker_exists(target, Marker::MigrateLock);
    let has_done = marker_exists(target, Marker::MigrateDone);
    let backup = find_backup_path(source);

    if has_lock && !has_done {
        report.resumable = true;
        report.message = "Copy was interrupted and can be resumed".into();
    }
    if let Some(backup) = backup {
        report.state = MigrationState::NeedsCompletion;
        report.backup_path = Some(backup);
        report.message = if has_done {
            "Copy finished, link not yet created".into()
        } else {
            "Source backed up and data copied, link not yet created".into()
        };
    }
    report
}

fn detect_absent(source: &Path, target: Option<&Path>) -> StateReport {
    let target_buf = target.map(Path::to_path_buf);
    let backup = find_backup_path(source);
    match (backup, target.filter(|t| t.is_dir())) {
        (Some(backup), Some(_)) => {
            let mut report = StateReport::new(
                MigrationState::NeedsCompletion,
                target_buf,
                "Source moved to backup, link not yet created",
            );
            report.backup_path = Some(backup);
            report
        }
        _ => StateReport::new(MigrationState::Pending, target_buf, "Source does not exist"),
    }
}
