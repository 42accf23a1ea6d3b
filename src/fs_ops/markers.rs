//! Hidden marker files used to detect interrupted runs.
//!
//! Markers are best-effort: write and delete failures are logged at debug
//! level and otherwise ignored. Only their presence is ever read back.

use chrono::Local;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::platform::hide_path;

/// Common prefix of every marker file name.
pub const MARKER_PREFIX: &str = ".linkmove-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Written into the target when a migration starts.
    MigrateLock,
    /// Written into the target once the copy phase succeeded.
    MigrateDone,
    /// Written into the data directory when a restore starts.
    RestoreLock,
    /// Written into the restored copy once the copy phase succeeded.
    RestoreDone,
}

impl Marker {
    pub const ALL: [Marker; 4] = [
        Marker::MigrateLock,
        Marker::MigrateDone,
        Marker::RestoreLock,
        Marker::RestoreDone,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Marker::MigrateLock => ".linkmove-migrate.lock",
            Marker::MigrateDone => ".linkmove-migrate.done",
            Marker::RestoreLock => ".linkmove-restore.lock",
            Marker::RestoreDone => ".linkmove-restore.done",
        }
    }
}

/// True when `name` is one of the marker file names.
pub fn is_marker_name(name: &OsStr) -> bool {
    Marker::ALL.iter().any(|m| name == m.file_name())
}

pub fn marker_exists(dir: &Path, marker: Marker) -> bool {
    dir.join(marker.file_name()).is_file()
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn write_marker(dir: &Path, marker: Marker, content: &str) {
    let path = dir.join(marker.file_name());
    if let Err(e) = fs::write(&path, content) {
        debug!(path = %path.display(), error = %e, "marker write failed");
        return;
    }
    if let Err(e) = hide_path(&path) {
        debug!(path = %path.display(), error = %e, "marker hide failed");
    }
}

fn remove_marker(dir: &Path, marker: Marker) {
    let path = dir.join(marker.file_name());
    match fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "marker removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "marker delete failed"),
    }
}

/// Record the start of a migration into `target`. Clears stale restore markers there first.
pub fn write_migrate_lock(target: &Path, source: &Path) {
    delete_restore_markers(target);
    let content = format!(
        "SourcePath: {}\nStartTime: {}",
        source.display(),
        timestamp()
    );
    write_marker(target, Marker::MigrateLock, &content);
}

pub fn write_migrate_done(target: &Path) {
    write_marker(
        target,
        Marker::MigrateDone,
        &format!("CompletedTime: {}", timestamp()),
    );
}

/// Record the start of a restore into the data directory.
pub fn write_restore_lock(data_dir: &Path, source: &Path) {
    let content = format!(
        "SourcePath: {}\nStartTime: {}",
        source.display(),
        timestamp()
    );
    write_marker(data_dir, Marker::RestoreLock, &content);
}

pub fn write_restore_done(restored: &Path) {
    write_marker(
        restored,
        Marker::RestoreDone,
        &format!("CompletedTime: {}", timestamp()),
    );
}

pub fn delete_migrate_markers(dir: &Path) {
    remove_marker(dir, Marker::MigrateLock);
    remove_marker(dir, Marker::MigrateDone);
}

pub fn delete_restore_markers(dir: &Path) {
    remove_marker(dir, Marker::RestoreLock);
    remove_marker(dir, Marker::RestoreDone);
}

/// True when `dir` holds anything besides marker files.
pub fn has_user_content(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .any(|e| !is_marker_name(&e.file_name())),
        Err(_) => false,
    }
}
