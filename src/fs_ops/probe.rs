//! Directory statistics: file count, total bytes, large-file count.
//! Enumeration is sequential (walkdir); metadata lookups run on the rayon pool.

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::MigrationError;
use crate::progress::Reporter;
use crate::shutdown::CancelToken;

/// Totals for one directory tree; produced once per run by the scan phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total_bytes: u64,
    pub total_files: u64,
    pub large_files: u64,
}

/// Regular files under `path`, links not followed, unreadable entries skipped.
fn regular_files(path: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

/// Walk `path` and collect totals. A missing directory yields empty stats.
///
/// Emits a log line every 100 files and stops with `Cancelled` when the
/// token fires.
pub fn scan_directory(
    path: &Path,
    large_threshold_bytes: u64,
    reporter: &Reporter,
    cancel: &CancelToken,
) -> Result<FileStats> {
    if !path.is_dir() {
        return Ok(FileStats::default());
    }

    let mut files = Vec::new();
    for file in regular_files(path) {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled.into());
        }
        files.push(file);
        if files.len() % 100 == 0 {
            reporter.log(format!("Scanned {} files...", files.len()));
        }
    }

    let sizes: Vec<u64> = files
        .par_iter()
        .filter_map(|p| std::fs::symlink_metadata(p).ok())
        .map(|m| m.len())
        .collect();

    if cancel.is_cancelled() {
        return Err(MigrationError::Cancelled.into());
    }

    Ok(FileStats {
        total_bytes: sizes.iter().sum(),
        total_files: sizes.len() as u64,
        large_files: sizes.iter().filter(|&&s| s >= large_threshold_bytes).count() as u64,
    })
}

/// Total bytes of regular files under `path`; 0 when it does not exist.
pub fn directory_size(path: &Path) -> u64 {
    if !path.is_dir() {
        return 0;
    }
    let files: Vec<PathBuf> = regular_files(path).collect();
    files
        .par_iter()
        .filter_map(|p| std::fs::symlink_metadata(p).ok())
        .map(|m| m.len())
        .sum()
}

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// 1024-based human size with two decimals, e.g. `1.50 MB`.
pub fn format_bytes(bytes: u64) -> String {
    let mut len = bytes as f64;
    let mut order = 0;
    while len >= 1024.0 && order < UNITS.len() - 1 {
        order += 1;
        len /= 1024.0;
    }
    format!("{:.2} {}", len, UNITS[order])
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn formats_units() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(300 * 1024 * 1024), "300.00 MB");
        assert_eq!(format_speed(2048.0), "2.00 KB/s");
        assert_eq!(format_bytes(u64::MAX), "16384.00 PB");
    }

    #[test]
    fn scan_counts_large_files() {
        let td = tempdir().unwrap();
        fs::create_dir_all(td.path().join("sub")).unwrap();
        fs::write(td.path().join("a.bin"), vec![0u8; 2048]).unwrap();
        fs::write(td.path().join("sub").join("b.bin"), vec![0u8; 10]).unwrap();
        let stats =
            scan_directory(td.path(), 1024, &Reporter::silent(), &CancelToken::new()).unwrap();
        assert_eq!(
            stats,
            FileStats {
                total_bytes: 2058,
                total_files: 2,
                large_files: 1
            }
        );
        assert_eq!(directory_size(td.path()), 2058);
    }

    #[test]
    fn missing_dir_is_empty() {
        let td = tempdir().unwrap();
        let gone = td.path().join("gone");
        let stats = scan_directory(&gone, 1, &Reporter::silent(), &CancelToken::new()).unwrap();
        assert_eq!(stats, FileStats::default());
        assert_eq!(directory_size(&gone), 0);
    }

    #[test]
    fn cancelled_scan_errors() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a"), b"x").unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = scan_directory(td.path(), 1, &Reporter::silent(), &token).unwrap_err();
        assert!(crate::errors::is_cancellation(&err));
    }
}
