use assert_fs::TempDir;
use assert_fs::prelude::*;
use linkmove::fs_ops::markers::{Marker, has_user_content, marker_exists, write_migrate_lock};
use linkmove::fs_ops::{check_disk_space, directory_size, format_bytes, format_speed, scan_directory};
use linkmove::{CancelToken, Reporter};
use std::path::Path;

#[test]
fn scan_counts_files_bytes_and_large_files() {
    let td = TempDir::new().unwrap();
    td.child("a.bin").write_binary(&[0u8; 4096]).unwrap();
    td.child("nested/b.bin").write_binary(&[0u8; 100]).unwrap();
    td.child("nested/deeper/c.bin").write_binary(&[0u8; 2048]).unwrap();

    let stats = scan_directory(td.path(), 2048, &Reporter::silent(), &CancelToken::new()).unwrap();
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.total_bytes, 4096 + 100 + 2048);
    assert_eq!(stats.large_files, 2);
    assert_eq!(directory_size(td.path()), stats.total_bytes);
}

#[test]
fn missing_directory_is_empty() {
    let td = TempDir::new().unwrap();
    let missing = td.path().join("gone");
    let stats = scan_directory(&missing, 1, &Reporter::silent(), &CancelToken::new()).unwrap();
    assert_eq!(stats.total_files, 0);
    assert_eq!(directory_size(&missing), 0);
}

#[test]
fn cancelled_scan_stops() {
    let td = TempDir::new().unwrap();
    td.child("a.bin").write_str("x").unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(scan_directory(td.path(), 1, &Reporter::silent(), &cancel).is_err());
}

#[cfg(unix)]
#[test]
fn links_inside_the_tree_are_not_followed() {
    let td = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    outside.child("huge.bin").write_binary(&[0u8; 10_000]).unwrap();
    td.child("own.bin").write_binary(&[0u8; 10]).unwrap();
    std::os::unix::fs::symlink(outside.path(), td.path().join("elsewhere")).unwrap();
    assert_eq!(directory_size(td.path()), 10);
}

#[test]
fn markers_do_not_count_as_content() {
    let td = TempDir::new().unwrap();
    write_migrate_lock(td.path(), Path::new("/data/games"));
    assert!(marker_exists(td.path(), Marker::MigrateLock));
    assert!(!has_user_content(td.path()));
    td.child("save.dat").write_str("x").unwrap();
    assert!(has_user_content(td.path()));
}

#[test]
fn space_check_reports_margin() {
    let td = TempDir::new().unwrap();
    let check = check_disk_space(td.path(), 1000).unwrap();
    assert_eq!(check.required, 1100);
    assert_eq!(check.sufficient, check.available >= 1100);
    assert!(!check_disk_space(td.path(), u64::MAX / 2).unwrap().sufficient);
}

#[test]
fn human_sizes() {
    assert_eq!(format_bytes(0), "0.00 B");
    assert_eq!(format_bytes(1536), "1.50 KB");
    assert_eq!(format_speed(1024.0 * 1024.0 * 2.0), "2.00 MB/s");
}
