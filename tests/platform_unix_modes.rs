#![cfg(unix)]

use linkmove::platform::{open_log_file_secure_append, set_dir_mode_0700};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use tempfile::tempdir;

#[test]
fn config_dir_is_private() {
    let td = tempdir().unwrap();
    let dir = td.path().join("linkmove");
    fs::create_dir_all(&dir).unwrap();

    set_dir_mode_0700(&dir).unwrap();
    let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o700, "expected dir mode 0700, got {mode:o}");
}

#[test]
fn log_file_appends_and_is_owner_only() {
    let td = tempdir().unwrap();
    let path = td.path().join("linkmove.log");

    let mut f = open_log_file_secure_append(&path).unwrap();
    writeln!(f, "first").unwrap();
    drop(f);
    let mut f = open_log_file_secure_append(&path).unwrap();
    writeln!(f, "second").unwrap();
    drop(f);

    assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
