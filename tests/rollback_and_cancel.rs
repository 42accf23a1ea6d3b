#![cfg(unix)]

//! Failure paths: link phase failure, tool failure, cancellation, validation,
//! and the matching restore rollbacks.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

use linkmove::link::{is_symbolic_link, link_target};
use linkmove::state::{MigrationState, detect};
use linkmove::{CancelToken, MigrationMode, MigrationService, Reporter};

use common::{
    COPYING_TOOL, FAILING_TOOL, HANGING_TOOL, fast_config, install_tool, make_source, markers_in,
    siblings_with,
};

#[test]
fn link_failure_restores_the_backup() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "fake-robocopy", COPYING_TOOL);
    let source = make_source(&base, "games", 4096);
    let target = base.join("vol").join("games");

    // Occupy the source path right after it is moved aside so the link cannot be created.
    let squatter = source.clone();
    let reporter = Reporter::silent().with_log(move |m| {
        if m.starts_with("Source moved to backup") {
            fs::create_dir(&squatter).unwrap();
        }
    });

    let mut service = MigrationService::new(fast_config(&source, &target), MigrationMode::Migrate)
        .copy_tool(tool);
    let result = service.execute(&reporter, &CancelToken::new());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some("link_creation"));
    assert!(result.rolled_back, "rollback error: {:?}", result.rollback_error);
    assert!(!is_symbolic_link(&source));
    assert_eq!(fs::read(source.join("game.bin")).unwrap(), vec![1u8; 4096]);
    assert!(siblings_with(&source, ".bak_").is_empty());
    assert!(markers_in(&target).is_empty());
}

#[test]
fn tool_failure_leaves_source_untouched_and_resumable() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "fake-robocopy", FAILING_TOOL);
    let source = make_source(&base, "games", 128);
    let target = base.join("vol").join("games");

    let mut service = MigrationService::new(fast_config(&source, &target), MigrationMode::Migrate)
        .copy_tool(tool);
    let result = service.execute(&Reporter::silent(), &CancelToken::new());

    assert!(!result.success);
    assert!(!result.cancelled);
    assert_eq!(result.error_kind, Some("tool_failed"));
    assert!(result.error.as_deref().unwrap_or_default().contains("code 8"));
    assert!(source.is_dir() && !is_symbolic_link(&source));

    let report = detect(&source, Some(&target));
    assert_eq!(report.state, MigrationState::Pending);
    assert!(report.resumable);
}

#[test]
fn missing_tool_is_a_launch_error() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let source = make_source(&base, "games", 16);
    let tool = linkmove::MirrorTool::new(linkmove::ToolFlavor::Rsync)
        .with_program(base.join("no-such-tool"));

    let mut service = MigrationService::new(
        fast_config(&source, &base.join("vol").join("games")),
        MigrationMode::Migrate,
    )
    .copy_tool(tool);
    let result = service.execute(&Reporter::silent(), &CancelToken::new());
    assert_eq!(result.error_kind, Some("tool_launch"));
    assert!(source.is_dir() && !is_symbolic_link(&source));
}

#[test]
fn cancellation_kills_the_tool_and_rolls_back() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "slow-robocopy", HANGING_TOOL);
    let source = make_source(&base, "games", 64);
    let target = base.join("vol").join("games");

    let token = CancelToken::new();
    let canceller = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        canceller.cancel();
    });

    let started = Instant::now();
    let mut service = MigrationService::new(fast_config(&source, &target), MigrationMode::Migrate)
        .copy_tool(tool);
    let result = service.execute(&Reporter::silent(), &token);
    handle.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!result.success);
    assert!(result.cancelled);
    assert_eq!(result.error_kind, Some("cancelled"));
    assert!(result.rolled_back);
    assert!(source.is_dir() && !is_symbolic_link(&source));
}

#[test]
fn nested_target_is_rejected_before_anything_moves() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let source = make_source(&base, "games", 16);
    let target = source.join("inner");

    let mut service = MigrationService::new(fast_config(&source, &target), MigrationMode::Migrate);
    let result = service.execute(&Reporter::silent(), &CancelToken::new());
    assert_eq!(result.error_kind, Some("path_overlap"));
    assert!(!target.exists());
    assert!(source.is_dir() && !is_symbolic_link(&source));
}

#[test]
fn restore_requires_a_link() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let source = make_source(&base, "games", 16);

    let mut service = MigrationService::new(
        fast_config(&source, &base.join("elsewhere")),
        MigrationMode::Restore,
    );
    let result = service.execute(&Reporter::silent(), &CancelToken::new());
    assert_eq!(result.error_kind, Some("source_not_link"));
    assert!(source.join("game.bin").exists());
}

#[test]
fn source_that_is_already_a_link_is_refused() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let real = make_source(&base, "real", 16);
    let source = base.join("games");
    std::os::unix::fs::symlink(&real, &source).unwrap();

    let mut service = MigrationService::new(
        fast_config(&source, &base.join("vol")),
        MigrationMode::Migrate,
    );
    let result = service.execute(&Reporter::silent(), &CancelToken::new());
    assert_eq!(result.error_kind, Some("source_is_link"));
    assert!(is_symbolic_link(&source));
}

/// A migrated layout made by hand: `<base>/vol/games` holds the data and
/// `<base>/games` links to it.
fn linked_layout(base: &Path) -> (PathBuf, PathBuf) {
    let data = make_source(&base.join("vol"), "games", 256);
    let source = base.join("games");
    std::os::unix::fs::symlink(&data, &source).unwrap();
    (source, data)
}

#[test]
fn failed_restore_copy_removes_temp_and_keeps_link() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "fake-robocopy", FAILING_TOOL);
    let (source, data) = linked_layout(&base);

    let mut service =
        MigrationService::new(fast_config(&source, &PathBuf::new()), MigrationMode::Restore)
            .copy_tool(tool);
    let result = service.execute(&Reporter::silent(), &CancelToken::new());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some("tool_failed"));
    assert!(result.rolled_back, "rollback error: {:?}", result.rollback_error);
    assert!(siblings_with(&source, ".restore_temp_").is_empty());
    assert!(is_symbolic_link(&source));
    assert_eq!(link_target(&source).unwrap(), data);
    assert!(markers_in(&data).is_empty());
    assert_eq!(fs::read(data.join("game.bin")).unwrap(), vec![1u8; 256]);
}

#[test]
fn cancelled_restore_removes_temp_and_keeps_link() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "slow-robocopy", HANGING_TOOL);
    let (source, data) = linked_layout(&base);

    let token = CancelToken::new();
    let canceller = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        canceller.cancel();
    });

    let mut service =
        MigrationService::new(fast_config(&source, &PathBuf::new()), MigrationMode::Restore)
            .copy_tool(tool);
    let result = service.execute(&Reporter::silent(), &token);
    handle.join().unwrap();

    assert!(result.cancelled);
    assert!(result.rolled_back);
    assert!(siblings_with(&source, ".restore_temp_").is_empty());
    assert!(is_symbolic_link(&source));
    assert!(markers_in(&data).is_empty());
}

#[test]
fn restore_failing_after_link_removal_recreates_the_link() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let tool = install_tool(&base, "fake-robocopy", COPYING_TOOL);
    let (source, data) = linked_layout(&base);

    // Take the restored copy away as phase 4 starts so the final rename fails
    // after the link is already gone.
    let watched = source.clone();
    let reporter = Reporter::silent().with_log(move |m| {
        if m.starts_with("[4/6]") {
            for temp in siblings_with(&watched, ".restore_temp_") {
                fs::remove_dir_all(temp).unwrap();
            }
        }
    });

    let mut service =
        MigrationService::new(fast_config(&source, &PathBuf::new()), MigrationMode::Restore)
            .copy_tool(tool);
    let result = service.execute(&reporter, &CancelToken::new());

    assert!(!result.success);
    assert!(result.rolled_back, "rollback error: {:?}", result.rollback_error);
    assert!(is_symbolic_link(&source));
    assert_eq!(link_target(&source).unwrap(), data);
    assert!(markers_in(&data).is_empty());
    assert!(data.join("saves").join("slot1.sav").exists());
}
