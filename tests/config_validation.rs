use assert_fs::TempDir;
use linkmove::{Config, MigrationConfig, MigrationError};
use std::fs;

#[test]
fn relative_paths_become_absolute() {
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let source = root.join("games");
    fs::create_dir_all(&source).unwrap();
    let mut cfg = MigrationConfig::new(root.join("games").join("..").join("games"), root.join("vol"));
    cfg.validate_relation().unwrap();
    assert_eq!(cfg.source, source);
    assert!(cfg.target.is_absolute());
}

#[test]
fn disallow_equal_paths() {
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let base = root.join("same");
    fs::create_dir_all(&base).unwrap();
    let mut cfg = MigrationConfig::new(&base, &base);
    let err = cfg.validate_relation().unwrap_err();
    assert!(format!("{err}").contains("resolve to the same"));
}

#[test]
fn disallow_target_inside_source() {
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let source = root.join("games");
    fs::create_dir_all(&source).unwrap();
    let mut cfg = MigrationConfig::new(&source, source.join("moved"));
    let err = cfg.validate_relation().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::PathOverlap { .. })
    ));
}

#[cfg(unix)]
#[test]
fn symlinked_parent_is_resolved_before_comparing() {
    use std::os::unix::fs as unix_fs;
    let td = TempDir::new().unwrap();
    let root = dunce::canonicalize(td.path()).unwrap();
    let real = root.join("real_root");
    fs::create_dir_all(real.join("games")).unwrap();
    let alias = root.join("alias_root");
    unix_fs::symlink(&real, &alias).unwrap();

    // Same directory reached through two spellings.
    let mut cfg = MigrationConfig::new(alias.join("games"), real.join("games"));
    assert!(cfg.validate_relation().is_err());
}

#[test]
fn defaults_validate() {
    assert!(Config::default().validate().is_ok());
    let cfg = Config {
        copy_threads: 500,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());
}
