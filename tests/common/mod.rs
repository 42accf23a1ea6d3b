//! Shared helpers for integration tests: a fake mirror tool that prints
//! robocopy-shaped output, and small tree builders.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use linkmove::{MigrationConfig, MirrorTool, ToolFlavor};

/// Copies every non-marker file, printing a new-file line and two percent lines per file.
/// Exits 1, which robocopy uses for "files copied".
pub const COPYING_TOOL: &str = r#"#!/bin/sh
set -e
src="$1"
dst="$2"
mkdir -p "$dst"
cd "$src"
find . -type d | while IFS= read -r d; do mkdir -p "$dst/$d"; done
find . -type f ! -name '.linkmove-*' | while IFS= read -r f; do
  size=$(wc -c < "$f" | tr -d ' ')
  printf '\t    New File  \t\t%s\t%s\n' "$size" "$f"
  printf '  50%%\n'
  cp -p "$f" "$dst/$f"
  printf '100%%\n'
done
exit 1
"#;

/// rsync-style invocation: the last two arguments are `src/` and `dst/`.
pub const RSYNC_LIKE_TOOL: &str = r#"#!/bin/sh
set -e
for a in "$@"; do src="$dst"; dst="$a"; done
mkdir -p "$dst"
cd "$src"
find . -type d | while IFS= read -r d; do mkdir -p "$dst/$d"; done
find . -type f ! -name '.linkmove-*' | while IFS= read -r f; do
  size=$(wc -c < "$f" | tr -d ' ')
  printf 'New File %s %s\n' "$size" "$f"
  cp -p "$f" "$dst/$f"
done
"#;

/// Prints one file header, then hangs until killed.
pub const HANGING_TOOL: &str = r#"#!/bin/sh
printf 'New File  10  a.bin\n'
sleep 30
"#;

/// Fails like robocopy does on a serious error.
pub const FAILING_TOOL: &str = r#"#!/bin/sh
echo "ERROR 5 (0x00000005) Access is denied." >&2
exit 8
"#;

/// Write an executable script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Robocopy-flavored tool backed by a script.
#[cfg(unix)]
pub fn install_tool(dir: &Path, name: &str, script: &str) -> MirrorTool {
    MirrorTool::new(ToolFlavor::Robocopy).with_program(write_script(dir, name, script))
}

/// Source tree with three files of `each` bytes, one in a subdirectory.
pub fn make_source(root: &Path, name: &str, each: usize) -> PathBuf {
    let src = root.join(name);
    fs::create_dir_all(src.join("saves")).unwrap();
    fs::write(src.join("game.bin"), vec![1u8; each]).unwrap();
    fs::write(src.join("assets.pak"), vec![2u8; each]).unwrap();
    fs::write(src.join("saves").join("slot1.sav"), vec![3u8; each]).unwrap();
    src
}

pub fn fast_config(source: &Path, target: &Path) -> MigrationConfig {
    let mut cfg = MigrationConfig::new(source, target);
    cfg.sample_interval = Duration::from_millis(20);
    cfg.copy_threads = 2;
    cfg
}

/// Names of `.linkmove-*` files directly inside `dir`.
pub fn markers_in(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with(".linkmove-"))
                .collect()
        })
        .unwrap_or_default()
}

/// Sibling entries of `path` whose names start with `<leaf><suffix>`.
pub fn siblings_with(path: &Path, suffix: &str) -> Vec<PathBuf> {
    let leaf = path.file_name().unwrap().to_string_lossy().into_owned();
    let prefix = format!("{leaf}{suffix}");
    fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .map(|e| e.path())
        .collect()
}
