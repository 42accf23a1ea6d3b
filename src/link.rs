//! Directory symbolic links: create, detect, resolve and remove.
//!
//! Creation tries the native call first (`symlink(2)` on Unix, the std
//! `symlink_dir` wrapper on Windows, which requests unprivileged creation) and
//! falls back to the platform shell command (`ln -s` / `mklink /D`).

use anyhow::Result;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::errors::MigrationError;
use crate::fs_ops::io_error_with_help;
use crate::platform::has_reparse_attribute;

/// How a link ended up being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    Native,
    Shell,
}

#[cfg(unix)]
fn create_native(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_native(link: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn shell_command(link: &Path, target: &Path) -> Command {
    let mut cmd = Command::new("ln");
    cmd.arg("-s").arg(target).arg(link);
    cmd
}

#[cfg(windows)]
fn shell_command(link: &Path, target: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/c").arg("mklink").arg("/D").arg(link).arg(target);
    cmd
}

fn create_via_shell(link: &Path, target: &Path) -> Result<(), String> {
    // `ln -s` would otherwise create the link inside an existing directory.
    if fs::symlink_metadata(link).is_ok() {
        return Err("path already exists".into());
    }
    let output = shell_command(link, target)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to run link command: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(format!(
            "link command exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr
        ));
    }
    if !is_symbolic_link(link) {
        return Err("link command succeeded but no link exists at the path".into());
    }
    Ok(())
}

/// Create a directory link at `link` pointing at `target`.
pub fn create_directory_link(link: &Path, target: &Path) -> Result<LinkMethod, MigrationError> {
    match create_native(link, target) {
        Ok(()) => {
            debug!(link = %link.display(), target = %target.display(), "link created natively");
            return Ok(LinkMethod::Native);
        }
        Err(e) => {
            warn!(link = %link.display(), error = %e, "native link creation failed; trying shell fallback");
        }
    }
    create_via_shell(link, target).map_err(|reason| MigrationError::LinkCreation {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        reason,
    })?;
    debug!(link = %link.display(), target = %target.display(), "link created via shell");
    Ok(LinkMethod::Shell)
}

/// True when `path` itself is a symbolic link or reparse point.
///
/// The attribute check decides; `read_link` is only used to confirm. A flagged
/// entry whose target cannot be read still counts as a link.
pub fn is_symbolic_link(path: &Path) -> bool {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return false;
    };
    if !(meta.file_type().is_symlink() || has_reparse_attribute(&meta)) {
        return false;
    }
    if let Err(e) = fs::read_link(path) {
        debug!(path = %path.display(), error = %e, "link flagged but target unreadable");
    }
    true
}

/// Absolute destination of the link at `path` (it may not exist).
pub fn link_target(path: &Path) -> Result<PathBuf> {
    let raw = fs::read_link(path).map_err(io_error_with_help("read link", path))?;
    let joined = if raw.is_absolute() {
        raw
    } else {
        path.parent().unwrap_or_else(|| Path::new("")).join(raw)
    };
    Ok(lexical_clean(&strip_verbatim(joined)))
}

// `read_link` on Windows may return `\\?\` or `\??\` prefixed targets.
fn strip_verbatim(p: PathBuf) -> PathBuf {
    let s = p.to_string_lossy();
    if let Some(rest) = s.strip_prefix(r"\??\") {
        return PathBuf::from(rest);
    }
    dunce::simplified(&p).to_path_buf()
}

fn lexical_clean(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Remove the link at `path` without touching its target.
pub fn remove_link(path: &Path) -> Result<()> {
    if !is_symbolic_link(path) {
        return Err(MigrationError::LinkVerification {
            path: path.to_path_buf(),
            reason: "refusing to remove: not a symbolic link".into(),
        }
        .into());
    }
    // Windows directory links are removed as directories, Unix links as files.
    fs::remove_file(path)
        .or_else(|_| fs::remove_dir(path))
        .map_err(io_error_with_help("remove link", path))?;
    debug!(path = %path.display(), "link removed");
    Ok(())
}

/// Probe whether this process may create directory links by making a throwaway one.
pub fn can_create_links() -> bool {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir().join(format!(
        ".linkmove-probe-{}-{seq}",
        std::process::id()
    ));
    let target = base.join("target");
    let link = base.join("link");
    let ok = fs::create_dir_all(&target).is_ok() && create_native(&link, &target).is_ok();
    let _ = fs::remove_file(&link).or_else(|_| fs::remove_dir(&link));
    let _ = fs::remove_dir_all(&base);
    ok
}
