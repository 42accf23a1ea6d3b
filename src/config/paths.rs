//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log paths, normalizes user paths and
//! detects symlinked ancestors for safety.

use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::CONFIG_ENV;

/// Config path: `$LINKMOVE_CONFIG` when set, else the OS-appropriate default.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    if let Some(mut base) = config_dir() {
        base.push("linkmove");
        base.push("config.xml");
        Some(base)
    } else {
        env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("linkmove")
                .join("config.xml")
        })
    }
}

/// OS-appropriate default log file path (data dir).
pub fn default_log_path() -> Option<PathBuf> {
    if let Some(mut base) = data_dir() {
        base.push("linkmove");
        base.push("linkmove.log");
        Some(base)
    } else {
        env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".local")
                .join("share")
                .join("linkmove")
                .join("linkmove.log")
        })
    }
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}

/// Make `path` absolute and lexically clean without resolving a final symlink.
///
/// The parent is canonicalized when it exists (dunce keeps Windows paths free
/// of the `\\?\` prefix); the leaf is kept as-is so a link at `path` is never
/// followed.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let abs = std::path::absolute(path)?;
    let mut clean = PathBuf::new();
    for comp in abs.components() {
        match comp {
            Component::ParentDir => {
                clean.pop();
            }
            Component::CurDir => {}
            other => clean.push(other.as_os_str()),
        }
    }
    match (clean.parent(), clean.file_name()) {
        (Some(parent), Some(name)) if parent.exists() => {
            let parent = dunce::canonicalize(parent)?;
            Ok(parent.join(name))
        }
        _ => Ok(clean),
    }
}

/// Final path component as a string, ignoring trailing separators.
pub fn leaf_name(path: &Path) -> Option<String> {
    path.components()
        .next_back()
        .and_then(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
}
