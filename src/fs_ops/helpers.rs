//! I/O error enrichment.
//!
//! Adapters that turn a bare io::Error into an actionable message naming the
//! operation and path, for use with `map_err` in anyhow code paths:
//!
//!   fs::rename(&src, &backup).map_err(io_error_with_help("move source aside", &src))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

fn hint_for(e: &io::Error) -> Option<&'static str> {
    if let Some(code) = e.raw_os_error() {
        #[cfg(unix)]
        {
            let hint = match code {
                libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions"),
                libc::EXDEV => Some("cross-device rename; source and destination are on different volumes"),
                libc::EBUSY => Some("resource busy; close programs using this directory"),
                libc::ENOTEMPTY => Some("directory not empty"),
                libc::ENOSPC => Some("no space left on device"),
                libc::EROFS => Some("read-only filesystem"),
                libc::ELOOP => Some("too many levels of symbolic links"),
                _ => None,
            };
            if hint.is_some() {
                return hint;
            }
        }
        #[cfg(windows)]
        {
            let hint = match code {
                5 => Some("access denied; run elevated or enable Developer Mode for links"),
                17 => Some("cross-device rename; source and destination are on different volumes"),
                32 => Some("sharing violation; a file is in use by another program"),
                112 => Some("insufficient disk space"),
                145 => Some("directory not empty"),
                1314 => Some("privilege not held; symbolic links need elevation or Developer Mode"),
                _ => None,
            };
            if hint.is_some() {
                return hint;
            }
        }
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and write permissions"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        _ => None,
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    if let Some(hint) = hint_for(e) {
        msg.push_str(" (");
        msg.push_str(hint);
        msg.push(')');
    }
    msg
}

/// Returns a closure for `.map_err(...)` converting io::Error into an enriched anyhow::Error.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}
