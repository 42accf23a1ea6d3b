//! Free-space check for the destination volume.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::helpers::io_error_with_help;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceCheck {
    pub sufficient: bool,
    pub available: u64,
    /// Raw requirement plus the 10% margin.
    pub required: u64,
    /// Existing directory whose volume was measured.
    pub measured: PathBuf,
}

/// Bytes needed for `raw` bytes of payload, including a 10% margin rounded up.
pub fn required_with_margin(raw: u64) -> u64 {
    raw.saturating_add(raw.div_ceil(10))
}

/// Check that the volume holding `path` has room for `raw` bytes plus 10%.
///
/// `path` may not exist yet; the nearest existing ancestor is measured.
pub fn check_disk_space(path: &Path, raw: u64) -> Result<SpaceCheck> {
    let probe = path
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("."));
    let available =
        fs2::available_space(probe).map_err(io_error_with_help("query free space", probe))?;
    let required = required_with_margin(raw);
    debug!(path = %probe.display(), available, required, "disk space checked");
    Ok(SpaceCheck {
        sufficient: available >= required,
        available,
        required,
        measured: probe.to_path_buf(),
    })
}
