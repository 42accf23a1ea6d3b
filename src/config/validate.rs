//! Config validation logic.
//! Verifies numeric settings and the source/target relation of a migration.

use anyhow::{Result, bail};
use std::path::Path;
use tracing::debug;

use crate::errors::MigrationError;

use super::paths::normalize_path;
use super::types::{Config, MigrationConfig};

impl Config {
    /// Reject settings that cannot drive a copy.
    pub fn validate(&self) -> Result<()> {
        if self.copy_threads == 0 || self.copy_threads > 128 {
            bail!(
                "copy_threads must be between 1 and 128 (got {})",
                self.copy_threads
            );
        }
        if self.sample_interval.is_zero() {
            bail!("sample_interval_ms must be greater than zero");
        }
        if self
            .copy_tool
            .as_ref()
            .is_some_and(|tool| tool.as_os_str().is_empty())
        {
            bail!("copy_tool must not be empty when set");
        }
        Ok(())
    }
}

impl MigrationConfig {
    /// Source and target must resolve to distinct, non-nested absolute paths.
    ///
    /// Both paths are normalized in place so later phases work on absolute paths.
    pub fn validate_relation(&mut self) -> Result<()> {
        self.source = normalize_path(&self.source)?;
        self.target = normalize_path(&self.target)?;
        check_relation(&self.source, &self.target)?;
        debug!(
            source = %self.source.display(),
            target = %self.target.display(),
            "paths validated"
        );
        Ok(())
    }
}

fn check_relation(source: &Path, target: &Path) -> Result<(), MigrationError> {
    let overlap = |relation| MigrationError::PathOverlap {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        relation,
    };
    if same_path(source, target) {
        return Err(overlap("resolve to the same path"));
    }
    if target.starts_with(source) {
        return Err(overlap("(target is inside source)"));
    }
    if source.starts_with(target) {
        return Err(overlap("(source is inside target)"));
    }
    Ok(())
}

#[cfg(windows)]
fn same_path(a: &Path, b: &Path) -> bool {
    a.as_os_str().eq_ignore_ascii_case(b.as_os_str())
}

#[cfg(not(windows))]
fn same_path(a: &Path, b: &Path) -> bool {
    a == b
}
