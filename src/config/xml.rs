//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a template on first run (only for the default location).
//!
//! Notes:
//! - Unknown XML fields are rejected so misconfigurations surface early.
//! - Empty or unparsable values fall back to the built-in defaults.

use anyhow::{Context, Result, anyhow};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel};
use super::{CONFIG_ENV, DEFAULT_COPY_THREADS, DEFAULT_LARGE_FILE_MB, DEFAULT_SAMPLE_MS};

use crate::platform::{set_dir_mode_0700, write_config_secure_new};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    large_file_threshold_mb: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    copy_threads: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    sample_interval_ms: Option<u64>,
    copy_tool: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    keep_backup: Option<bool>,
}

/// Outcome of looking for a config file.
#[derive(Debug)]
pub enum LoadResult {
    /// A config file was found and parsed.
    Loaded(Config, PathBuf),
    /// No file existed at the default location; a template was written there.
    CreatedTemplate(PathBuf),
    /// No file and no template (explicit path missing, or no resolvable location).
    Defaults,
}

// Trims surrounding whitespace and parses; unparsable values become None.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| s.trim().parse::<T>().ok()))
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn xml_to_config(parsed: XmlConfig) -> Config {
    let mut cfg = Config::default();
    if let Some(level) = parsed
        .log_level
        .as_deref()
        .and_then(|s| LogLevel::parse(s.trim()))
    {
        cfg.log_level = level;
    }
    if let Some(p) = non_empty(parsed.log_file.as_deref()) {
        cfg.log_file = Some(PathBuf::from(p));
    }
    cfg.large_file_threshold_mb = parsed
        .large_file_threshold_mb
        .unwrap_or(DEFAULT_LARGE_FILE_MB);
    cfg.copy_threads = parsed.copy_threads.unwrap_or(DEFAULT_COPY_THREADS);
    cfg.sample_interval =
        Duration::from_millis(parsed.sample_interval_ms.unwrap_or(DEFAULT_SAMPLE_MS));
    cfg.copy_tool = non_empty(parsed.copy_tool.as_deref()).map(PathBuf::from);
    cfg.keep_backup = parsed.keep_backup.unwrap_or(false);
    cfg
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(xml_to_config(parsed))
}

/// Resolve and load the config file.
///
/// `$LINKMOVE_CONFIG` must point at a readable file when set. The default
/// location gets a template on first use and the run continues with defaults.
pub fn load_or_init() -> Result<LoadResult> {
    if let Some(p) = env::var_os(CONFIG_ENV) {
        let path = PathBuf::from(p);
        if path.is_dir() {
            return Err(anyhow!(
                "{CONFIG_ENV} points at a directory, expected a file: {}",
                path.display()
            ));
        }
        if !path.exists() {
            return Ok(LoadResult::Defaults);
        }
        let cfg = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded(cfg, path));
    }

    let Some(path) = default_config_path() else {
        return Ok(LoadResult::Defaults);
    };
    if path.exists() {
        let cfg = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded(cfg, path));
    }
    match ensure_default_config_exists() {
        Some(created) => Ok(LoadResult::CreatedTemplate(created)),
        None => Ok(LoadResult::Defaults),
    }
}

/// Create the template config file and its parent directory.
/// Refuses to write through a symlinked ancestor.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        return Err(anyhow!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let content = format!(
        "<!--\n  linkmove configuration (XML)\n\n  log_level               -> quiet | normal | info | debug\n  log_file                -> path to log file (optional; console output is kept)\n  large_file_threshold_mb -> files at or above this size are reported as large\n  copy_threads            -> worker threads passed to the mirror tool\n  sample_interval_ms      -> progress polling interval\n  copy_tool               -> optional path to the mirror tool executable\n  keep_backup             -> keep the .bak_ directory after a migration (true/false)\n\n  CLI flags override XML values.\n-->\n<config>\n  <log_level>normal</log_level>\n  <log_file>{suggested_log}</log_file>\n  <large_file_threshold_mb>{DEFAULT_LARGE_FILE_MB}</large_file_threshold_mb>\n  <copy_threads>{DEFAULT_COPY_THREADS}</copy_threads>\n  <sample_interval_ms>{DEFAULT_SAMPLE_MS}</sample_interval_ms>\n  <copy_tool></copy_tool>\n  <keep_backup>false</keep_backup>\n</config>\n"
    );

    write_config_secure_new(path, content.as_bytes())?;
    info!(path = %path.display(), "Created template config");
    Ok(())
}

/// Create the default config if `$LINKMOVE_CONFIG` is not set; returns the created path.
pub fn ensure_default_config_exists() -> Option<PathBuf> {
    if env::var_os(CONFIG_ENV).is_some() {
        return None;
    }
    let cfg_path = default_config_path()?;
    if cfg_path.exists() {
        return None;
    }
    match create_template_config(&cfg_path) {
        Ok(()) => Some(cfg_path),
        Err(e) => {
            eprintln!(
                "Failed to create template config at {}: {}",
                cfg_path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_all_fields_with_whitespace() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(
            &p,
            "<config>\n  <log_level> debug </log_level>\n  <log_file>  </log_file>\n  <large_file_threshold_mb> 64 </large_file_threshold_mb>\n  <copy_threads>4</copy_threads>\n  <sample_interval_ms>250</sample_interval_ms>\n  <copy_tool>/usr/bin/rsync</copy_tool>\n  <keep_backup>true</keep_backup>\n</config>",
        )
        .unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, default_log_path());
        assert_eq!(cfg.large_file_threshold_mb, 64);
        assert_eq!(cfg.copy_threads, 4);
        assert_eq!(cfg.sample_interval, Duration::from_millis(250));
        assert_eq!(cfg.copy_tool, Some(PathBuf::from("/usr/bin/rsync")));
        assert!(cfg.keep_backup);
    }

    #[test]
    fn unknown_field_is_an_error() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.xml");
        fs::write(&p, "<config><destination>/x</destination></config>").unwrap();
        assert!(load_config_from_xml_path(&p).is_err());
    }

    #[test]
    fn template_round_trips_through_loader() {
        let td = tempdir().unwrap();
        let p = td.path().join("nested").join("config.xml");
        create_template_config(&p).unwrap();
        let cfg = load_config_from_xml_path(&p).unwrap();
        assert_eq!(cfg.copy_threads, DEFAULT_COPY_THREADS);
        assert_eq!(cfg.copy_tool, None);
        assert!(!cfg.keep_backup);
    }
}
