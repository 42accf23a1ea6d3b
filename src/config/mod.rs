//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel, MigrationConfig};
pub use xml::{
    LoadResult, create_template_config, ensure_default_config_exists, load_config_from_xml_path,
    load_or_init,
};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LINKMOVE_CONFIG";

/// Defaults shared across submodules.
pub const DEFAULT_LARGE_FILE_MB: u64 = 1024;
pub const DEFAULT_COPY_THREADS: u32 = 8;
pub const DEFAULT_SAMPLE_MS: u64 = 1000;
