//! Core library for `linkmove`.
//!
//! Relocates a directory tree to another volume and leaves a directory
//! symbolic link at the original path, so programs that use the old path
//! keep working. The reverse operation restores the tree in place.
//!
//! Entry point is [`MigrationService`]; [`state::detect`] classifies a path
//! without changing anything.

pub mod cli;
pub mod config;
pub mod copy;
pub mod errors;
pub mod fs_ops;
pub mod link;
pub mod migration;
pub mod output;
pub mod platform;
pub mod progress;
pub mod shutdown;
pub mod state;

pub use config::{
    Config, LogLevel, MigrationConfig, default_config_path, default_log_path,
    path_has_symlink_ancestor,
};
pub use copy::{MirrorTool, ToolFlavor};
pub use errors::MigrationError;
pub use fs_ops::FileStats;
pub use migration::{MigrationResult, MigrationService};
pub use progress::{MigrationMode, MigrationProgress, Phase, Reporter};
pub use shutdown::CancelToken;
pub use state::{MigrationState, StateReport};
