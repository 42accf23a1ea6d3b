//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - --debug is a shorthand for --log-level debug.
//! - --json switches both log output and `status` output to JSON.

use clap::{Parser, Subcommand, ValueHint};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::types::{Config, LogLevel};

/// Move a directory to another volume and leave a symbolic link behind.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Relocate a directory to another volume and leave a symbolic link in its place"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(
        short = 'd',
        long,
        global = true,
        help = "Enable debug logging (shorthand for --log-level debug)"
    )]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, global = true, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Print where linkmove will look for the config file (or LINKMOVE_CONFIG if set), then exit.
    #[arg(long, help = "Print the config file location used by linkmove and exit")]
    pub print_config: bool,

    /// Emit logs, progress and status in JSON.
    #[arg(long, global = true, help = "Emit logs, progress and status as JSON")]
    pub json: bool,

    #[arg(long, global = true, value_name = "N", help = "Worker threads for the mirror tool")]
    pub threads: Option<u32>,

    #[arg(long, global = true, value_name = "MS", help = "Progress polling interval in milliseconds")]
    pub sample_ms: Option<u64>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        help = "Mirror tool executable (defaults to robocopy on Windows, rsync elsewhere)"
    )]
    pub copy_tool: Option<PathBuf>,

    #[arg(long, global = true, help = "Keep the .bak_ directory after a successful migration")]
    pub keep_backup: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Copy SOURCE into TARGET and replace SOURCE with a link to it.
    Migrate {
        #[arg(value_hint = ValueHint::DirPath)]
        source: PathBuf,
        #[arg(value_hint = ValueHint::DirPath)]
        target: PathBuf,
    },
    /// Copy the linked data back and replace the link with a real directory.
    Restore {
        /// The link left behind by `migrate`.
        #[arg(value_hint = ValueHint::DirPath)]
        source: PathBuf,
        /// Data directory (defaults to the link's destination).
        #[arg(long, value_hint = ValueHint::DirPath)]
        target: Option<PathBuf>,
        /// Do not delete the data directory afterwards.
        #[arg(long)]
        keep_target: bool,
    },
    /// Report the migration state of SOURCE without changing anything.
    Status {
        #[arg(value_hint = ValueHint::DirPath)]
        source: PathBuf,
        #[arg(long, value_hint = ValueHint::DirPath)]
        target: Option<PathBuf>,
    },
}

/// Trim shell-quoting leftovers: surrounding quotes and one trailing separator.
pub fn sanitize_path(p: &Path) -> PathBuf {
    let raw = p.to_string_lossy();
    let trimmed = raw.trim();
    let mut inner = if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.trim_matches(|c| c == '\'' || c == '"').to_string()
    };

    // PowerShell often leaves a trailing backslash inside quotes.
    if (inner.ends_with('\\') || inner.ends_with('/')) && inner.len() > 1 && !inner.ends_with(":\\") {
        inner.pop();
    }
    PathBuf::from(inner)
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(n) = self.threads {
            cfg.copy_threads = n;
        }
        if let Some(ms) = self.sample_ms {
            cfg.sample_interval = Duration::from_millis(ms);
        }
        if let Some(tool) = &self.copy_tool {
            cfg.copy_tool = Some(sanitize_path(tool));
        }
        if self.keep_backup {
            cfg.keep_backup = true;
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_with_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "linkmove", "migrate", "/data/games", "/mnt/big", "--threads", "4", "--debug",
        ])
        .unwrap();
        match &args.command {
            Some(Command::Migrate { source, target }) => {
                assert_eq!(source, Path::new("/data/games"));
                assert_eq!(target, Path::new("/mnt/big"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        let mut cfg = Config::default();
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.copy_threads, 4);
        assert_eq!(cfg.log_level, LogLevel::Debug);
    }

    #[test]
    fn restore_target_is_optional() {
        let args = Args::try_parse_from(["linkmove", "restore", "/data/games", "--keep-target"]).unwrap();
        match args.command {
            Some(Command::Restore { target, keep_target, .. }) => {
                assert!(target.is_none());
                assert!(keep_target);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quotes_and_trailing_separator_are_trimmed() {
        assert_eq!(sanitize_path(Path::new("'/data/games/'")), PathBuf::from("/data/games"));
        assert_eq!(sanitize_path(Path::new("\"D:\\Games\\\"")), PathBuf::from("D:\\Games"));
        assert_eq!(sanitize_path(Path::new("/")), PathBuf::from("/"));
    }

    #[test]
    fn log_level_flag_parses_names() {
        let args = Args::try_parse_from(["linkmove", "--log-level", "quiet", "status", "/x"]).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Quiet));
    }
}
