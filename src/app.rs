//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the interrupt handler and
//! dispatches the subcommand to the library.

use anyhow::{Result, anyhow};
use std::path::PathBuf;
use tracing::{debug, error, info};

use linkmove::cli::{Args, Command, sanitize_path};
use linkmove::config::{CONFIG_ENV, LoadResult, load_or_init};
use linkmove::output as out;
use linkmove::{
    CancelToken, Config, LogLevel, MigrationMode, MigrationResult, MigrationService, MirrorTool, Reporter,
    default_config_path, shutdown, state,
};

use crate::logging::init_tracing;

fn print_config_location() {
    if let Ok(cfg_env) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {cfg_env}\n"));
        out::print_info(&format!("To override, unset {CONFIG_ENV} or set it to another file."));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default linkmove config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info("No config file exists there yet. Run any command to create a template.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

fn load_config() -> Result<Config> {
    match load_or_init()? {
        LoadResult::Loaded(cfg, path) => {
            debug!(path = %path.display(), "using config file");
            Ok(cfg)
        }
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template linkmove config was written to: {}",
                path.display()
            ));
            out::print_info("Continuing with built-in defaults. Edit the file to change them.");
            Ok(Config::default())
        }
        LoadResult::Defaults => Ok(Config::default()),
    }
}

fn reporter(json: bool) -> Reporter {
    // Log lines already go through tracing; only progress needs rendering.
    Reporter::silent().with_progress(move |p| {
        if json {
            if let Ok(line) = serde_json::to_string(p) {
                out::print_user(&line);
            }
        } else {
            out::print_progress(p);
        }
    })
}

fn mirror_tool(cfg: &Config) -> MirrorTool {
    let tool = MirrorTool::platform_default();
    let verbose = tool.verbose || cfg.log_level == LogLevel::Debug;
    let tool = tool.with_verbose(verbose);
    match &cfg.copy_tool {
        Some(program) => tool.with_program(program),
        None => tool,
    }
}

fn report_result(result: &MigrationResult, json: bool) -> Result<()> {
    if json {
        out::print_user(&serde_json::to_string_pretty(result)?);
    }
    if result.success {
        info!(
            source = %result.source.display(),
            target = %result.target.display(),
            files = result.stats.total_files,
            bytes = result.stats.total_bytes,
            "run completed"
        );
        if !json {
            out::print_success(&format!(
                "{} -> {} ({})",
                result.source.display(),
                result.target.display(),
                out::summarize_bytes(result.stats.total_files, result.stats.total_bytes)
            ));
        }
        return Ok(());
    }

    let message = result.error.clone().unwrap_or_else(|| "unknown error".into());
    if result.cancelled {
        out::print_warn("Cancelled by user");
    } else {
        error!(
            kind = result.error_kind.unwrap_or("io"),
            source = %result.source.display(),
            target = %result.target.display(),
            rolled_back = result.rolled_back,
            "run failed"
        );
    }
    if let Some(rb) = &result.rollback_error {
        out::print_error(&format!("Rollback failed: {rb}"));
    }
    Err(anyhow!(message))
}

fn run_transfer(
    cfg: &Config,
    mode: MigrationMode,
    source: PathBuf,
    target: PathBuf,
    keep_target: bool,
    json: bool,
) -> Result<()> {
    let migration = cfg.migration_config(source, target);
    let mut service = MigrationService::new(migration, mode)
        .keep_backup(cfg.keep_backup)
        .keep_target_on_restore(keep_target)
        .copy_tool(mirror_tool(cfg));
    let result = service.execute(&reporter(json), &CancelToken::new());
    report_result(&result, json)
}

fn dispatch(args: &Args, cfg: &Config) -> Result<()> {
    let Some(command) = &args.command else {
        return Err(anyhow!("no command given; try `linkmove --help`"));
    };
    match command {
        Command::Migrate { source, target } => run_transfer(
            cfg,
            MigrationMode::Migrate,
            sanitize_path(source),
            sanitize_path(target),
            false,
            args.json,
        ),
        Command::Restore {
            source,
            target,
            keep_target,
        } => run_transfer(
            cfg,
            MigrationMode::Restore,
            sanitize_path(source),
            // Empty target: use the link's destination.
            target.as_deref().map(sanitize_path).unwrap_or_default(),
            *keep_target,
            args.json,
        ),
        Command::Status { source, target } => {
            let target = target.as_deref().map(sanitize_path);
            let report = state::detect(&sanitize_path(source), target.as_deref());
            if args.json {
                out::print_user(&serde_json::to_string_pretty(&report)?);
            } else {
                out::print_state(&report);
            }
            Ok(())
        }
    }
}

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(());
    }

    let mut cfg = load_config()?;
    args.apply_overrides(&mut cfg);
    cfg.validate()?;

    // Held until return so the file writer flushes.
    let _guard = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json).map_err(|e| {
        out::print_error(&format!("Failed to initialize logging: {e}"));
        e
    })?;

    // The run keeps going after an interrupt to roll back, so logging stays up.
    if let Err(e) = ctrlc::set_handler(|| {
        shutdown::request();
        out::print_warn("Received interrupt; stopping and rolling back...");
    }) {
        out::print_warn(&format!("Could not install interrupt handler: {e}"));
    }

    debug!(?args, "starting linkmove");
    dispatch(&args, &cfg)
}
