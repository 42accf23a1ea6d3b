use owo_colors::OwoColorize;

use crate::fs_ops::format_bytes;
use crate::progress::MigrationProgress;
use crate::state::{MigrationState, StateReport};

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print a plain user-facing line (no prefix).
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// One progress line: `[3/6]  42.0% Copying files | 1.00 GB / 2.00 GB | 50.00 MB/s`.
pub fn print_progress(p: &MigrationProgress) {
    let phase = format!("[{}/6]", p.phase.number());
    let eta = p
        .eta
        .map(|d| format!(" | ETA {}s", d.as_secs()))
        .unwrap_or_default();
    if is_tty() {
        println!(
            "{} {:>5.1}% {} | {}{}",
            phase.blue().bold(),
            p.percent,
            p.phase_description,
            p.message,
            eta
        );
    } else {
        println!(
            "{} {:>5.1}% {} | {}{}",
            phase, p.percent, p.phase_description, p.message, eta
        );
    }
}

pub fn print_state(report: &StateReport) {
    let label = report.state.to_string();
    let label = if is_tty() {
        match report.state {
            MigrationState::Migrated => label.green().bold().to_string(),
            MigrationState::Pending => label.cyan().bold().to_string(),
            _ => label.yellow().bold().to_string(),
        }
    } else {
        label
    };
    println!("state: {label}");
    println!("  {}", report.message);
    if report.resumable {
        println!("  resumable: yes");
    }
    if let Some(t) = &report.link_target {
        println!("  link target: {}", t.display());
    }
    if let Some(b) = &report.backup_path {
        println!("  backup: {}", b.display());
    }
}

/// Human summary of bytes moved, for the final success line.
pub fn summarize_bytes(total_files: u64, total_bytes: u64) -> String {
    format!("{total_files} files, {}", format_bytes(total_bytes))
}
