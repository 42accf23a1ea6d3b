//! Copy phase: run the external mirror tool and report progress while it works.
//!
//! Two reader threads drain the tool's stdout and stderr; stdout lines feed the
//! shared `OutputParser`. The calling thread polls the destination size at a
//! fixed interval, folds both signals through `ProgressEstimator` and emits
//! progress snapshots until the tool exits or the run is cancelled.

pub mod estimator;
pub mod parser;
pub mod process;
pub mod tool;

pub use estimator::{CopyEstimate, ProgressEstimator};
pub use parser::{LineKind, OutputParser, OutputTokens, ParserSnapshot, decode_line};
pub use tool::{MirrorTool, ToolFlavor};

use anyhow::Result;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::errors::MigrationError;
use crate::fs_ops::{directory_size, format_bytes};
use crate::progress::{MigrationMode, MigrationProgress, Phase, Reporter};
use crate::shutdown::CancelToken;

/// Grace period after the readers are up, before the first poll.
const READER_SETTLE: Duration = Duration::from_millis(50);
/// How long a killed tool gets to exit.
const KILL_WAIT: Duration = Duration::from_secs(3);
/// Final size below this fraction of the scanned total triggers a warning.
const INTEGRITY_RATIO: f64 = 0.98;

/// One mirror copy of `source` into `target`.
#[derive(Debug)]
pub struct CopyOperation<'a> {
    pub source: &'a Path,
    pub target: &'a Path,
    pub total_bytes: u64,
    pub threads: u32,
    pub sample_interval: Duration,
    pub tool: &'a MirrorTool,
    pub mode: MigrationMode,
}

fn lock_parser(parser: &Mutex<OutputParser>) -> std::sync::MutexGuard<'_, OutputParser> {
    parser.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CopyOperation<'_> {
    fn snapshot(&self, estimate: &CopyEstimate) -> MigrationProgress {
        MigrationProgress {
            percent: estimate.percent,
            copied_bytes: estimate.copied_bytes,
            total_bytes: self.total_bytes,
            speed_bytes_per_sec: estimate.speed_bytes_per_sec,
            eta: estimate.eta,
            phase: Phase::Copy,
            phase_description: Phase::Copy.description(self.mode).to_string(),
            message: estimate.message(),
        }
    }

    fn spawn(&self) -> Result<std::process::Child, MigrationError> {
        let args = self.tool.args(self.source, self.target, self.threads);
        debug!(program = %self.tool.program.display(), ?args, "spawning copy tool");
        let mut cmd = Command::new(&self.tool.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        process::isolate_process_group(&mut cmd);
        cmd.spawn().map_err(|e| MigrationError::ToolLaunch {
            program: self.tool.program.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Run the copy to completion. Returns the final size of the destination.
    pub fn execute(&self, reporter: &Reporter, cancel: &CancelToken) -> Result<u64> {
        let phase_description = Phase::Copy.description(self.mode);
        reporter.progress(&MigrationProgress {
            message: format!("Preparing to copy {}...", format_bytes(self.total_bytes)),
            ..MigrationProgress::phase_start(Phase::Copy, self.mode)
        });
        reporter.log(format!(
            "Using {} ({} threads): {} -> {}",
            self.tool.display_name(),
            self.threads,
            self.source.display(),
            self.target.display()
        ));

        let mut child = self.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let parser = Mutex::new(OutputParser::new(self.tool.tokens.clone()));

        let status = thread::scope(|scope| -> Result<std::process::ExitStatus> {
            let (ready_tx, ready_rx) = mpsc::channel::<()>();
            let tokens = &self.tool.tokens;
            if let Some(out) = stdout {
                let parser = &parser;
                scope.spawn(move || {
                    let _ = ready_tx.send(());
                    read_stdout(out, tokens, parser, reporter);
                });
            } else {
                drop(ready_tx);
            }
            if let Some(err) = stderr {
                scope.spawn(move || read_stderr(err, tokens, reporter));
            }
            // A closed channel means no stdout reader; nothing to wait for.
            let _ = ready_rx.recv();
            thread::sleep(READER_SETTLE);

            let started = Instant::now();
            let mut estimator = ProgressEstimator::new(self.total_bytes);
            loop {
                if cancel.is_cancelled() {
                    reporter.log("Cancelling: stopping copy tool and its child processes");
                    process::kill_process_tree(&mut child);
                    if process::wait_with_timeout(&mut child, KILL_WAIT).is_none() {
                        warn!("copy tool did not exit after kill");
                    }
                    return Err(MigrationError::Cancelled.into());
                }
                match child.try_wait() {
                    Ok(Some(status)) => return Ok(status),
                    Ok(None) => {}
                    Err(e) => {
                        process::kill_process_tree(&mut child);
                        return Err(anyhow::Error::new(e).context("waiting for copy tool"));
                    }
                }

                thread::sleep(self.sample_interval);

                let on_disk = directory_size(self.target);
                let snap = lock_parser(&parser).snapshot();
                let estimate = estimator.tick(started.elapsed(), on_disk, &snap);
                trace!(
                    on_disk,
                    copied = estimate.copied_bytes,
                    speed = estimate.speed_bytes_per_sec,
                    "copy tick"
                );
                reporter.progress(&self.snapshot(&estimate));
            }
        })?;

        // Killed by a signal: no code, treat as failure.
        let code = status.code().unwrap_or(-1);
        debug!(code, "copy tool exited");
        if !self.tool.is_success(code) {
            return Err(MigrationError::ToolFailed {
                code,
                threshold: self.tool.flavor.failure_threshold(),
            }
            .into());
        }

        let final_size = directory_size(self.target);
        if self.total_bytes > 0 && (final_size as f64) < self.total_bytes as f64 * INTEGRITY_RATIO {
            reporter.warn(format!(
                "Copied size {} is below the scanned size {}; some files may be missing",
                format_bytes(final_size),
                format_bytes(self.total_bytes)
            ));
        }
        reporter.progress(&MigrationProgress {
            percent: Phase::Link.base_percent(),
            copied_bytes: final_size,
            total_bytes: self.total_bytes,
            speed_bytes_per_sec: 0.0,
            eta: None,
            phase: Phase::Copy,
            phase_description: phase_description.to_string(),
            message: format!("Copy complete: {}", format_bytes(final_size)),
        });
        reporter.log(format!("Copy complete: {}", format_bytes(final_size)));
        Ok(final_size)
    }
}

/// Split `input` into lines and decode each one; only EOF or a read error ends it.
fn for_each_line(input: impl Read, tokens: &OutputTokens, mut f: impl FnMut(&str)) {
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                f(&decode_line(raw, tokens));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "copy tool output closed");
                break;
            }
        }
    }
}

fn read_stdout(
    out: impl Read,
    tokens: &OutputTokens,
    parser: &Mutex<OutputParser>,
    reporter: &Reporter,
) {
    for_each_line(out, tokens, |line| {
        let kind = lock_parser(parser).feed(line);
        match kind {
            LineKind::NewFile(size) => trace!(size, line = %line.trim(), "new file"),
            LineKind::Error => reporter.warn(format!("Copy tool: {}", line.trim())),
            LineKind::Percent(_) | LineKind::Other => {}
        }
    });
}

fn read_stderr(err: impl Read, tokens: &OutputTokens, reporter: &Reporter) {
    for_each_line(err, tokens, |line| {
        let line = line.trim();
        if !line.is_empty() {
            reporter.warn(format!("Copy tool: {line}"));
        }
    });
}
