//! Copy progress estimation.
//!
//! Combines two signals each poll tick: bytes present under the destination
//! and the output parser's per-file counters. The parser is preferred while
//! it has file context, because on-disk size lags behind pre-allocated or
//! partially flushed files. Speed is an exponential moving average.

use std::time::Duration;

use super::parser::ParserSnapshot;
use crate::fs_ops::{format_bytes, format_speed};

/// Weight of the newest speed sample.
pub const SPEED_SMOOTHING: f64 = 0.3;
/// Ticks without on-disk growth before the message switches to "Processing...".
pub const STALL_TICKS: u32 = 10;
/// Speeds below this (bytes/s) count as stalled.
pub const STALL_SPEED: f64 = 1024.0;

/// Copy phase occupies 10..90 of the overall percentage.
const COPY_BASE_PERCENT: f64 = 10.0;
const COPY_SPAN_PERCENT: f64 = 80.0;

/// Output of one estimator tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyEstimate {
    pub copied_bytes: u64,
    pub total_bytes: u64,
    pub speed_bytes_per_sec: f64,
    pub eta: Option<Duration>,
    /// Percent within the copy phase, 0..=100.
    pub copy_percent: f64,
    /// Overall percent, 10..=90.
    pub percent: f64,
    pub stalled: bool,
}

impl CopyEstimate {
    pub fn message(&self) -> String {
        let tail = if self.stalled {
            "Processing...".to_string()
        } else {
            format_speed(self.speed_bytes_per_sec)
        };
        format!(
            "{:.1}% | {} / {} | {}",
            self.copy_percent,
            format_bytes(self.copied_bytes),
            format_bytes(self.total_bytes),
            tail
        )
    }
}

/// Per-run estimator state. One instance per copy phase.
#[derive(Debug)]
pub struct ProgressEstimator {
    total_bytes: u64,
    prev_on_disk: u64,
    prev_reported: u64,
    prev_elapsed: Duration,
    displayed: u64,
    smoothed_speed: f64,
    no_change_ticks: u32,
}

impl ProgressEstimator {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            prev_on_disk: 0,
            prev_reported: 0,
            prev_elapsed: Duration::ZERO,
            displayed: 0,
            smoothed_speed: 0.0,
            no_change_ticks: 0,
        }
    }

    pub fn smoothed_speed(&self) -> f64 {
        self.smoothed_speed
    }

    /// Fold in one sample. `elapsed` is time since the copy started.
    pub fn tick(&mut self, elapsed: Duration, on_disk: u64, snap: &ParserSnapshot) -> CopyEstimate {
        let dt = elapsed.saturating_sub(self.prev_elapsed).as_secs_f64();
        let disk_delta = on_disk.saturating_sub(self.prev_on_disk);
        if disk_delta == 0 {
            self.no_change_ticks = self.no_change_ticks.saturating_add(1);
        } else {
            self.no_change_ticks = 0;
        }

        let parser_bytes = snap.estimated_bytes().min(self.total_bytes);
        let use_parser = snap.has_estimate() && parser_bytes > 0;

        // One speed sample per tick, from whichever signal drives the display.
        let sample = if use_parser {
            parser_bytes.saturating_sub(self.prev_reported)
        } else {
            disk_delta
        };
        if dt > 0.0 {
            let instant = sample as f64 / dt;
            if instant > 0.0 {
                self.smoothed_speed = if self.smoothed_speed <= 0.0 {
                    instant
                } else {
                    SPEED_SMOOTHING * instant + (1.0 - SPEED_SMOOTHING) * self.smoothed_speed
                };
            }
        }

        let candidate = if use_parser {
            parser_bytes
        } else if self.displayed == 0 && on_disk == 0 {
            0
        } else {
            // Integrate speed, but never run ahead of what is actually on disk.
            let advanced = self.displayed as f64 + self.smoothed_speed * dt;
            (advanced.round() as u64).min(on_disk)
        };
        self.displayed = self.displayed.max(candidate).min(self.total_bytes);

        self.prev_on_disk = on_disk;
        self.prev_elapsed = elapsed;
        self.prev_reported = self.displayed;

        self.estimate()
    }

    fn estimate(&self) -> CopyEstimate {
        let copy_percent = if self.total_bytes > 0 {
            (self.displayed as f64 * 100.0 / self.total_bytes as f64).min(100.0)
        } else {
            0.0
        };
        let eta = (self.smoothed_speed > 0.0 && self.total_bytes > 0).then(|| {
            let remaining = self.total_bytes.saturating_sub(self.displayed) as f64;
            Duration::from_secs((remaining / self.smoothed_speed).ceil() as u64)
        });
        CopyEstimate {
            copied_bytes: self.displayed,
            total_bytes: self.total_bytes,
            speed_bytes_per_sec: self.smoothed_speed,
            eta,
            copy_percent,
            percent: COPY_BASE_PERCENT + copy_percent * COPY_SPAN_PERCENT / 100.0,
            stalled: self.no_change_ticks >= STALL_TICKS && self.smoothed_speed < STALL_SPEED,
        }
    }
}
