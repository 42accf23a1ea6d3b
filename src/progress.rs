//! Progress snapshots, the phase table and the two observer sinks.
//!
//! A run reports through a `Reporter`: structured `MigrationProgress`
//! snapshots and free-text log lines. Both sinks are optional; log lines are
//! always mirrored into `tracing`, so a run without observers still leaves a
//! trail in the configured log output.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationMode {
    /// Copy source to target and replace source with a link.
    Migrate,
    /// Copy the linked data back and replace the link with a real directory.
    Restore,
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationMode::Migrate => f.write_str("migrate"),
            MigrationMode::Restore => f.write_str("restore"),
        }
    }
}

/// The six phases of a run plus the terminal `Done` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Phase {
    Validate,
    Scan,
    Copy,
    Link,
    Verify,
    Cleanup,
    Done,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Validate,
        Phase::Scan,
        Phase::Copy,
        Phase::Link,
        Phase::Verify,
        Phase::Cleanup,
    ];

    /// 1-based phase number; `Done` reports as phase 6.
    pub fn number(self) -> u8 {
        match self {
            Phase::Validate => 1,
            Phase::Scan => 2,
            Phase::Copy => 3,
            Phase::Link => 4,
            Phase::Verify => 5,
            Phase::Cleanup | Phase::Done => 6,
        }
    }

    /// Overall percent at which the phase starts.
    /// Copy owns the 10..90 sub-range and reports its own percentages.
    pub fn base_percent(self) -> f64 {
        match self {
            Phase::Validate => 0.0,
            Phase::Scan => 5.0,
            Phase::Copy => 10.0,
            Phase::Link => 90.0,
            Phase::Verify => 93.0,
            Phase::Cleanup => 96.0,
            Phase::Done => 100.0,
        }
    }

    pub fn description(self, mode: MigrationMode) -> &'static str {
        match (mode, self) {
            (_, Phase::Validate) => "Validating paths",
            (MigrationMode::Migrate, Phase::Scan) => "Scanning source directory",
            (MigrationMode::Restore, Phase::Scan) => "Scanning data directory",
            (MigrationMode::Migrate, Phase::Copy) => "Copying files",
            (MigrationMode::Restore, Phase::Copy) => "Restoring files",
            (MigrationMode::Migrate, Phase::Link) => "Creating symbolic link",
            (MigrationMode::Restore, Phase::Link) => "Removing symbolic link",
            (MigrationMode::Migrate, Phase::Verify) => "Verifying symbolic link",
            (MigrationMode::Restore, Phase::Verify) => "Verifying restored directory",
            (MigrationMode::Migrate, Phase::Cleanup) => "Cleaning up backup",
            (MigrationMode::Restore, Phase::Cleanup) => "Cleaning up",
            (_, Phase::Done) => "Completed",
        }
    }
}

/// Point-in-time progress snapshot. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationProgress {
    pub percent: f64,
    pub copied_bytes: u64,
    pub total_bytes: u64,
    pub speed_bytes_per_sec: f64,
    #[serde(serialize_with = "serialize_eta", rename = "eta_secs")]
    pub eta: Option<Duration>,
    pub phase: Phase,
    pub phase_description: String,
    pub message: String,
}

fn serialize_eta<S: Serializer>(eta: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match eta {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

impl MigrationProgress {
    /// Snapshot at a phase boundary: percent from the phase table, no byte counts.
    pub fn phase_start(phase: Phase, mode: MigrationMode) -> Self {
        let description = phase.description(mode);
        Self {
            percent: phase.base_percent(),
            copied_bytes: 0,
            total_bytes: 0,
            speed_bytes_per_sec: 0.0,
            eta: None,
            phase,
            phase_description: description.to_string(),
            message: description.to_string(),
        }
    }
}

type ProgressFn = dyn Fn(&MigrationProgress) + Send + Sync;
type LogFn = dyn Fn(&str) + Send + Sync;

/// Observer sinks for one run. Cheap to clone; absent sinks are skipped.
#[derive(Clone, Default)]
pub struct Reporter {
    progress: Option<Arc<ProgressFn>>,
    log: Option<Arc<LogFn>>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("progress", &self.progress.is_some())
            .field("log", &self.log.is_some())
            .finish()
    }
}

impl Reporter {
    /// Reporter with no observers.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&MigrationProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn with_log<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(f));
        self
    }

    pub fn progress(&self, p: &MigrationProgress) {
        if let Some(sink) = &self.progress {
            sink(p);
        }
    }

    pub fn log(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        info!("{msg}");
        if let Some(sink) = &self.log {
            sink(msg);
        }
    }

    /// Same as `log`, but recorded at warn level.
    pub fn warn(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        warn!("{msg}");
        if let Some(sink) = &self.log {
            sink(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn phase_table_matches_percent_ranges() {
        let percents: Vec<f64> = Phase::ALL.iter().map(|p| p.base_percent()).collect();
        assert_eq!(percents, vec![0.0, 5.0, 10.0, 90.0, 93.0, 96.0]);
        assert_eq!(Phase::Done.base_percent(), 100.0);
        assert_eq!(Phase::Done.number(), 6);
        assert_eq!(Phase::Copy.number(), 3);
    }

    #[test]
    fn restore_uses_its_own_descriptions() {
        assert_eq!(
            Phase::Link.description(MigrationMode::Restore),
            "Removing symbolic link"
        );
        assert_eq!(
            Phase::Link.description(MigrationMode::Migrate),
            "Creating symbolic link"
        );
    }

    #[test]
    fn silent_reporter_accepts_everything() {
        let r = Reporter::silent();
        r.log("hello");
        r.warn("careful");
        r.progress(&MigrationProgress::phase_start(Phase::Scan, MigrationMode::Migrate));
    }

    #[test]
    fn sinks_receive_events() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (l, s) = (Arc::clone(&lines), Arc::clone(&seen));
        let r = Reporter::silent()
            .with_log(move |m| l.lock().unwrap().push(m.to_string()))
            .with_progress(move |p| s.lock().unwrap().push(p.percent));
        r.log("one");
        r.progress(&MigrationProgress::phase_start(Phase::Verify, MigrationMode::Migrate));
        assert_eq!(lines.lock().unwrap().as_slice(), ["one"]);
        assert_eq!(seen.lock().unwrap().as_slice(), [93.0]);
    }

    #[test]
    fn eta_serializes_as_seconds() {
        let mut p = MigrationProgress::phase_start(Phase::Copy, MigrationMode::Migrate);
        p.eta = Some(Duration::from_secs(42));
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"eta_secs\":42"));
    }
}
