//! JSONL run journal: append-only line-delimited JSON, one object per line.
//!
//! Lines are assembled in memory and written atomically via `write_all` so a
//! process tailing the journal never sees a partial line.
//!
//! Degradation chain when the file cannot be written:
//! 1. Primary journal path
//! 2. stderr with a `[WLS-JOURNAL]` prefix
//! 3. Silent discard (a run must never fail because its journal did)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::config::PathsConfig;
use crate::core::errors::{Result, WlsError};

/// Severity attached to each journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Record types in the run journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    RunStart,
    PhaseChange,
    Tick,
    DrainStart,
    RunAbort,
    RunStop,
    Error,
}

/// A single journal line. Only `ts`, `event`, and `severity` are always set;
/// everything else is populated per record kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Record type identifier.
    pub event: RecordKind,
    /// Severity level.
    pub severity: Severity,
    /// 1-based poll sequence number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Shape-clock position when the record was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    /// Phase label or `from->to` transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Worker count the shape asked for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_users: Option<u32>,
    /// Worker count the pool held.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_workers: Option<u32>,
    /// Spawn-rate ceiling in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_rate: Option<f64>,
    /// Outcome label on run_stop records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Total polls on run_stop records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u64>,
    /// Highest target seen, on run_stop records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_target: Option<u32>,
    /// Highest active count seen, on run_stop records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_active: Option<u32>,
    /// Wall time of the run, on run_stop records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wall_seconds: Option<f64>,
    /// Stable error code if something failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JournalRecord {
    /// Create a record stamped with the current UTC time.
    pub fn new(event: RecordKind, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            seq: None,
            elapsed_seconds: None,
            phase: None,
            target_users: None,
            active_workers: None,
            spawn_rate: None,
            outcome: None,
            ticks: None,
            peak_target: None,
            peak_active: None,
            wall_seconds: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the journal writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Writing to the journal file.
    File,
    /// File failed; echoing records to stderr.
    Stderr,
    /// Everything failed; silently discarding.
    Discard,
}

/// Configuration for the journal writer.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Journal file path.
    pub path: PathBuf,
    /// Maximum file size before rotation (bytes). Default: 32 MiB.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep. Default: 4.
    pub max_rotated_files: u32,
    /// Seconds between forced fsync calls. Default: 30.
    pub fsync_interval_secs: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: PathsConfig::default().journal_file,
            max_size_bytes: 32 * 1024 * 1024,
            max_rotated_files: 4,
            fsync_interval_secs: 30,
        }
    }
}

impl JournalConfig {
    /// Default rotation and fsync settings at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Append-only journal writer with rotation and stderr fallback.
pub struct JournalWriter {
    config: JournalConfig,
    writer: Option<BufWriter<File>>,
    state: SinkState,
    bytes_written: u64,
    last_fsync: SystemTime,
}

impl JournalWriter {
    /// Open the journal file. Falls through the degradation chain on failure.
    pub fn open(config: JournalConfig) -> Self {
        let mut journal = Self {
            config,
            writer: None,
            state: SinkState::Discard,
            bytes_written: 0,
            last_fsync: SystemTime::now(),
        };
        journal.try_open_file();
        journal
    }

    /// Append a record as one atomic JSONL line.
    pub fn write_record(&mut self, record: &JournalRecord) {
        let line = match serde_json::to_string(record) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                // A record that cannot serialize is a programming error.
                let _ = writeln!(io::stderr(), "[WLS-JOURNAL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffered lines to the file.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Force an fsync on the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
            self.last_fsync = SystemTime::now();
        }
    }

    /// Current degradation state as a stable label.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            SinkState::File => "file",
            SinkState::Stderr => "stderr",
            SinkState::Discard => "discard",
        }
    }

    /// Bytes written to the current journal file.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.state == SinkState::File
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            SinkState::File => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line); // retry at the next level
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                    self.maybe_fsync();
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            SinkState::Stderr => {
                let _ = write!(io::stderr(), "[WLS-JOURNAL] {line}");
            }
            SinkState::Discard => {}
        }
    }

    fn maybe_fsync(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(self.last_fsync)
            .unwrap_or(Duration::ZERO);
        if elapsed.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    fn try_open_file(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.state = SinkState::File;
                self.bytes_written = size;
            }
            Err(_) => {
                self.state = SinkState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[WLS-JOURNAL] cannot open {}, echoing records to stderr",
                    self.config.path.display()
                );
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            SinkState::File => {
                self.state = SinkState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[WLS-JOURNAL] journal write failed, echoing records to stderr"
                );
            }
            SinkState::Stderr => {
                self.state = SinkState::Discard;
            }
            SinkState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;
        let base = self.config.path.clone();

        // Shift existing rotations: .3→.4, .2→.3, .1→.2, current→.1, oldest dropped.
        for i in (1..self.config.max_rotated_files).rev() {
            let _ = rename(rotated_name(&base, i), rotated_name(&base, i + 1));
        }
        let _ = fs::remove_file(rotated_name(&base, self.config.max_rotated_files));
        let _ = rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(64 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(file, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| WlsError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| WlsError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Build a rotated filename: `run-journal.jsonl` → `run-journal.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Current UTC time as ISO 8601 with millisecond precision.
pub(crate) fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(path: PathBuf) -> JournalConfig {
        JournalConfig {
            path,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 60,
        }
    }

    #[test]
    fn records_come_out_as_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut journal = JournalWriter::open(test_config(path.clone()));

        let mut record = JournalRecord::new(RecordKind::RunStart, Severity::Info);
        record.details = Some("version=0.3.1".to_string());
        journal.write_record(&record);
        journal.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "run_start");
        assert_eq!(parsed["severity"], "info");
        assert_eq!(parsed["details"], "version=0.3.1");
    }

    #[test]
    fn unset_fields_stay_off_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut journal = JournalWriter::open(test_config(path.clone()));

        journal.write_record(&JournalRecord::new(RecordKind::DrainStart, Severity::Info));
        journal.flush();

        let line = fs::read_to_string(&path).unwrap();
        assert!(!line.contains("\"seq\""));
        assert!(!line.contains("\"target_users\""));
        assert!(!line.contains("\"error_code\""));
    }

    #[test]
    fn each_record_is_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.jsonl");
        let mut journal = JournalWriter::open(test_config(path.clone()));

        for seq in 1..=5 {
            let mut record = JournalRecord::new(RecordKind::Tick, Severity::Info);
            record.seq = Some(seq);
            journal.write_record(&record);
        }
        journal.flush();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 5);
        for line in contents.lines() {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let config = JournalConfig {
            path: path.clone(),
            max_size_bytes: 100, // tiny: force rotation after ~1 record
            max_rotated_files: 3,
            fsync_interval_secs: 60,
        };
        let mut journal = JournalWriter::open(config);

        for _ in 0..10 {
            journal.write_record(&JournalRecord::new(RecordKind::Tick, Severity::Info));
        }
        journal.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
    }

    #[test]
    fn unwritable_path_degrades_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so the journal cannot open.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let mut journal = JournalWriter::open(test_config(blocker.join("run.jsonl")));
        assert_eq!(journal.state(), "stderr");
        // Writing must not panic while degraded.
        journal.write_record(&JournalRecord::new(RecordKind::Error, Severity::Warning));
    }

    #[test]
    fn healthy_writer_reports_file_state() {
        let dir = tempfile::tempdir().unwrap();
        let journal = JournalWriter::open(test_config(dir.path().join("ok.jsonl")));
        assert_eq!(journal.state(), "file");
    }

    #[test]
    fn round_trips_through_serde() {
        let mut record = JournalRecord::new(RecordKind::Tick, Severity::Info);
        record.seq = Some(7);
        record.elapsed_seconds = Some(6.0);
        record.phase = Some("ramp_up".to_string());
        record.target_users = Some(40);
        record.active_workers = Some(38);
        record.spawn_rate = Some(10.0);

        let json = serde_json::to_string(&record).unwrap();
        let back: JournalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event, RecordKind::Tick);
        assert_eq!(back.seq, Some(7));
        assert_eq!(back.phase.as_deref(), Some("ramp_up"));
    }
}
