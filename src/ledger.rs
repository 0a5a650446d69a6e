//! Append-only cycle ledger.
//!
//! One JSON object per line, one line per lifecycle event. The ledger is
//! the source of truth for cycle durations and the drift history; nothing
//! is ever rewritten or deleted. Appends are serialized by a mutex so
//! concurrent callers cannot interleave partial lines.
//!
//! Duration and drift queries re-scan the log on every call. Cycles are
//! infrequent relative to the expected log size, so the scan stays cheap;
//! an in-memory start-time index would be a drop-in replacement if that
//! ever changes.

use crate::types::{CycleEvent, Operation};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Absolute average drift below this is compliant (1 microsecond).
pub const DRIFT_COMPLIANCE_NS: f64 = 1_000.0;

/// Qualitative grade thresholds on the absolute average drift.
const DRIFT_EXCELLENT_NS: f64 = 100.0;
const DRIFT_GOOD_NS: f64 = 500.0;

/// I/O failures on the append-only log files.
///
/// Non-fatal by policy: callers log the failure and continue the cycle
/// when the write was advisory.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("append lock poisoned")]
    LockPoisoned,
}

// ============================================================================
// Drift report
// ============================================================================

/// Whether the drift aggregation had anything to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    NoData,
    Calculated,
}

/// Qualitative drift grade from the absolute average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftGrade {
    Excellent,
    Good,
    Warning,
    Unknown,
}

/// Aggregate over every `drift_ns` sample in the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub status: ReportStatus,
    pub drift_status: DriftGrade,
    pub average_drift_ns: f64,
    pub max_drift_ns: f64,
    pub min_drift_ns: f64,
    pub sample_count: usize,
    pub compliant: bool,
}

impl DriftReport {
    /// Report for an empty ledger: nothing measured, nothing violated.
    fn no_data() -> Self {
        Self {
            status: ReportStatus::NoData,
            drift_status: DriftGrade::Unknown,
            average_drift_ns: 0.0,
            max_drift_ns: 0.0,
            min_drift_ns: 0.0,
            sample_count: 0,
            compliant: true,
        }
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Append-only audit trail over a single JSONL file.
pub struct CycleLedger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl CycleLedger {
    /// Open or create the ledger file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Append one event as a single line and flush it.
    ///
    /// The mutex guarantees line-atomicity under concurrent callers;
    /// events from one caller land in issue order.
    pub fn append(&self, event: &CycleEvent) -> Result<(), StorageError> {
        let line = serde_json::to_string(event)?;
        let mut file = self.writer.lock().map_err(|_| StorageError::LockPoisoned)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// All parseable events, oldest first. Malformed lines are skipped,
    /// a missing file reads as empty.
    pub fn events(&self) -> Vec<CycleEvent> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger read failed");
                return Vec::new();
            }
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<CycleEvent>(&line).ok())
            .collect()
    }

    /// Wall-clock duration of a cycle in milliseconds: first `cycle_start`
    /// to last `cycle_end` for the id, 0.0 when either is missing.
    pub fn duration_ms(&self, cycle_id: &str) -> f64 {
        let mut start: Option<f64> = None;
        let mut end: Option<f64> = None;

        for event in self.events() {
            if event.cycle_id != cycle_id {
                continue;
            }
            match event.operation {
                Operation::CycleStart => {
                    if start.is_none() {
                        start = Some(event.time_micros);
                    }
                }
                Operation::CycleEnd => end = Some(event.time_micros),
                _ => {}
            }
        }

        match (start, end) {
            (Some(s), Some(e)) => (e - s) / 1_000.0,
            _ => 0.0,
        }
    }

    /// True when the cycle already has a terminal event.
    pub fn has_terminal(&self, cycle_id: &str) -> bool {
        self.events()
            .iter()
            .any(|e| e.cycle_id == cycle_id && e.operation == Operation::CycleEnd)
    }

    /// The most recent `limit` events, oldest of the window first.
    pub fn recent_events(&self, limit: usize) -> Vec<CycleEvent> {
        let events = self.events();
        let skip = events.len().saturating_sub(limit);
        events.into_iter().skip(skip).collect()
    }

    /// Aggregate every drift sample in the ledger.
    pub fn drift_report(&self) -> DriftReport {
        let samples: Vec<f64> = self
            .events()
            .iter()
            .map(|e| e.drift_ns as f64)
            .collect();

        if samples.is_empty() {
            return DriftReport::no_data();
        }

        let average = Statistics::mean(&samples);
        let max = Statistics::max(&samples);
        let min = Statistics::min(&samples);

        let drift_status = if average.abs() < DRIFT_EXCELLENT_NS {
            DriftGrade::Excellent
        } else if average.abs() < DRIFT_GOOD_NS {
            DriftGrade::Good
        } else {
            DriftGrade::Warning
        };

        DriftReport {
            status: ReportStatus::Calculated,
            drift_status,
            average_drift_ns: average,
            max_drift_ns: max,
            min_drift_ns: min,
            sample_count: samples.len(),
            compliant: average.abs() < DRIFT_COMPLIANCE_NS,
        }
    }

    /// Path of the backing file (diagnostics only).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CycleType;
    use std::sync::Arc;

    fn make_event(
        cycle_id: &str,
        operation: Operation,
        time_micros: f64,
        drift_ns: i64,
    ) -> CycleEvent {
        CycleEvent {
            cycle_id: cycle_id.to_string(),
            cycle_type: Some(CycleType::A),
            time_micros,
            stardate: 9_700.1234,
            operation,
            vault_operation: None,
            verdict_status: None,
            drift_ns,
        }
    }

    fn open_temp() -> (tempfile::TempDir, CycleLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = CycleLedger::open(dir.path().join("logs/cycle_events.jsonl")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_append_and_read_back() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 1_000.0, 10))
            .unwrap();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleEnd, 4_000.0, 20))
            .unwrap();

        let events = ledger.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, Operation::CycleStart);
        assert_eq!(events[1].operation, Operation::CycleEnd);
    }

    #[test]
    fn test_duration_from_start_and_end() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 1_000.0, 0))
            .unwrap();
        ledger
            .append(&make_event("CYC_000001_A", Operation::VaultCheck, 2_000.0, 0))
            .unwrap();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleEnd, 6_000.0, 0))
            .unwrap();

        assert!((ledger.duration_ms("CYC_000001_A") - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_zero_when_terminal_missing() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 1_000.0, 0))
            .unwrap();

        assert_eq!(ledger.duration_ms("CYC_000001_A"), 0.0);
        assert_eq!(ledger.duration_ms("CYC_999999_B"), 0.0);
    }

    #[test]
    fn test_duration_ignores_other_cycles() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 1_000.0, 0))
            .unwrap();
        ledger
            .append(&make_event("CYC_000002_B", Operation::CycleStart, 2_000.0, 0))
            .unwrap();
        ledger
            .append(&make_event("CYC_000002_B", Operation::CycleEnd, 9_000.0, 0))
            .unwrap();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleEnd, 3_000.0, 0))
            .unwrap();

        assert!((ledger.duration_ms("CYC_000001_A") - 2.0).abs() < f64::EPSILON);
        assert!((ledger.duration_ms("CYC_000002_B") - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle_events.jsonl");
        let ledger = CycleLedger::open(&path).unwrap();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 1_000.0, 0))
            .unwrap();
        std::fs::write(
            &path,
            format!(
                "{}\nnot json at all\n",
                serde_json::to_string(&make_event(
                    "CYC_000001_A",
                    Operation::CycleStart,
                    1_000.0,
                    0
                ))
                .unwrap()
            ),
        )
        .unwrap();

        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_drift_report_thresholds() {
        let (_dir, ledger) = open_temp();
        for (i, drift) in [50_i64, -30, 40].iter().enumerate() {
            ledger
                .append(&make_event(
                    "CYC_000001_A",
                    Operation::VaultCheck,
                    i as f64,
                    *drift,
                ))
                .unwrap();
        }

        let report = ledger.drift_report();
        assert_eq!(report.status, ReportStatus::Calculated);
        assert_eq!(report.sample_count, 3);
        assert_eq!(report.drift_status, DriftGrade::Excellent);
        assert!(report.compliant);
        assert!((report.average_drift_ns - 20.0).abs() < 1e-9);
        assert_eq!(report.max_drift_ns, 50.0);
        assert_eq!(report.min_drift_ns, -30.0);
    }

    #[test]
    fn test_drift_compliance_boundary() {
        let (_dir, ledger) = open_temp();
        // Average of exactly 1000 is out of tolerance; 999 is within.
        ledger
            .append(&make_event("a", Operation::VaultCheck, 0.0, 999))
            .unwrap();
        assert!(ledger.drift_report().compliant);

        let (_dir2, ledger2) = open_temp();
        ledger2
            .append(&make_event("a", Operation::VaultCheck, 0.0, 1_000))
            .unwrap();
        let report = ledger2.drift_report();
        assert!(!report.compliant);
        assert_eq!(report.drift_status, DriftGrade::Warning);
    }

    #[test]
    fn test_drift_grades() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("a", Operation::VaultCheck, 0.0, 300))
            .unwrap();
        let report = ledger.drift_report();
        assert_eq!(report.drift_status, DriftGrade::Good);
        assert!(report.compliant);
    }

    #[test]
    fn test_drift_report_empty_ledger() {
        let (_dir, ledger) = open_temp();
        let report = ledger.drift_report();
        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.drift_status, DriftGrade::Unknown);
        assert_eq!(report.sample_count, 0);
        assert!(report.compliant);
    }

    #[test]
    fn test_recent_events_window() {
        let (_dir, ledger) = open_temp();
        for i in 0..30 {
            ledger
                .append(&make_event(
                    &format!("CYC_{:06}_A", i),
                    Operation::CycleStart,
                    i as f64,
                    0,
                ))
                .unwrap();
        }

        let recent = ledger.recent_events(20);
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].cycle_id, "CYC_000010_A");
        assert_eq!(recent[19].cycle_id, "CYC_000029_A");

        // Window larger than the log returns everything.
        assert_eq!(ledger.recent_events(100).len(), 30);
    }

    #[test]
    fn test_has_terminal() {
        let (_dir, ledger) = open_temp();
        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleStart, 0.0, 0))
            .unwrap();
        assert!(!ledger.has_terminal("CYC_000001_A"));

        ledger
            .append(&make_event("CYC_000001_A", Operation::CycleEnd, 1.0, 0))
            .unwrap();
        assert!(ledger.has_terminal("CYC_000001_A"));
    }

    #[test]
    fn test_concurrent_appends_stay_line_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            CycleLedger::open(dir.path().join("cycle_events.jsonl")).unwrap(),
        );

        let mut handles = Vec::new();
        for t in 0..4 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    ledger
                        .append(&make_event(
                            &format!("CYC_{:02}{:04}_A", t, i),
                            Operation::VaultCheck,
                            i as f64,
                            0,
                        ))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every line must parse: no interleaved partial writes.
        assert_eq!(ledger.events().len(), 200);
    }
}
