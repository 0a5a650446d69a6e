//! Stardate clock and drift authority.
//!
//! Produces microsecond-precision stamps for every cycle operation and
//! measures deviation from the baseline captured at construction. The
//! stardate is the canonical Y2K-epoch form: days since
//! 2000-01-01T00:00:00Z, rounded to four decimals. Expected wall time is
//! extrapolated from the baseline at a fixed 86,400 real seconds per
//! stardate unit; `drift_ns` is the signed difference between the actual
//! clock and that extrapolation.
//!
//! Stamping never fails; clock unavailability is not modeled.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unix seconds at the stardate epoch (2000-01-01T00:00:00Z).
const STARDATE_EPOCH_UNIX_SECS: f64 = 946_684_800.0;

/// Real seconds per stardate unit.
const SECS_PER_STARDATE: f64 = 86_400.0;

/// Hex characters kept from the anchor digest.
const ANCHOR_LEN: usize = 16;

/// One clock reading with all timing representations attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleStamp {
    /// Wall-clock time in microseconds since the Unix epoch.
    pub time_micros: f64,
    /// RFC 3339 instant, microsecond precision, UTC.
    pub iso: String,
    /// Y2K-epoch stardate, rounded to four decimals.
    pub stardate: f64,
    /// Wall-clock time in integer nanoseconds since the Unix epoch.
    pub unix_ns: i64,
    /// Signed deviation from the extrapolated baseline, in nanoseconds.
    pub drift_ns: i64,
    /// Short deterministic fingerprint for cycle tracking. Not a signature.
    pub anchor_hash: String,
}

/// Clock authority holding the drift baseline and the anchor sequence.
///
/// One instance per orchestrator; the baseline pair is captured once at
/// construction and never moves, so drift accumulates against process
/// start rather than resetting per cycle.
pub struct StardateClock {
    system_name: String,
    baseline_wall_ns: i64,
    baseline_stardate: f64,
    sequence: AtomicU64,
}

impl StardateClock {
    /// Capture the drift baseline now and start the anchor sequence at zero.
    pub fn new(system_name: impl Into<String>) -> Self {
        let wall = Utc::now();
        Self {
            system_name: system_name.into(),
            baseline_wall_ns: wall_ns(&wall),
            baseline_stardate: stardate_of(&wall),
            sequence: AtomicU64::new(0),
        }
    }

    /// Construct against an explicit baseline pair. Used by drift tests to
    /// force a known deviation.
    pub fn with_baseline(
        system_name: impl Into<String>,
        baseline_wall_ns: i64,
        baseline_stardate: f64,
    ) -> Self {
        Self {
            system_name: system_name.into(),
            baseline_wall_ns,
            baseline_stardate,
            sequence: AtomicU64::new(0),
        }
    }

    /// Take one reading. Always succeeds.
    pub fn now(&self) -> CycleStamp {
        let wall = Utc::now();
        let unix_ns = wall_ns(&wall);
        let stardate = stardate_of(&wall);

        // Extrapolate expected elapsed time from the stardate delta; the
        // subtraction keeps the arithmetic in elapsed-nanosecond range
        // where f64 is exact.
        let elapsed_ns = unix_ns - self.baseline_wall_ns;
        let expected_elapsed_ns =
            (stardate - self.baseline_stardate) * SECS_PER_STARDATE * 1e9;
        let drift_ns = (elapsed_ns as f64 - expected_elapsed_ns) as i64;

        let iso = wall.to_rfc3339_opts(SecondsFormat::Micros, true);
        let anchor_hash = self.anchor(&iso, stardate);

        CycleStamp {
            time_micros: unix_ns as f64 / 1_000.0,
            iso,
            stardate,
            unix_ns,
            drift_ns,
            anchor_hash,
        }
    }

    /// Current stardate without taking a full reading.
    pub fn stardate(&self) -> f64 {
        stardate_of(&Utc::now())
    }

    /// Name recorded into vault metadata.
    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    /// Deterministic anchor fingerprint: system name, instant, stardate and
    /// a monotonically increasing sequence number, digested and truncated.
    fn anchor(&self, iso: &str, stardate: f64) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let material = format!("{}-{}-{}-{}", self.system_name, iso, stardate, seq);
        let digest = format!("{:x}", md5::compute(material.as_bytes()));
        digest[..ANCHOR_LEN].to_string()
    }
}

/// Wall-clock nanoseconds since the Unix epoch.
///
/// `timestamp_nanos_opt` only returns `None` outside the i64 range
/// (beyond the year 2262); saturate rather than fail.
fn wall_ns(wall: &DateTime<Utc>) -> i64 {
    wall.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Y2K-epoch stardate for an instant, rounded to four decimals.
fn stardate_of(wall: &DateTime<Utc>) -> f64 {
    let unix_secs =
        wall.timestamp() as f64 + f64::from(wall.timestamp_subsec_nanos()) / 1e9;
    let days = (unix_secs - STARDATE_EPOCH_UNIX_SECS) / SECS_PER_STARDATE;
    (days * 10_000.0).round() / 10_000.0
}
