//! Verdict vaults: append-only, partitioned-by-kind record stores.
//!
//! Each kind owns one JSONL file under `{data_dir}/vaults/`. Records are
//! caller payloads merged with stamp metadata; they are never mutated.
//! "Current verdict" is derived by scanning the newest [`SCAN_WINDOW`]
//! records of a kind for the most recent one with `verdict_active = true`.
//!
//! The bounded window keeps lookup cost constant regardless of log growth.
//! An older active verdict beyond the window is invisible; that trade of
//! completeness for latency is policy, not an accident.

use crate::clock::{CycleStamp, StardateClock};
use crate::ledger::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Newest records inspected per scan.
pub const SCAN_WINDOW: usize = 10;

/// The two verdict partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
    APriori,
    APosteriori,
}

impl VaultKind {
    /// Both kinds, scan order used by `check_all`.
    pub const ALL: [VaultKind; 2] = [VaultKind::APriori, VaultKind::APosteriori];

    fn file_name(self) -> &'static str {
        match self {
            VaultKind::APriori => "a_priori_vault.jsonl",
            VaultKind::APosteriori => "a_posteriori_vault.jsonl",
        }
    }
}

impl std::fmt::Display for VaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultKind::APriori => write!(f, "a_priori"),
            VaultKind::APosteriori => write!(f, "a_posteriori"),
        }
    }
}

/// Rejection for a kind string outside the known vocabulary. Raised before
/// any state is touched.
#[derive(Debug, thiserror::Error)]
#[error("unknown vault kind: {0}")]
pub struct UnknownVaultKind(pub String);

impl FromStr for VaultKind {
    type Err = UnknownVaultKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a_priori" => Ok(VaultKind::APriori),
            "a_posteriori" => Ok(VaultKind::APosteriori),
            other => Err(UnknownVaultKind(other.to_string())),
        }
    }
}

/// Outcome classification of one vault scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Empty,
    ActiveVerdict,
    NoActiveVerdict,
    Error,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Empty => write!(f, "empty"),
            ScanStatus::ActiveVerdict => write!(f, "active_verdict"),
            ScanStatus::NoActiveVerdict => write!(f, "no_active_verdict"),
            ScanStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of scanning one vault kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultScan {
    pub found: bool,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Value>,
}

impl VaultScan {
    fn miss(status: ScanStatus) -> Self {
        Self {
            found: false,
            status,
            verdict: None,
        }
    }
}

/// Combined scan over both kinds, as consulted by cycle auto-selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultVerdict {
    pub a_priori: VaultScan,
    pub a_posteriori: VaultScan,
    pub has_verdict: bool,
    pub timestamp: CycleStamp,
}

/// Append-only verdict store over the per-kind JSONL files.
pub struct VaultStore {
    root: PathBuf,
    clock: Arc<StardateClock>,
    append_lock: Mutex<()>,
}

impl VaultStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(
        root: P,
        clock: Arc<StardateClock>,
    ) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            clock,
            append_lock: Mutex::new(()),
        })
    }

    fn path(&self, kind: VaultKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Append one record: the caller payload merged with stamp metadata.
    ///
    /// A non-object payload is kept whole under a `payload` key. Returns
    /// the stamp written into the record. I/O failure is a `StorageError`;
    /// the caller decides whether the write was advisory.
    pub fn store(
        &self,
        kind: VaultKind,
        payload: &Value,
        cycle_id: Option<&str>,
    ) -> Result<CycleStamp, StorageError> {
        let stamp = self.clock.now();

        let mut record = match payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other.clone());
                map
            }
        };
        record.insert("iss_timestamp".to_string(), serde_json::to_value(&stamp)?);
        record.insert(
            "iss_cycle_id".to_string(),
            cycle_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        record.insert(
            "iss_vault_type".to_string(),
            Value::String(kind.to_string()),
        );
        record.insert(
            "iss_system".to_string(),
            Value::String(self.clock.system_name().to_string()),
        );

        let line = serde_json::to_string(&Value::Object(record))?;
        {
            let _guard = self.append_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path(kind))?;
            writeln!(file, "{}", line)?;
            file.flush()?;
        }

        info!(
            vault = %kind,
            cycle_id = cycle_id.unwrap_or("NO_CYCLE"),
            time_micros = stamp.time_micros,
            "vault entry stored"
        );
        Ok(stamp)
    }

    /// Scan one kind for the most recent active verdict within the window.
    ///
    /// Malformed records are skipped; a missing or empty log reads as
    /// `empty`; an unreadable log degrades to `error` rather than failing.
    pub fn scan(&self, kind: VaultKind) -> VaultScan {
        let content = match std::fs::read_to_string(self.path(kind)) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return VaultScan::miss(ScanStatus::Empty);
            }
            Err(e) => {
                warn!(vault = %kind, error = %e, "vault scan failed");
                return VaultScan::miss(ScanStatus::Error);
            }
        };

        let lines: Vec<&str> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return VaultScan::miss(ScanStatus::Empty);
        }

        let window_start = lines.len().saturating_sub(SCAN_WINDOW);
        for line in lines[window_start..].iter().rev() {
            let Ok(entry) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if entry
                .get("verdict_active")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                return VaultScan {
                    found: true,
                    status: ScanStatus::ActiveVerdict,
                    verdict: Some(entry),
                };
            }
        }

        VaultScan::miss(ScanStatus::NoActiveVerdict)
    }

    /// Scan both kinds and combine, stamping the check itself.
    pub fn check_all(&self) -> VaultVerdict {
        let a_priori = self.scan(VaultKind::APriori);
        let a_posteriori = self.scan(VaultKind::APosteriori);
        let has_verdict = a_priori.found || a_posteriori.found;
        VaultVerdict {
            a_priori,
            a_posteriori,
            has_verdict,
            timestamp: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_temp() -> (tempfile::TempDir, VaultStore) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(StardateClock::new("VAULT_TEST"));
        let store = VaultStore::open(dir.path().join("vaults"), clock).unwrap();
        (dir, store)
    }

    #[test]
    fn test_scan_missing_log_is_empty() {
        let (_dir, store) = open_temp();
        let scan = store.scan(VaultKind::APriori);
        assert!(!scan.found);
        assert_eq!(scan.status, ScanStatus::Empty);
    }

    #[test]
    fn test_store_then_scan_finds_active_verdict() {
        let (_dir, store) = open_temp();
        store
            .store(
                VaultKind::APriori,
                &json!({"verdict_active": true, "ruling": "proceed"}),
                Some("CYC_000001_A"),
            )
            .unwrap();

        let scan = store.scan(VaultKind::APriori);
        assert!(scan.found);
        assert_eq!(scan.status, ScanStatus::ActiveVerdict);
        let verdict = scan.verdict.unwrap();
        assert_eq!(verdict["ruling"], "proceed");
        assert_eq!(verdict["iss_vault_type"], "a_priori");
        assert_eq!(verdict["iss_cycle_id"], "CYC_000001_A");
        assert_eq!(verdict["iss_system"], "VAULT_TEST");
        assert!(verdict["iss_timestamp"]["anchor_hash"].is_string());
    }

    #[test]
    fn test_scan_picks_most_recent_active() {
        let (_dir, store) = open_temp();
        for (active, mark) in [(false, "first"), (false, "second"), (true, "third")] {
            store
                .store(
                    VaultKind::APriori,
                    &json!({"verdict_active": active, "mark": mark}),
                    None,
                )
                .unwrap();
        }

        let scan = store.scan(VaultKind::APriori);
        assert!(scan.found);
        assert_eq!(scan.verdict.unwrap()["mark"], "third");
    }

    #[test]
    fn test_inactive_entries_only_is_a_miss() {
        let (_dir, store) = open_temp();
        store
            .store(VaultKind::APosteriori, &json!({"verdict_active": false}), None)
            .unwrap();

        let scan = store.scan(VaultKind::APosteriori);
        assert!(!scan.found);
        assert_eq!(scan.status, ScanStatus::NoActiveVerdict);
    }

    #[test]
    fn test_active_verdict_beyond_window_is_invisible() {
        let (_dir, store) = open_temp();
        store
            .store(VaultKind::APriori, &json!({"verdict_active": true}), None)
            .unwrap();
        for _ in 0..SCAN_WINDOW {
            store
                .store(VaultKind::APriori, &json!({"verdict_active": false}), None)
                .unwrap();
        }

        let scan = store.scan(VaultKind::APriori);
        assert!(!scan.found, "active entry outside the window must not surface");
        assert_eq!(scan.status, ScanStatus::NoActiveVerdict);
    }

    #[test]
    fn test_active_verdict_at_window_edge_is_visible() {
        let (_dir, store) = open_temp();
        store
            .store(VaultKind::APriori, &json!({"verdict_active": true, "mark": "edge"}), None)
            .unwrap();
        for _ in 0..(SCAN_WINDOW - 1) {
            store
                .store(VaultKind::APriori, &json!({"verdict_active": false}), None)
                .unwrap();
        }

        let scan = store.scan(VaultKind::APriori);
        assert!(scan.found);
        assert_eq!(scan.verdict.unwrap()["mark"], "edge");
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let (dir, store) = open_temp();
        store
            .store(VaultKind::APriori, &json!({"verdict_active": true, "mark": "ok"}), None)
            .unwrap();

        let path = dir.path().join("vaults/a_priori_vault.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{{{ definitely not json\n");
        std::fs::write(&path, content).unwrap();

        let scan = store.scan(VaultKind::APriori);
        assert!(scan.found);
        assert_eq!(scan.verdict.unwrap()["mark"], "ok");
    }

    #[test]
    fn test_non_object_payload_is_wrapped() {
        let (_dir, store) = open_temp();
        store
            .store(VaultKind::APriori, &json!("bare string"), None)
            .unwrap();

        let scan = store.scan(VaultKind::APriori);
        // Wrapped payloads carry no verdict_active flag, so no verdict.
        assert!(!scan.found);
        assert_eq!(scan.status, ScanStatus::NoActiveVerdict);
    }

    #[test]
    fn test_check_all_combines_kinds() {
        let (_dir, store) = open_temp();
        let before = store.check_all();
        assert!(!before.has_verdict);
        assert_eq!(before.a_priori.status, ScanStatus::Empty);

        store
            .store(VaultKind::APosteriori, &json!({"verdict_active": true}), None)
            .unwrap();

        let after = store.check_all();
        assert!(after.has_verdict);
        assert!(!after.a_priori.found);
        assert!(after.a_posteriori.found);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "a_postiori".parse::<VaultKind>().unwrap_err();
        assert!(err.to_string().contains("a_postiori"));
        assert_eq!("a_priori".parse::<VaultKind>().unwrap(), VaultKind::APriori);
        assert_eq!(
            "a_posteriori".parse::<VaultKind>().unwrap(),
            VaultKind::APosteriori
        );
    }
}
