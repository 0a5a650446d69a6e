//! Core types shared across the synchrometer modules.
//!
//! Everything that crosses a module boundary lives here: cycle identity,
//! ledger event records, request/result shapes for the orchestrator, and
//! the status surface handed to the front-end layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::clock::CycleStamp;
use crate::ledger::DriftReport;
use crate::vault::VaultVerdict;

// ============================================================================
// Cycle identity
// ============================================================================

/// Workflow variant for a cycle.
///
/// `A` is the verdict-driven short path; `B` is the full pipeline with
/// dual dispatch and core reasoning fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleType {
    A,
    B,
}

impl std::fmt::Display for CycleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleType::A => write!(f, "A"),
            CycleType::B => write!(f, "B"),
        }
    }
}

/// Terminal status of a finished cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Completed,
    Aborted,
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStatus::Completed => write!(f, "completed"),
            CycleStatus::Aborted => write!(f, "aborted"),
        }
    }
}

// ============================================================================
// Ledger events
// ============================================================================

/// Lifecycle operation recorded against a cycle.
///
/// Bookkeeping operations (`cycle_start`, `vault_check`, ...) come from the
/// cycle state machine itself; the remaining variants are recorded when the
/// corresponding pipeline stage is attempted, so the ledger shows exactly
/// how far a cycle got before completing or aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CycleStart,
    CycleEnd,
    VaultCheck,
    VaultStore,
    HarmonizerPing,
    Confirm,
    Harmonize,
    Output,
    NoVerdictConfirm,
    DualDispatch,
    SynapticDistribute,
    Resonate,
    CoreReasoning,
    FinalHarmonize,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::CycleStart => "cycle_start",
            Operation::CycleEnd => "cycle_end",
            Operation::VaultCheck => "vault_check",
            Operation::VaultStore => "vault_store",
            Operation::HarmonizerPing => "harmonizer_ping",
            Operation::Confirm => "confirm",
            Operation::Harmonize => "harmonize",
            Operation::Output => "output",
            Operation::NoVerdictConfirm => "no_verdict_confirm",
            Operation::DualDispatch => "dual_dispatch",
            Operation::SynapticDistribute => "synaptic_distribute",
            Operation::Resonate => "resonate",
            Operation::CoreReasoning => "core_reasoning",
            Operation::FinalHarmonize => "final_harmonize",
        };
        write!(f, "{}", name)
    }
}

/// One append-only ledger record: a single lifecycle event for a cycle,
/// stamped at microsecond precision. Immutable once written.
///
/// `cycle_type` is `None` for events recorded outside any cycle (e.g. a
/// vault store issued directly through the API surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleEvent {
    pub cycle_id: String,
    pub cycle_type: Option<CycleType>,
    pub time_micros: f64,
    pub stardate: f64,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict_status: Option<String>,
    pub drift_ns: i64,
}

// ============================================================================
// Orchestrator request / result
// ============================================================================

/// A request to run one cycle.
///
/// When `cycle_type` is `None` the orchestrator auto-selects the variant by
/// consulting the verdict store; `force` biases auto-selection to the full
/// pipeline even when an active verdict exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleRequest {
    pub cycle_type: Option<CycleType>,
    pub input: Option<Value>,
    #[serde(default)]
    pub force: bool,
}

impl CycleRequest {
    /// Request an auto-selected cycle with the given input payload.
    pub fn auto(input: Value) -> Self {
        Self {
            cycle_type: None,
            input: Some(input),
            force: false,
        }
    }

    /// Request an explicit cycle variant.
    pub fn of_type(cycle_type: CycleType) -> Self {
        Self {
            cycle_type: Some(cycle_type),
            input: None,
            force: false,
        }
    }

    /// Attach an input payload.
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

/// Drift verdict attached to a finished cycle, derived from the final
/// stamp's deviation against the 1 microsecond tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftCompliance {
    Acceptable,
    Warning,
}

impl std::fmt::Display for DriftCompliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftCompliance::Acceptable => write!(f, "acceptable"),
            DriftCompliance::Warning => write!(f, "warning"),
        }
    }
}

/// Structured outcome of one cycle execution. Every request that is not
/// rejected outright produces one of these, aborted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: String,
    pub cycle_type: CycleType,
    pub status: CycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub duration_ms: f64,
    pub drift_status: DriftCompliance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_verdict: Option<VaultVerdict>,
    /// Raw output of every attempted stage, keyed by operation name.
    /// Fan-out stages nest one entry per slot; failed slots carry the
    /// `{"error": "failed"}` placeholder.
    pub stages: BTreeMap<String, Value>,
}

impl CycleResult {
    /// True when the cycle ran to its terminal `END` state without abort.
    pub fn is_completed(&self) -> bool {
        self.status == CycleStatus::Completed
    }
}

// ============================================================================
// Status surface
// ============================================================================

/// Snapshot of the orchestrator handed to the front-end layer.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub active: bool,
    pub current_cycle_id: Option<String>,
    pub total_cycles: u64,
    pub drift_report: DriftReport,
    pub compliant: bool,
    pub healthy: bool,
    pub stardate: f64,
}

/// Outcome of an emergency stop request.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub status: StopStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_cycle_id: Option<String>,
    pub timestamp: CycleStamp,
}

/// Whether an emergency stop actually interrupted anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    EmergencyStopped,
    NoActiveCycle,
}

/// Acknowledgement for a verdict-store write issued through the API surface.
#[derive(Debug, Clone, Serialize)]
pub struct VaultAck {
    pub status: &'static str,
    pub vault_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    pub timestamp: CycleStamp,
}

/// Acknowledgement for a downstream ping confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct PingAck {
    pub cycle_id: String,
    pub cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harmonizer_status: Option<String>,
    pub timestamp: CycleStamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_serde_round_trip() {
        let json = serde_json::to_string(&Operation::SynapticDistribute).unwrap();
        assert_eq!(json, "\"synaptic_distribute\"");
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Operation::SynapticDistribute);
    }

    #[test]
    fn test_operation_display_matches_serde() {
        for op in [
            Operation::CycleStart,
            Operation::CycleEnd,
            Operation::VaultCheck,
            Operation::HarmonizerPing,
            Operation::CoreReasoning,
        ] {
            let via_serde = serde_json::to_string(&op).unwrap();
            assert_eq!(via_serde, format!("\"{}\"", op));
        }
    }

    #[test]
    fn test_cycle_event_optional_fields_omitted() {
        let event = CycleEvent {
            cycle_id: "CYC_000001_A".to_string(),
            cycle_type: Some(CycleType::A),
            time_micros: 1.0,
            stardate: 9000.1234,
            operation: Operation::CycleStart,
            vault_operation: None,
            verdict_status: None,
            drift_ns: 42,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("vault_operation"));
        assert!(!json.contains("verdict_status"));
    }

    #[test]
    fn test_cycle_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CycleStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&CycleStatus::Aborted).unwrap(),
            "\"aborted\""
        );
    }
}
