//! Synchrometer: cycle orchestration with stardate timestamping.
//!
//! Coordinates a multi-stage processing workflow ("cycle") with
//! sub-millisecond timestamps, a persisted verdict store that selects the
//! workflow variant, and parallel fan-out to downstream processing stages.
//!
//! ## Architecture
//!
//! - **Stardate Clock**: high-resolution stamps plus drift against the
//!   process-start baseline
//! - **Verdict Vaults**: append-only, partitioned-by-kind record stores
//! - **Cycle Ledger**: append-only audit trail of every lifecycle event
//! - **Cycle Orchestrator**: the A/B cycle state machine
//! - **Stage Gateway**: normalized dispatch to downstream stages
//!
//! The HTTP front end, CLI and telemetry surfaces are external
//! collaborators; this crate exposes its API through [`CycleService`].

pub mod clock;
pub mod config;
pub mod gateway;
pub mod ledger;
pub mod orchestrator;
pub mod service;
pub mod types;
pub mod vault;

// Re-export the service surface
pub use service::CycleService;

// Re-export commonly used types
pub use types::{
    CycleEvent, CycleRequest, CycleResult, CycleStatus, CycleType, DriftCompliance,
    Operation, PingAck, StopOutcome, StopStatus, SystemStatus, VaultAck,
};

// Re-export component entry points
pub use clock::{CycleStamp, StardateClock};
pub use config::{ConfigError, StageEndpoints, SystemConfig};
pub use gateway::{HttpTransport, StageError, StageGateway, StageResponse, StageTransport};
pub use ledger::{CycleLedger, DriftGrade, DriftReport, ReportStatus, StorageError};
pub use orchestrator::{CycleOrchestrator, OrchestratorError};
pub use vault::{ScanStatus, UnknownVaultKind, VaultKind, VaultScan, VaultStore, VaultVerdict};
