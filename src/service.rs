//! Service facade over the orchestrator.
//!
//! This is the surface handed to the (external) front-end layer: execute a
//! cycle, inspect status, store and check verdicts, confirm downstream
//! pings, read the drift report, stop the system. It validates external
//! input before any state is touched and otherwise delegates.

use crate::config::SystemConfig;
use crate::gateway::{StageGateway, StageTransport};
use crate::ledger::{DriftReport, StorageError};
use crate::orchestrator::{CycleOrchestrator, OrchestratorError};
use crate::types::{
    CycleEvent, CycleRequest, CycleResult, PingAck, StopOutcome, SystemStatus, VaultAck,
};
use crate::vault::{VaultKind, VaultVerdict};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Facade owning one orchestrator instance.
pub struct CycleService {
    orchestrator: Arc<CycleOrchestrator>,
}

impl CycleService {
    /// Production service: HTTP gateway with the configured timeout.
    pub fn new(config: &SystemConfig) -> anyhow::Result<Self> {
        let gateway = StageGateway::over_http(config.request_timeout())?;
        Ok(Self::with_gateway(config, gateway)?)
    }

    /// Service over an explicit gateway.
    pub fn with_gateway(
        config: &SystemConfig,
        gateway: StageGateway,
    ) -> Result<Self, StorageError> {
        let orchestrator = Arc::new(CycleOrchestrator::new(config, gateway)?);
        info!(system = %config.system_name, "cycle service ready");
        Ok(Self { orchestrator })
    }

    /// Service over a bare transport; the seam tests drive cycles through.
    pub fn with_transport(
        config: &SystemConfig,
        transport: Arc<dyn StageTransport>,
    ) -> Result<Self, StorageError> {
        Self::with_gateway(config, StageGateway::new(transport))
    }

    /// The underlying orchestrator, for callers composing their own flows.
    pub fn orchestrator(&self) -> &Arc<CycleOrchestrator> {
        &self.orchestrator
    }

    /// Execute one cycle (explicit variant, or auto-selected when absent).
    pub async fn execute_cycle(
        &self,
        request: CycleRequest,
    ) -> Result<CycleResult, OrchestratorError> {
        self.orchestrator.execute(request).await
    }

    /// Current orchestrator snapshot.
    pub async fn status(&self) -> SystemStatus {
        self.orchestrator.status().await
    }

    /// Store a verdict entry.
    ///
    /// An unknown `kind` string is rejected here, before any file or
    /// ledger state is touched.
    pub async fn store_verdict(
        &self,
        kind: &str,
        payload: Value,
        cycle_id: Option<String>,
    ) -> Result<VaultAck, OrchestratorError> {
        let kind: VaultKind = kind.parse()?;
        let stamp = self
            .orchestrator
            .store_verdict(kind, &payload, cycle_id.as_deref())
            .await?;

        Ok(VaultAck {
            status: "stored",
            vault_kind: kind.to_string(),
            cycle_id,
            timestamp: stamp,
        })
    }

    /// Scan both vaults, recording the check as a manual one.
    pub fn check_verdicts(&self) -> VaultVerdict {
        self.orchestrator.vault_check("MANUAL_CHECK", None)
    }

    /// Record a downstream ping confirmation against a cycle id.
    pub fn confirm_ping(&self, cycle_id: &str, response: &Value) -> PingAck {
        let cleared = self.orchestrator.ping_confirmation(cycle_id, None, response);
        PingAck {
            cycle_id: cycle_id.to_string(),
            cleared,
            harmonizer_status: response
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string),
            timestamp: self.orchestrator.clock().now(),
        }
    }

    /// Drift aggregation over the whole ledger.
    pub fn drift_report(&self) -> DriftReport {
        self.orchestrator.ledger().drift_report()
    }

    /// Abort any in-flight cycle with `EMERGENCY_STOP`.
    pub async fn emergency_stop(&self) -> StopOutcome {
        self.orchestrator.emergency_stop().await
    }

    /// Abort any in-flight cycle with `SYSTEM_SHUTDOWN`.
    pub async fn shutdown(&self) -> StopOutcome {
        self.orchestrator.shutdown().await
    }

    /// Most recent ledger events, bounded window.
    pub fn recent_events(&self, limit: usize) -> Vec<CycleEvent> {
        self.orchestrator.ledger().recent_events(limit)
    }

    /// Health probe.
    pub async fn heartbeat(&self) -> bool {
        self.orchestrator.heartbeat().await
    }
}
