//! Cycle orchestrator: the state machine driving both workflow variants.
//!
//! Variant A (verdict-driven):
//! `START -> VAULT_CHECK -> CONFIRM -> HARMONIZE -> OUTPUT -> PING_CLEAR -> END`,
//! falling through to variant B when the vault check finds nothing. Any
//! stage failure aborts the cycle with a reason naming the stage.
//!
//! Variant B (full pipeline):
//! `START -> NO_VERDICT_CONFIRM -> DUAL_DISPATCH -> SYNAPTIC_DISTRIBUTE ->
//! RESONATE -> CORE_REASONING -> FINAL_HARMONIZE -> OUTPUT -> PING_CLEAR -> END`.
//! Stage failures degrade into error payloads and the cycle still
//! completes; fan-out slots that fail settle to the `{"error": "failed"}`
//! placeholder without cancelling their siblings.
//!
//! One cycle is in flight at a time. The in-flight marker and the id
//! counter live under a single mutex; there is no global state.

use crate::clock::{CycleStamp, StardateClock};
use crate::config::{StageEndpoints, SystemConfig};
use crate::gateway::{StageError, StageGateway, StageResponse};
use crate::ledger::{CycleLedger, StorageError, DRIFT_COMPLIANCE_NS};
use crate::types::{
    CycleEvent, CycleRequest, CycleResult, CycleStatus, CycleType, DriftCompliance,
    Operation, StopOutcome, StopStatus, SystemStatus,
};
use crate::vault::{VaultKind, VaultStore, VaultVerdict};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Synaptic field size split evenly across the two dispatch results.
pub const SYNAPTIC_NODE_COUNT: u64 = 666_000;

/// Node count the resonator advertises for pyramid processing.
pub const RESONATOR_NODE_COUNT: u64 = 999_999;

/// Terminal resolution written when an A cycle hands off to variant B.
const DELEGATE_RESOLUTION: &str = "no_verdict_delegate_b";

/// Rejections raised before a cycle mutates any state.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("cycle {current_cycle_id} is already in flight")]
    Conflict { current_cycle_id: String },
    #[error(transparent)]
    UnknownVaultKind(#[from] crate::vault::UnknownVaultKind),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Marker for the single in-flight cycle.
#[derive(Debug, Clone)]
struct InFlight {
    cycle_id: String,
    cycle_type: CycleType,
}

/// Counter and marker, guarded together.
#[derive(Debug, Default)]
struct CycleState {
    counter: u64,
    current: Option<InFlight>,
}

/// What `end_cycle` hands back to result assembly.
struct CycleCompletion {
    duration_ms: f64,
    drift_status: DriftCompliance,
}

/// The orchestrator. One instance owns the clock, both stores and the
/// gateway; nothing about a cycle lives outside it.
pub struct CycleOrchestrator {
    clock: Arc<StardateClock>,
    vaults: Arc<VaultStore>,
    ledger: Arc<CycleLedger>,
    gateway: StageGateway,
    stages: StageEndpoints,
    state: Mutex<CycleState>,
}

impl CycleOrchestrator {
    /// Build the orchestrator from configuration and a gateway.
    pub fn new(config: &SystemConfig, gateway: StageGateway) -> Result<Self, StorageError> {
        let clock = Arc::new(StardateClock::new(&config.system_name));
        let vaults = Arc::new(VaultStore::open(config.vault_dir(), Arc::clone(&clock))?);
        let ledger = Arc::new(CycleLedger::open(config.ledger_path())?);

        info!(
            system = %config.system_name,
            data_dir = %config.data_dir.display(),
            "cycle orchestrator initialized, drift baseline established"
        );

        Ok(Self {
            clock,
            vaults,
            ledger,
            gateway,
            stages: config.stages.clone(),
            state: Mutex::new(CycleState::default()),
        })
    }

    pub fn clock(&self) -> &StardateClock {
        &self.clock
    }

    pub fn vaults(&self) -> &VaultStore {
        &self.vaults
    }

    pub fn ledger(&self) -> &CycleLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------

    /// Run one cycle to completion or abort.
    ///
    /// Rejects with [`OrchestratorError::Conflict`] while another cycle is
    /// in flight. Once a cycle starts it always finalizes: stage failures
    /// and internal errors come back as an `aborted` result, never as a
    /// propagated fault.
    pub async fn execute(
        &self,
        request: CycleRequest,
    ) -> Result<CycleResult, OrchestratorError> {
        let input = request.input.unwrap_or_else(|| json!({}));

        let cycle_type = match request.cycle_type {
            Some(explicit) => explicit,
            None => {
                let verdict = self.vault_check("AUTO_CHECK", None);
                if verdict.has_verdict && !request.force {
                    CycleType::A
                } else {
                    CycleType::B
                }
            }
        };

        match cycle_type {
            CycleType::A => self.run_cycle_a(input).await,
            CycleType::B => self.run_cycle_b(input).await,
        }
    }

    /// Scan both vaults and record the check against `cycle_id`.
    pub fn vault_check(&self, cycle_id: &str, cycle_type: Option<CycleType>) -> VaultVerdict {
        let verdict = self.vaults.check_all();
        let vault_op = format!(
            "a_priori:{},a_posteriori:{}",
            verdict.a_priori.status, verdict.a_posteriori.status
        );
        self.record(cycle_id, cycle_type, Operation::VaultCheck, Some(vault_op), None);

        info!(
            cycle_id,
            a_priori = %verdict.a_priori.status,
            a_posteriori = %verdict.a_posteriori.status,
            "vault check"
        );
        verdict
    }

    /// Store a verdict entry and record the store operation.
    ///
    /// The write is advisory for a running cycle: an I/O failure is
    /// surfaced to the caller but does not abort anything.
    pub async fn store_verdict(
        &self,
        kind: VaultKind,
        payload: &Value,
        cycle_id: Option<&str>,
    ) -> Result<CycleStamp, StorageError> {
        let stamp = self.vaults.store(kind, payload, cycle_id)?;
        let cycle_type = self.state.lock().await.current.as_ref().map(|c| c.cycle_type);
        self.record(
            cycle_id.unwrap_or("NO_CYCLE"),
            cycle_type,
            Operation::VaultStore,
            Some(format!("{}:stored", kind)),
            None,
        );
        Ok(stamp)
    }

    /// Record a downstream ping confirmation and report clearance.
    ///
    /// A response without an explicit `cycle_clear: false` clears.
    pub fn ping_confirmation(
        &self,
        cycle_id: &str,
        cycle_type: Option<CycleType>,
        response: &Value,
    ) -> bool {
        let status = response
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let verdict_status = response
            .get("verdict_confirmation")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.record(
            cycle_id,
            cycle_type,
            Operation::HarmonizerPing,
            Some(format!("response:{}", status)),
            verdict_status,
        );

        let cleared = response
            .get("cycle_clear")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        info!(cycle_id, status, cleared, "harmonizer ping confirmation");
        cleared
    }

    /// Abort a cycle by id. Idempotent: the terminal event is written at
    /// most once, and the in-flight marker is cleared when it matches.
    pub async fn abort(&self, cycle_id: &str, reason: &str) {
        error!(cycle_id, reason, "cycle abort requested");
        let cycle_type = self
            .state
            .lock()
            .await
            .current
            .as_ref()
            .filter(|c| c.cycle_id == cycle_id)
            .map(|c| c.cycle_type);
        self.end_cycle(cycle_id, cycle_type, Some(&format!("ABORTED: {}", reason)))
            .await;
    }

    /// Immediately abort any in-flight cycle with `EMERGENCY_STOP`.
    ///
    /// Does not interrupt an outstanding downstream call; the cycle is
    /// marked terminal and the in-flight marker cleared, and the running
    /// task finds the terminal event already written when it returns.
    pub async fn emergency_stop(&self) -> StopOutcome {
        self.stop_with_reason("EMERGENCY_STOP").await
    }

    /// Abort any in-flight cycle with `SYSTEM_SHUTDOWN`.
    pub async fn shutdown(&self) -> StopOutcome {
        self.stop_with_reason("SYSTEM_SHUTDOWN").await
    }

    /// Orchestrator snapshot for the status surface.
    pub async fn status(&self) -> SystemStatus {
        let (current, total_cycles) = {
            let state = self.state.lock().await;
            (state.current.clone(), state.counter)
        };
        let drift_report = self.ledger.drift_report();
        let compliant = drift_report.compliant;

        SystemStatus {
            active: current.is_some(),
            current_cycle_id: current.map(|c| c.cycle_id),
            total_cycles,
            drift_report,
            compliant,
            healthy: compliant,
            stardate: self.clock.stardate(),
        }
    }

    /// Health probe: drift compliance is the liveness criterion.
    pub async fn heartbeat(&self) -> bool {
        let report = self.ledger.drift_report();
        info!(
            drift = ?report.drift_status,
            samples = report.sample_count,
            "heartbeat"
        );
        report.compliant
    }

    // ------------------------------------------------------------------
    // Variant A
    // ------------------------------------------------------------------

    async fn run_cycle_a(&self, input: Value) -> Result<CycleResult, OrchestratorError> {
        let cycle_id = self.begin_cycle(CycleType::A).await?;
        let mut stages: BTreeMap<String, Value> = BTreeMap::new();

        let verdict = self.vault_check(&cycle_id, Some(CycleType::A));
        if !verdict.has_verdict {
            info!(cycle_id = %cycle_id, "no vault verdict, delegating to cycle B");
            self.end_cycle(&cycle_id, Some(CycleType::A), Some(DELEGATE_RESOLUTION))
                .await;
            return self.run_cycle_b(input).await;
        }

        // CONFIRM: the primary cochlear processor validates the verdict.
        self.record(&cycle_id, Some(CycleType::A), Operation::Confirm, None, None);
        let confirm = match self
            .gateway
            .call(
                &self.stages.cochlear_primary,
                "confirm_verdict",
                json!({
                    "cycle_id": cycle_id,
                    "operation": "verdict_confirmation",
                    "a_priori_verdict": verdict.a_priori,
                    "a_posteriori_verdict": verdict.a_posteriori,
                    "iss_timestamp": verdict.timestamp,
                }),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(self
                    .abort_cycle(
                        cycle_id,
                        CycleType::A,
                        format!("confirm failed: {}", e),
                        stages,
                        Some(verdict),
                    )
                    .await);
            }
        };
        stages.insert(Operation::Confirm.to_string(), confirm.body.clone());

        // HARMONIZE: gyro cortical reaffirmation of the verdict.
        self.record(&cycle_id, Some(CycleType::A), Operation::Harmonize, None, None);
        let harmonize = match self
            .gateway
            .call(
                &self.stages.harmonizer,
                "gyro_cortical_process",
                json!({
                    "cycle_id": cycle_id,
                    "operation": "gyro_cortical_harmonizing",
                    "vault_verdict": verdict,
                    "cochlear_confirmation": confirm.body,
                    "mode": "a_priori_reaffirmation",
                }),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(self
                    .abort_cycle(
                        cycle_id,
                        CycleType::A,
                        format!("harmonize failed: {}", e),
                        stages,
                        Some(verdict),
                    )
                    .await);
            }
        };
        stages.insert(Operation::Harmonize.to_string(), harmonize.body.clone());

        // OUTPUT: final approval through the phonatory module.
        self.record(&cycle_id, Some(CycleType::A), Operation::Output, None, None);
        let output = match self
            .gateway
            .call(
                &self.stages.phonatory,
                "generate_output",
                json!({
                    "cycle_id": cycle_id,
                    "operation": "final_output",
                    "processing_result": harmonize.body,
                    "output_mode": "cycle_resolution",
                }),
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return Ok(self
                    .abort_cycle(
                        cycle_id,
                        CycleType::A,
                        format!("output failed: {}", e),
                        stages,
                        Some(verdict),
                    )
                    .await);
            }
        };
        stages.insert(Operation::Output.to_string(), output.body.clone());

        // PING_CLEAR and END.
        let cleared = self.ping_confirmation(&cycle_id, Some(CycleType::A), &harmonize.body);
        stages.insert(
            Operation::HarmonizerPing.to_string(),
            json!({ "cycle_clear": cleared }),
        );

        let resolution = output
            .body
            .get("final_resolution")
            .and_then(Value::as_str)
            .map(str::to_string);
        let completion = self
            .end_cycle(&cycle_id, Some(CycleType::A), resolution.as_deref())
            .await;

        info!(
            cycle_id = %cycle_id,
            duration_ms = completion.duration_ms,
            "cycle A completed"
        );

        Ok(CycleResult {
            cycle_id,
            cycle_type: CycleType::A,
            status: CycleStatus::Completed,
            abort_reason: None,
            duration_ms: completion.duration_ms,
            drift_status: completion.drift_status,
            vault_verdict: Some(verdict),
            stages,
        })
    }

    // ------------------------------------------------------------------
    // Variant B
    // ------------------------------------------------------------------

    async fn run_cycle_b(&self, input: Value) -> Result<CycleResult, OrchestratorError> {
        let cycle_id = self.begin_cycle(CycleType::B).await?;
        let mut stages: BTreeMap<String, Value> = BTreeMap::new();

        // NO_VERDICT_CONFIRM: tell the harmonizer no verdict short-circuits.
        self.record(
            &cycle_id,
            Some(CycleType::B),
            Operation::NoVerdictConfirm,
            None,
            None,
        );
        let no_verdict = Self::degraded(
            self.gateway
                .call(
                    &self.stages.harmonizer,
                    "confirm_no_verdict",
                    json!({
                        "cycle_id": cycle_id,
                        "operation": "no_verdict_confirmation",
                        "timestamp": self.clock.now(),
                    }),
                )
                .await,
            "no_verdict_confirm",
        );
        stages.insert(Operation::NoVerdictConfirm.to_string(), no_verdict);

        // DUAL_DISPATCH: both cochlear processors, concurrently, join-all.
        self.record(
            &cycle_id,
            Some(CycleType::B),
            Operation::DualDispatch,
            None,
            None,
        );
        let dispatch_stamp = self.clock.now();
        let dual_payload = json!({
            "cycle_id": cycle_id,
            "operation": "dual_processing",
            "input_data": input,
            "iss_timestamp": dispatch_stamp,
            "sync_required": true,
        });
        let (primary, secondary) = tokio::join!(
            self.gateway.call(
                &self.stages.cochlear_primary,
                "process_cycle_b",
                dual_payload.clone()
            ),
            self.gateway.call(
                &self.stages.cochlear_secondary,
                "process_cycle_b",
                dual_payload.clone()
            ),
        );
        let dual = json!({
            "processor_1": Self::slot(primary, "cochlear_primary"),
            "processor_2": Self::slot(secondary, "cochlear_secondary"),
            "sync_status": "synchronized",
            "timestamp": dispatch_stamp,
        });
        stages.insert(Operation::DualDispatch.to_string(), dual.clone());

        // SYNAPTIC_DISTRIBUTE: local deterministic split, no dispatch.
        self.record(
            &cycle_id,
            Some(CycleType::B),
            Operation::SynapticDistribute,
            None,
            None,
        );
        let synaptic = distribute_synaptic(&cycle_id, &dual);
        stages.insert(Operation::SynapticDistribute.to_string(), synaptic.clone());

        // RESONATE: the full field feeds the cyclonic resonator.
        self.record(&cycle_id, Some(CycleType::B), Operation::Resonate, None, None);
        let resonate = Self::degraded(
            self.gateway
                .call(
                    &self.stages.resonator,
                    "process_synaptic_input",
                    json!({
                        "cycle_id": cycle_id,
                        "operation": "pyramid_processing",
                        "synaptic_input": synaptic,
                        "total_synaptic_nodes": RESONATOR_NODE_COUNT,
                        "processing_mode": "full_pipeline",
                    }),
                )
                .await,
            "resonate",
        );
        stages.insert(Operation::Resonate.to_string(), resonate.clone());

        // CORE_REASONING: four reasoning stages, concurrently, partial-failure
        // tolerant. A failed slot settles to its placeholder; siblings run on.
        self.record(
            &cycle_id,
            Some(CycleType::B),
            Operation::CoreReasoning,
            None,
            None,
        );
        let core_payload = json!({
            "cycle_id": cycle_id,
            "operation": "core_reasoning",
            "cyclonic_input": resonate,
            "processing_mode": "parallel_reasoning",
        });
        let reasoning_slots = [
            ("anterior_helix", &self.stages.anterior_helix),
            ("posterior_helix", &self.stages.posterior_helix),
            ("echostack", &self.stages.echostack),
            ("echo_ripple", &self.stages.echo_ripple),
        ];
        let settled = join_all(reasoning_slots.into_iter().map(|(name, endpoint)| {
            let payload = core_payload.clone();
            async move {
                (
                    name,
                    self.gateway.call(endpoint, "process_reasoning", payload).await,
                )
            }
        }))
        .await;
        let mut core_results = Map::new();
        for (name, result) in settled {
            core_results.insert(name.to_string(), Self::slot(result, name));
        }
        let core = json!({
            "status": "processed",
            "core_results": core_results,
            "reasoning_complete": true,
        });
        stages.insert(Operation::CoreReasoning.to_string(), core.clone());

        // FINAL_HARMONIZE: gyro cortical resolution over the reasoning set.
        self.record(
            &cycle_id,
            Some(CycleType::B),
            Operation::FinalHarmonize,
            None,
            None,
        );
        let final_harmonize = Self::degraded(
            self.gateway
                .call(
                    &self.stages.harmonizer,
                    "final_gyro_cortical",
                    json!({
                        "cycle_id": cycle_id,
                        "operation": "final_resolution",
                        "core_reasoning": core,
                        "mode": "gyro_cortical_final",
                    }),
                )
                .await,
            "final_harmonize",
        );
        stages.insert(Operation::FinalHarmonize.to_string(), final_harmonize.clone());

        // OUTPUT.
        self.record(&cycle_id, Some(CycleType::B), Operation::Output, None, None);
        let output = Self::degraded(
            self.gateway
                .call(
                    &self.stages.phonatory,
                    "generate_output",
                    json!({
                        "cycle_id": cycle_id,
                        "operation": "final_output",
                        "processing_result": final_harmonize,
                        "output_mode": "cycle_resolution",
                    }),
                )
                .await,
            "output",
        );
        stages.insert(Operation::Output.to_string(), output.clone());

        // PING_CLEAR and END.
        let cleared = self.ping_confirmation(&cycle_id, Some(CycleType::B), &final_harmonize);
        stages.insert(
            Operation::HarmonizerPing.to_string(),
            json!({ "cycle_clear": cleared }),
        );

        let resolution = output
            .get("final_resolution")
            .and_then(Value::as_str)
            .map(str::to_string);
        let completion = self
            .end_cycle(&cycle_id, Some(CycleType::B), resolution.as_deref())
            .await;

        info!(
            cycle_id = %cycle_id,
            duration_ms = completion.duration_ms,
            "cycle B completed"
        );

        Ok(CycleResult {
            cycle_id,
            cycle_type: CycleType::B,
            status: CycleStatus::Completed,
            abort_reason: None,
            duration_ms: completion.duration_ms,
            drift_status: completion.drift_status,
            vault_verdict: None,
            stages,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle plumbing
    // ------------------------------------------------------------------

    /// Claim the in-flight marker and issue the next cycle id.
    async fn begin_cycle(&self, cycle_type: CycleType) -> Result<String, OrchestratorError> {
        let cycle_id = {
            let mut state = self.state.lock().await;
            if let Some(current) = &state.current {
                return Err(OrchestratorError::Conflict {
                    current_cycle_id: current.cycle_id.clone(),
                });
            }
            state.counter += 1;
            let cycle_id = format!("CYC_{:06}_{}", state.counter, cycle_type);
            state.current = Some(InFlight {
                cycle_id: cycle_id.clone(),
                cycle_type,
            });
            cycle_id
        };

        let stamp = self.record(&cycle_id, Some(cycle_type), Operation::CycleStart, None, None);
        info!(
            cycle_id = %cycle_id,
            cycle_type = %cycle_type,
            time_micros = stamp.time_micros,
            drift_ns = stamp.drift_ns,
            "cycle start"
        );
        Ok(cycle_id)
    }

    /// Write the terminal event (at most once) and release the marker.
    ///
    /// A supplied id that does not match the tracked in-flight cycle is a
    /// consistency warning, not a failure: the event is written against
    /// the supplied id and the mismatched marker is left alone.
    async fn end_cycle(
        &self,
        cycle_id: &str,
        cycle_type: Option<CycleType>,
        resolution: Option<&str>,
    ) -> CycleCompletion {
        {
            let mut state = self.state.lock().await;
            match state.current.take() {
                Some(current) if current.cycle_id == cycle_id => {}
                Some(current) => {
                    warn!(
                        expected = %current.cycle_id,
                        supplied = cycle_id,
                        "cycle id mismatch on end_cycle, proceeding with supplied id"
                    );
                    // The tracked cycle is someone else's; leave it in flight.
                    state.current = Some(current);
                }
                None => {}
            }
        }

        let stamp = if self.ledger.has_terminal(cycle_id) {
            self.clock.now()
        } else {
            self.record(
                cycle_id,
                cycle_type,
                Operation::CycleEnd,
                resolution.map(|r| format!("resolution:{}", r)),
                None,
            )
        };

        let duration_ms = self.ledger.duration_ms(cycle_id);
        let drift_status = if (stamp.drift_ns as f64).abs() < DRIFT_COMPLIANCE_NS {
            DriftCompliance::Acceptable
        } else {
            DriftCompliance::Warning
        };

        info!(
            cycle_id,
            duration_ms,
            drift_ns = stamp.drift_ns,
            resolution = resolution.unwrap_or("none"),
            "cycle end"
        );

        CycleCompletion {
            duration_ms,
            drift_status,
        }
    }

    /// Finalize an aborted cycle into its structured result.
    async fn abort_cycle(
        &self,
        cycle_id: String,
        cycle_type: CycleType,
        reason: String,
        stages: BTreeMap<String, Value>,
        vault_verdict: Option<VaultVerdict>,
    ) -> CycleResult {
        error!(cycle_id = %cycle_id, reason = %reason, "cycle aborted");
        let completion = self
            .end_cycle(
                &cycle_id,
                Some(cycle_type),
                Some(&format!("ABORTED: {}", reason)),
            )
            .await;

        CycleResult {
            cycle_id,
            cycle_type,
            status: CycleStatus::Aborted,
            abort_reason: Some(reason),
            duration_ms: completion.duration_ms,
            drift_status: completion.drift_status,
            vault_verdict,
            stages,
        }
    }

    async fn stop_with_reason(&self, reason: &str) -> StopOutcome {
        let current = self.state.lock().await.current.clone();
        match current {
            Some(in_flight) => {
                warn!(cycle_id = %in_flight.cycle_id, reason, "stopping in-flight cycle");
                self.end_cycle(&in_flight.cycle_id, Some(in_flight.cycle_type), Some(reason))
                    .await;
                StopOutcome {
                    status: StopStatus::EmergencyStopped,
                    stopped_cycle_id: Some(in_flight.cycle_id),
                    timestamp: self.clock.now(),
                }
            }
            None => StopOutcome {
                status: StopStatus::NoActiveCycle,
                stopped_cycle_id: None,
                timestamp: self.clock.now(),
            },
        }
    }

    /// Stamp and append one ledger event. Append failures are logged and
    /// swallowed: the audit trail is best-effort, the cycle is not.
    fn record(
        &self,
        cycle_id: &str,
        cycle_type: Option<CycleType>,
        operation: Operation,
        vault_operation: Option<String>,
        verdict_status: Option<String>,
    ) -> CycleStamp {
        let stamp = self.clock.now();
        let event = CycleEvent {
            cycle_id: cycle_id.to_string(),
            cycle_type,
            time_micros: stamp.time_micros,
            stardate: stamp.stardate,
            operation,
            vault_operation,
            verdict_status,
            drift_ns: stamp.drift_ns,
        };
        if let Err(e) = self.ledger.append(&event) {
            warn!(cycle_id, operation = %operation, error = %e, "ledger append failed");
        }
        stamp
    }

    /// Fan-out slot settlement: failures become the placeholder marker.
    fn slot(result: Result<StageResponse, StageError>, name: &str) -> Value {
        match result {
            Ok(response) => response.body,
            Err(e) => {
                warn!(slot = name, error = %e, "fan-out slot failed");
                json!({ "error": "failed" })
            }
        }
    }

    /// Sequential variant-B stage settlement: failures degrade into an
    /// error payload that flows to the next stage.
    fn degraded(result: Result<StageResponse, StageError>, stage: &str) -> Value {
        match result {
            Ok(response) => response.body,
            Err(e) => {
                warn!(stage, error = %e, "stage degraded, continuing");
                json!({ "status": "error", "error": e.to_string() })
            }
        }
    }
}

/// Deterministic even split of the dual dispatch results across the
/// synaptic field: processor 1 feeds the lower half, processor 2 the upper.
fn distribute_synaptic(cycle_id: &str, dual: &Value) -> Value {
    let half = SYNAPTIC_NODE_COUNT / 2;
    let lower = format!("0-{}", half);
    let upper = format!("{}-{}", half, SYNAPTIC_NODE_COUNT);

    json!({
        "status": "distributed",
        "total_nodes_activated": SYNAPTIC_NODE_COUNT,
        "processor_1_range": lower,
        "processor_2_range": upper,
        "distribution_payload": {
            "cycle_id": cycle_id,
            "operation": "synaptic_distribution",
            "processor_1_nodes": {
                "range": lower,
                "data": dual.get("processor_1").cloned().unwrap_or(Value::Null),
            },
            "processor_2_nodes": {
                "range": upper,
                "data": dual.get("processor_2").cloned().unwrap_or(Value::Null),
            },
            "total_nodes": SYNAPTIC_NODE_COUNT,
            "distribution_mode": "even_split",
        },
    })
}
