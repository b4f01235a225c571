//! Access flow worker - decides whether a presented credential gets in
//!
//! Credentials arrive from the main cycle over an mpsc channel so registry
//! round-trips never delay occupancy sensing. For each credential:
//!
//! 1. log the attempt
//! 2. validate against the registry (bounded by `call_timeout`; any failure denies)
//! 3. check `any_free` from the latest published availability
//! 4. open the barrier through the controller (which also resets the countdown)
//! 5. register the access timestamp; a failure here is logged, never retried,
//!    and never reverses the open

use crate::domain::types::Credential;
use crate::infra::metrics::Metrics;
use crate::io::access_log::AccessLog;
use crate::io::registry::{CredentialRegistry, RegistryError};
use crate::services::availability::Availability;
use crate::services::barrier_controller::BarrierHandle;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Duration, Instant};
use tracing::{error, info, warn};

/// A credential read by the proximity reader
#[derive(Debug, Clone)]
pub struct CredentialEvent {
    pub credential: Credential,
    /// When the main cycle picked it up (for queue delay measurement)
    pub presented_at: Instant,
}

impl CredentialEvent {
    pub fn new(credential: Credential) -> Self {
        Self { credential, presented_at: Instant::now() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Barrier opened; `registered` tells whether the timestamp was recorded
    Granted { registered: bool },
    /// Unknown credential, or validation could not be completed
    DeniedInvalid,
    /// Valid credential but every space is occupied
    DeniedNoSpace,
    /// Valid and space free, but the barrier controller is gone
    BarrierFault,
}

impl AccessDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Granted { .. } => "granted",
            AccessDecision::DeniedInvalid => "denied_invalid",
            AccessDecision::DeniedNoSpace => "denied_no_space",
            AccessDecision::BarrierFault => "barrier_fault",
        }
    }
}

pub struct AccessFlow {
    registry: Arc<dyn CredentialRegistry>,
    barrier: BarrierHandle,
    availability: watch::Receiver<Availability>,
    log: Arc<AccessLog>,
    call_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl AccessFlow {
    pub fn new(
        registry: Arc<dyn CredentialRegistry>,
        barrier: BarrierHandle,
        availability: watch::Receiver<Availability>,
        log: Arc<AccessLog>,
        call_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { registry, barrier, availability, log, call_timeout, metrics }
    }

    /// Run until every sender is gone
    pub async fn run(self, mut rx: mpsc::Receiver<CredentialEvent>) {
        info!(call_timeout_ms = %self.call_timeout.as_millis(), "access_worker_started");

        while let Some(event) = rx.recv().await {
            let queue_delay_us = event.presented_at.elapsed().as_micros() as u64;
            let start = Instant::now();
            let decision = self.handle(&event.credential).await;

            info!(
                uid = %event.credential,
                decision = %decision.as_str(),
                queue_delay_us = %queue_delay_us,
                total_us = %start.elapsed().as_micros(),
                "access_flow_completed"
            );
        }

        info!("access_worker_stopped");
    }

    pub async fn handle(&self, credential: &Credential) -> AccessDecision {
        self.metrics.record_credential_presented();
        self.log.append("RFID access attempt", Some(credential));
        info!(uid = %credential, "credential_presented");

        if !self.validate(credential).await {
            self.metrics.record_access_denied_invalid();
            self.log.append("Access denied: credential not registered", Some(credential));
            info!(uid = %credential, "access_denied_invalid");
            return AccessDecision::DeniedInvalid;
        }

        // Availability as of the most recent cycle, read at decision time
        let availability = *self.availability.borrow();
        if !availability.any_free {
            self.metrics.record_access_denied_no_space();
            self.log.append("Access denied: no free space", Some(credential));
            info!(
                uid = %credential,
                total = %availability.total,
                "access_denied_no_space"
            );
            return AccessDecision::DeniedNoSpace;
        }

        if let Err(e) = self.barrier.open_for_entry().await {
            error!(uid = %credential, error = %e, "access_barrier_fault");
            self.log.append("Barrier fault: entry not opened", Some(credential));
            return AccessDecision::BarrierFault;
        }
        self.metrics.record_access_granted();
        self.log.append("Access granted: barrier opened", Some(credential));
        info!(
            uid = %credential,
            free_count = %availability.free_count,
            nearest_free = ?availability.nearest_free.map(|s| s.number()),
            "access_granted"
        );

        let registered = self.register(credential).await;
        AccessDecision::Granted { registered }
    }

    async fn validate(&self, credential: &Credential) -> bool {
        let result = match timeout(self.call_timeout, self.registry.validate(credential)).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout(self.call_timeout)),
        };

        match result {
            Ok(valid) => valid,
            Err(e) => {
                self.metrics.record_validation_failure();
                warn!(uid = %credential, error = %e, "credential_validation_failed");
                false
            }
        }
    }

    async fn register(&self, credential: &Credential) -> bool {
        let result =
            match timeout(self.call_timeout, self.registry.register_timestamp(credential)).await {
                Ok(result) => result,
                Err(_) => Err(RegistryError::Timeout(self.call_timeout)),
            };

        match result {
            Ok(outcome) => {
                self.metrics.record_registration(true);
                self.log.append(
                    &format!("Timestamp registered ({})", outcome.as_str()),
                    Some(credential),
                );
                true
            }
            Err(e) => {
                self.metrics.record_registration(false);
                self.log.append(&format!("Timestamp registration failed: {}", e), Some(credential));
                warn!(uid = %credential, error = %e, "timestamp_registration_failed");
                false
            }
        }
    }
}

/// Access flow bound to its input channel
pub struct AccessWorker {
    flow: AccessFlow,
    rx: mpsc::Receiver<CredentialEvent>,
}

impl AccessWorker {
    pub async fn run(self) {
        self.flow.run(self.rx).await
    }
}

/// Create a credential channel and access worker
///
/// Returns the sender (for the main cycle) and the worker (to be spawned)
pub fn create_access_worker(
    flow: AccessFlow,
    buffer_size: usize,
) -> (mpsc::Sender<CredentialEvent>, AccessWorker) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (tx, AccessWorker { flow, rx })
}
