use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendCallOutcome};

/// Last known backend condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unreachable,
    Degraded,
}

impl HealthState {
    /// Success means healthy, no answer means unreachable, any other answer means degraded.
    pub fn from_outcome<T>(outcome: &BackendCallOutcome<T>) -> Self {
        match outcome {
            BackendCallOutcome::Success(_) => HealthState::Healthy,
            BackendCallOutcome::TransportError { .. } | BackendCallOutcome::Timeout => {
                HealthState::Unreachable
            }
            BackendCallOutcome::UpstreamError { .. } => HealthState::Degraded,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            HealthState::Healthy => 0,
            HealthState::Unreachable => 1,
            HealthState::Degraded => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => HealthState::Healthy,
            2 => HealthState::Degraded,
            _ => HealthState::Unreachable,
        }
    }
}

/// Tracks backend reachability from dedicated probes and from real call outcomes.
///
/// The state is advisory: nothing consults it before dispatching a chat call,
/// so a recovered backend is used immediately even if the last observation
/// said it was down.
pub struct HealthSupervisor {
    backend: Arc<dyn Backend>,
    probe_timeout: Duration,
    state: AtomicU8,
}

impl HealthSupervisor {
    pub fn new(backend: Arc<dyn Backend>, probe_timeout: Duration) -> Self {
        Self {
            backend,
            probe_timeout,
            state: AtomicU8::new(HealthState::Unreachable.as_u8()),
        }
    }

    pub fn current(&self) -> HealthState {
        HealthState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Record the outcome of a real backend call and return the new state.
    pub fn classify<T>(&self, outcome: &BackendCallOutcome<T>) -> HealthState {
        let next = HealthState::from_outcome(outcome);
        self.observe(next);
        next
    }

    /// Hit the backend's status endpoint with the short probe timeout. Any 2xx is healthy.
    pub async fn probe(&self) -> HealthState {
        let outcome = match tokio::time::timeout(self.probe_timeout, self.backend.status()).await {
            Ok(outcome) => outcome,
            Err(_) => BackendCallOutcome::Timeout,
        };
        if let BackendCallOutcome::TransportError { detail, .. } = &outcome {
            debug!(backend = self.backend.name(), error = %detail, "health probe failed");
        }
        self.classify(&outcome)
    }

    fn observe(&self, next: HealthState) {
        let prev = HealthState::from_u8(self.state.swap(next.as_u8(), Ordering::AcqRel));
        if prev != next {
            match next {
                HealthState::Healthy => {
                    info!(backend = self.backend.name(), from = ?prev, "backend healthy")
                }
                _ => warn!(
                    backend = self.backend.name(),
                    from = ?prev,
                    to = ?next,
                    "backend health changed"
                ),
            }
        }
    }
}
