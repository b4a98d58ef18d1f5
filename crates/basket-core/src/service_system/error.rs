//! # Basket Service System Errors
//!
//! Defines [`ServiceSystemError`], covering every way a registration batch or
//! a bootstrap run can be aborted: unresolved or not-yet-running dependencies,
//! duplicate keys and cycles found at merge time, failed loads, and rounds
//! that exceeded a bounded wait policy.
use thiserror::Error;

use crate::service_system::traits::ServiceKey;

#[derive(Debug, Error)]
pub enum ServiceSystemError {
    #[error("Service '{key}' is already registered with the service controller")]
    DuplicateKey { key: ServiceKey },

    #[error("Service '{key}' depends on '{dependency}', which is neither in this batch nor registered")]
    UnresolvedDependency { key: ServiceKey, dependency: ServiceKey },

    #[error("Service '{key}' needs dependency '{dependency}' to be running before it can start")]
    DependencyNotRunning { key: ServiceKey, dependency: ServiceKey },

    #[error("Dependency cycle detected between services: {}", path.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "))]
    DependencyCycle { path: Vec<ServiceKey> },

    #[error("Failed to load service '{key}': {reason}")]
    LoadFailed { key: ServiceKey, reason: String },

    #[error("Round {round} stalled; still waiting on: {}", outstanding.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "))]
    Stalled { round: usize, outstanding: Vec<ServiceKey> },

    #[error("Worker running the load of '{key}' failed: {message}")]
    WorkerFailed { key: ServiceKey, message: String },
}

impl ServiceSystemError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceSystemError::DuplicateKey { .. } => "service_duplicate_key",
            ServiceSystemError::UnresolvedDependency { .. } => "service_unresolved_dependency",
            ServiceSystemError::DependencyNotRunning { .. } => "service_dependency_not_running",
            ServiceSystemError::DependencyCycle { .. } => "service_dependency_cycle",
            ServiceSystemError::LoadFailed { .. } => "service_load_failed",
            ServiceSystemError::Stalled { .. } => "service_round_stalled",
            ServiceSystemError::WorkerFailed { .. } => "service_worker_failed",
        }
    }

    /// The service key this error is about, when there is exactly one
    pub fn key(&self) -> Option<&ServiceKey> {
        match self {
            ServiceSystemError::DuplicateKey { key }
            | ServiceSystemError::UnresolvedDependency { key, .. }
            | ServiceSystemError::DependencyNotRunning { key, .. }
            | ServiceSystemError::LoadFailed { key, .. }
            | ServiceSystemError::WorkerFailed { key, .. } => Some(key),
            ServiceSystemError::DependencyCycle { .. } | ServiceSystemError::Stalled { .. } => None,
        }
    }
}
