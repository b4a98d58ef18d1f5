#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::service_system::{AsyncService, ServiceController, ServiceKey, ServiceLoadError};

use super::common::{Behavior, ExecutionTracker, TrackedService, fast_config, init_logging};

/// (key, dependencies) for a layered graph with a diamond and a long chain
const GRAPH: &[(&str, &[&str])] = &[
    ("config", &[]),
    ("logging", &["config"]),
    ("metrics", &["config"]),
    ("storage", &["logging", "metrics"]),
    ("cache", &["storage"]),
    ("sessions", &["cache", "logging"]),
    ("api", &["sessions", "storage"]),
    ("clock", &[]),
];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_acyclic_graph_fully_starts_in_dependency_order() -> Result<()> {
    init_logging();
    let tracker = ExecutionTracker::new();
    let mut controller = ServiceController::new(fast_config());

    let report = controller
        .register_services(|registrar| {
            for (idx, (key, deps)) in GRAPH.iter().enumerate() {
                // Stagger completion so rounds contain loads finishing out of order
                let delay = Duration::from_millis(5 * (idx as u64 % 3));
                let service = TrackedService::new(key, &tracker, Behavior::SucceedAfter(delay));
                assert!(registrar.register_service(service, *key, deps)?);
            }
            Ok(())
        })
        .await?;

    assert!(report.is_complete());
    assert_eq!(report.started.len(), GRAPH.len());
    // config/clock, logging/metrics, storage, cache, sessions, api
    assert_eq!(report.rounds, 6);

    for (key, deps) in GRAPH {
        assert_eq!(controller.is_running(key), Some(true), "{} not running", key);
        for dep in deps.iter() {
            tracker.assert_started_after(key, dep);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_later_batch_depends_on_committed_services() -> Result<()> {
    let tracker = ExecutionTracker::new();
    let mut controller = ServiceController::new(fast_config());

    controller
        .register_services(|registrar| {
            registrar.register_service(TrackedService::succeeding("core", &tracker), "core", &[])?;
            Ok(())
        })
        .await?;

    let report = controller
        .register_services(|registrar| {
            registrar.register_service(TrackedService::succeeding("plugin", &tracker), "plugin", &["core"])?;
            registrar.register_service(TrackedService::succeeding("ui", &tracker), "ui", &["plugin", "core"])?;
            Ok(())
        })
        .await?;

    // core was already running, so only the new services load
    assert_eq!(report.started, vec![ServiceKey::from("plugin"), ServiceKey::from("ui")]);
    assert_eq!(report.rounds, 2);
    assert_eq!(tracker.start_order(), vec!["core", "plugin", "ui"]);
    Ok(())
}

#[tokio::test]
async fn test_immediate_then_staged_on_same_controller() -> Result<()> {
    let tracker = ExecutionTracker::new();
    let mut controller = ServiceController::new(fast_config());

    controller
        .register_services_immediately(|registrar| {
            registrar.register_service(TrackedService::succeeding("env", &tracker), "env", &[])?;
            Ok(())
        })
        .await?;

    let report = controller
        .register_services(|registrar| {
            registrar.register_service(TrackedService::succeeding("worker", &tracker), "worker", &["env"])?;
            Ok(())
        })
        .await?;

    assert_eq!(report.rounds, 1);
    assert_eq!(controller.running_keys(), vec![ServiceKey::from("env"), ServiceKey::from("worker")]);
    Ok(())
}

struct Migrations {
    applied: Arc<AtomicU32>,
}

#[async_trait]
impl AsyncService for Migrations {
    async fn load(&self) -> std::result::Result<(), ServiceLoadError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_closure_and_async_services_share_a_graph() -> Result<()> {
    let applied = Arc::new(AtomicU32::new(0));
    let seen_at_startup = Arc::new(AtomicU32::new(u32::MAX));
    let mut controller = ServiceController::new(fast_config());

    let applied_for_closure = Arc::clone(&applied);
    let seen = Arc::clone(&seen_at_startup);
    let report = controller
        .register_services(|registrar| {
            registrar.register_async(Migrations { applied: Arc::clone(&applied) }, "migrations", &[])?;
            registrar.register_closure(
                move || {
                    seen.store(applied_for_closure.load(Ordering::SeqCst), Ordering::SeqCst);
                },
                "warmup",
                &["migrations"],
            )?;
            Ok(())
        })
        .await?;

    assert!(report.is_complete());
    assert_eq!(applied.load(Ordering::SeqCst), 1);
    // The closure only ran after the async load finished
    assert_eq!(seen_at_startup.load(Ordering::SeqCst), 1);
    Ok(())
}

struct FlakyConnection;

#[async_trait]
impl AsyncService for FlakyConnection {
    async fn load(&self) -> std::result::Result<(), ServiceLoadError> {
        Err(ServiceLoadError::new("handshake timed out"))
    }
}

#[tokio::test]
async fn test_async_failure_surfaces_reason() {
    let mut controller = ServiceController::new(fast_config());

    let err = controller
        .register_services(|registrar| {
            registrar.register_async(FlakyConnection, "remote", &[])?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.to_string().contains("handshake timed out"), "got: {}", err);
    assert_eq!(controller.is_running("remote"), Some(false));
}
