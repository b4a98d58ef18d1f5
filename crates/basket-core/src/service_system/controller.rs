use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::kernel::constants::{APP_NAME, APP_VERSION, SERVICE_LOG_TARGET};
use crate::kernel::error::{Error, Result};
use crate::service_system::config::ControllerConfig;
use crate::service_system::error::ServiceSystemError;
use crate::service_system::graph::ServiceGraph;
use crate::service_system::node::ServiceNode;
use crate::service_system::registrar::ServiceRegistrar;
use crate::service_system::traits::{LoadCallback, LoadOutcome, Service, ServiceKey};

/// Summary of a staged bootstrap run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Number of rounds that started at least one service
    pub rounds: usize,
    /// Services started by this run, in completion order
    pub started: Vec<ServiceKey>,
    /// Services still not running when the ready set ran dry
    pub pending: Vec<ServiceKey>,
}

impl BootstrapReport {
    /// True when nothing was left pending
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// How a single load came back to the scheduling task
enum LoadReport {
    Reported(LoadOutcome),
    CallbackDropped,
    WorkerPanicked(String),
}

type RoundLoads = JoinSet<(Arc<ServiceNode>, LoadReport)>;

/// A round given up on by the bounded wait policy. Its loads keep running;
/// the next scheduling call collects them before issuing anything new.
#[derive(Debug)]
struct InFlightRound {
    round: usize,
    loads: RoundLoads,
    outstanding: BTreeSet<ServiceKey>,
}

/// Owns the service graph and drives it to readiness.
///
/// Every scheduling method takes `&mut self`, so exactly one task at a time
/// can advance rounds or flip running flags. Use [`SharedServiceController`]
/// to share one controller between tasks.
#[derive(Debug, Default)]
pub struct ServiceController {
    graph: ServiceGraph,
    config: ControllerConfig,
    in_flight: VecDeque<InFlightRound>,
}

impl ServiceController {
    pub fn new(config: ControllerConfig) -> Self {
        log::debug!("Creating {} v{} service controller with {:?}", APP_NAME, APP_VERSION, config);
        Self {
            graph: ServiceGraph::new(),
            config,
            in_flight: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // --- Accessing services ---

    pub fn service_for_key(&self, key: &str) -> Option<Arc<dyn Service>> {
        self.graph.get(key).map(|node| Arc::clone(node.service()))
    }

    pub fn service_keys(&self) -> Vec<ServiceKey> {
        self.graph.keys()
    }

    /// `None` when no service is registered under `key`
    pub fn is_running(&self, key: &str) -> Option<bool> {
        self.graph.get(key).map(|node| node.is_running())
    }

    pub fn node(&self, key: &str) -> Option<Arc<ServiceNode>> {
        self.graph.get(key).cloned()
    }

    pub fn running_keys(&self) -> Vec<ServiceKey> {
        self.graph.running_keys()
    }

    pub fn pending_keys(&self) -> Vec<ServiceKey> {
        self.graph.pending_keys()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Services whose load was issued but has not reported back yet
    pub fn loading_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self
            .in_flight
            .iter()
            .flat_map(|stalled| stalled.outstanding.iter().cloned())
            .collect();
        keys.sort();
        keys
    }

    // --- Registering services ---

    fn stage_batch<F>(&self, register: F) -> Result<Vec<Arc<ServiceNode>>>
    where
        F: FnOnce(&mut ServiceRegistrar<'_>) -> Result<()>,
    {
        let mut registrar = ServiceRegistrar::new(&self.graph);
        register(&mut registrar)?;
        Ok(registrar.into_batch())
    }

    /// Register a batch and start each new service right away, in
    /// registration order.
    ///
    /// Every dependency must already be running, or be registered earlier in
    /// the same batch. A node is marked running only once its callback
    /// reports success; the next node is not started before that. Loads run
    /// on the blocking pool, as in staged rounds.
    pub async fn register_services_immediately<F>(&mut self, register: F) -> Result<()>
    where
        F: FnOnce(&mut ServiceRegistrar<'_>) -> Result<()>,
    {
        let batch = self.stage_batch(register)?;

        let positions: HashMap<&ServiceKey, usize> =
            batch.iter().enumerate().map(|(pos, node)| (node.key(), pos)).collect();
        for (pos, node) in batch.iter().enumerate() {
            for dependency in node.dependencies() {
                let earlier_in_batch = positions.get(dependency.key()).is_some_and(|dep_pos| *dep_pos < pos);
                if !dependency.is_running() && !earlier_in_batch {
                    return Err(ServiceSystemError::DependencyNotRunning {
                        key: node.key().clone(),
                        dependency: dependency.key().clone(),
                    }
                    .into());
                }
            }
        }

        drop(positions);
        self.graph.merge(batch.clone(), self.config.detect_cycles)?;

        for node in batch {
            log::info!("Loading service {} immediately", node.key());
            let outstanding = BTreeSet::from([node.key().clone()]);
            let mut loads = RoundLoads::new();
            Self::issue_load(&mut loads, node);
            // Round 0 stands for the immediate strategy in logs and errors
            self.await_round(0, loads, outstanding).await?;
        }
        Ok(())
    }

    /// Register a batch, then run rounds until no further service can start.
    pub async fn register_services<F>(&mut self, register: F) -> Result<BootstrapReport>
    where
        F: FnOnce(&mut ServiceRegistrar<'_>) -> Result<()>,
    {
        let batch = self.stage_batch(register)?;
        let added = batch.len();
        self.graph.merge(batch, self.config.detect_cycles)?;
        log::info!("Registered {} services; {} total", added, self.graph.len());

        self.load_pending().await
    }

    /// Run the staged scheduling loop over everything already registered.
    ///
    /// Loads left outstanding by an earlier `Stalled` error are waited on
    /// first, so no service is ever loaded twice. Returns once the ready set
    /// is empty. A non-empty `pending` list in the report means the remaining
    /// services can never start.
    pub async fn load_pending(&mut self) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();

        while let Some(stalled) = self.in_flight.pop_front() {
            log::info!(
                "Round {}: resuming wait on {}",
                stalled.round,
                stalled.outstanding.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            );
            let started = self.await_round(stalled.round, stalled.loads, stalled.outstanding).await?;
            report.started.extend(started);
        }

        loop {
            let ready = self.graph.ready_nodes();
            if ready.is_empty() {
                break;
            }

            report.rounds += 1;
            let started = self.run_round(report.rounds, ready).await?;
            report.started.extend(started);
        }

        report.pending = self.graph.pending_keys();
        if report.pending.is_empty() {
            log::info!("All {} services running after {} rounds", self.graph.len(), report.rounds);
        } else {
            log::warn!(
                target: SERVICE_LOG_TARGET,
                "No more services can start; {} still pending: {}",
                report.pending.len(),
                join_keys(&report.pending)
            );
        }
        Ok(report)
    }

    /// Start every node of the round on the blocking pool, then wait for all of them.
    async fn run_round(&mut self, round: usize, nodes: Vec<Arc<ServiceNode>>) -> Result<Vec<ServiceKey>> {
        let outstanding: BTreeSet<ServiceKey> = nodes.iter().map(|node| node.key().clone()).collect();
        log::info!(
            "Round {}: starting {}",
            round,
            outstanding.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut loads = RoundLoads::new();
        for node in nodes {
            Self::issue_load(&mut loads, node);
        }

        self.await_round(round, loads, outstanding).await
    }

    /// Call `load_service` on the blocking pool and track its report in `loads`
    fn issue_load(loads: &mut RoundLoads, node: Arc<ServiceNode>) {
        let (callback, receiver) = LoadCallback::channel(node.key().clone());
        let worker_node = Arc::clone(&node);
        loads.spawn(async move {
            let issued = tokio::task::spawn_blocking(move || {
                worker_node.service().load_service(callback);
            })
            .await;
            if let Err(e) = issued {
                return (node, LoadReport::WorkerPanicked(e.to_string()));
            }
            let report = Self::receive(receiver).await;
            (node, report)
        });
    }

    async fn receive(receiver: oneshot::Receiver<LoadOutcome>) -> LoadReport {
        match receiver.await {
            Ok(outcome) => LoadReport::Reported(outcome),
            Err(_) => LoadReport::CallbackDropped,
        }
    }

    /// Counting barrier over one round.
    ///
    /// Waits in periods of `round_timeout`. An elapsed period is logged and
    /// the same outstanding loads are waited on again; nothing is cancelled.
    /// With `max_round_waits` set, that many elapsed periods end the run
    /// with [`ServiceSystemError::Stalled`]; the unfinished loads are parked
    /// on the controller for the next [`load_pending`](Self::load_pending).
    async fn await_round(
        &mut self,
        round: usize,
        mut loads: RoundLoads,
        mut outstanding: BTreeSet<ServiceKey>,
    ) -> Result<Vec<ServiceKey>> {
        let period = self.config.round_timeout();
        let mut started = Vec::new();
        let mut failure: Option<ServiceSystemError> = None;
        let mut waits: u32 = 0;
        let mut deadline = deadline_after(period);

        loop {
            let next = tokio::time::timeout_at(deadline, loads.join_next()).await;
            match next {
                Ok(None) => break,
                Ok(Some(Ok((node, report)))) => {
                    outstanding.remove(node.key());
                    match Self::settle(&node, report) {
                        Ok(()) => started.push(node.key().clone()),
                        Err(e) => {
                            log::error!("{}", e);
                            // Keep the first failure, but let the round finish
                            if failure.is_none() {
                                failure = Some(e);
                            }
                        }
                    }
                }
                Ok(Some(Err(join_err))) => {
                    return Err(Error::Other(format!("Round {} wait task failed: {}", round, join_err)));
                }
                Err(_elapsed) => {
                    waits += 1;
                    let still_waiting: Vec<ServiceKey> = outstanding.iter().cloned().collect();
                    log::error!(
                        target: SERVICE_LOG_TARGET,
                        "Timeout reached while launching services (round {}, wait {}): still waiting on {}",
                        round,
                        waits,
                        join_keys(&still_waiting)
                    );
                    if self.config.max_round_waits.is_some_and(|max| waits >= max) {
                        self.in_flight.push_back(InFlightRound {
                            round,
                            loads,
                            outstanding,
                        });
                        return Err(ServiceSystemError::Stalled {
                            round,
                            outstanding: still_waiting,
                        }
                        .into());
                    }
                    deadline = deadline_after(period);
                }
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(started),
        }
    }

    /// Apply one load result. Only a confirmed success flips the flag.
    fn settle(node: &ServiceNode, report: LoadReport) -> std::result::Result<(), ServiceSystemError> {
        match report {
            LoadReport::Reported(outcome) if outcome.loaded => {
                if let Some(error) = outcome.error {
                    log::warn!("Service {} loaded but reported: {}", node.key(), error);
                }
                node.mark_running();
                log::info!("Service {} running", node.key());
                Ok(())
            }
            LoadReport::Reported(outcome) => Err(ServiceSystemError::LoadFailed {
                key: node.key().clone(),
                reason: outcome
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "service reported it did not load".to_string()),
            }),
            LoadReport::CallbackDropped => Err(ServiceSystemError::LoadFailed {
                key: node.key().clone(),
                reason: "load callback dropped without reporting".to_string(),
            }),
            LoadReport::WorkerPanicked(message) => Err(ServiceSystemError::WorkerFailed {
                key: node.key().clone(),
                message,
            }),
        }
    }

    /// Insert pre-built nodes, bypassing the registrar
    #[cfg(test)]
    pub(crate) fn commit_nodes(&mut self, nodes: Vec<Arc<ServiceNode>>) -> Result<()> {
        self.graph.merge(nodes, self.config.detect_cycles)?;
        Ok(())
    }
}

fn deadline_after(period: Duration) -> Instant {
    let now = Instant::now();
    // Instant cannot represent periods near Duration::MAX; cap at one day
    now.checked_add(period)
        .unwrap_or_else(|| now + Duration::from_secs(24 * 60 * 60))
}

fn join_keys(keys: &[ServiceKey]) -> String {
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// Thread-safe controller handle using Tokio's Mutex.
///
/// The lock is held for the whole of a registration call, so queries issued
/// while a bootstrap is running wait for it to finish.
#[derive(Clone, Debug)]
pub struct SharedServiceController {
    pub controller: Arc<Mutex<ServiceController>>,
}

impl SharedServiceController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            controller: Arc::new(Mutex::new(ServiceController::new(config))),
        }
    }

    /// Get a cloned reference to the controller Arc<Mutex>
    pub fn controller(&self) -> Arc<Mutex<ServiceController>> {
        self.controller.clone()
    }

    pub async fn register_services<F>(&self, register: F) -> Result<BootstrapReport>
    where
        F: FnOnce(&mut ServiceRegistrar<'_>) -> Result<()> + Send,
    {
        let mut controller = self.controller.lock().await;
        controller.register_services(register).await
    }

    pub async fn register_services_immediately<F>(&self, register: F) -> Result<()>
    where
        F: FnOnce(&mut ServiceRegistrar<'_>) -> Result<()> + Send,
    {
        let mut controller = self.controller.lock().await;
        controller.register_services_immediately(register).await
    }

    pub async fn load_pending(&self) -> Result<BootstrapReport> {
        let mut controller = self.controller.lock().await;
        controller.load_pending().await
    }

    pub async fn service_for_key(&self, key: &str) -> Option<Arc<dyn Service>> {
        let controller = self.controller.lock().await;
        controller.service_for_key(key)
    }

    pub async fn service_keys(&self) -> Vec<ServiceKey> {
        let controller = self.controller.lock().await;
        controller.service_keys()
    }

    pub async fn is_running(&self, key: &str) -> Option<bool> {
        let controller = self.controller.lock().await;
        controller.is_running(key)
    }
}

impl Default for SharedServiceController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}
