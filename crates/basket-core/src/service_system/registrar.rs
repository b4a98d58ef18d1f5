use std::collections::HashMap;
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::service_system::adapter::{AsyncService, AsyncServiceAdapter};
use crate::service_system::closure::ClosureService;
use crate::service_system::error::ServiceSystemError;
use crate::service_system::graph::ServiceGraph;
use crate::service_system::node::ServiceNode;
use crate::service_system::traits::{Service, ServiceKey};

/// Builds one batch of registrations against a controller's committed graph.
///
/// Rejected registrations (duplicate key, same instance twice) return
/// `Ok(false)` and leave the batch untouched. A dependency key that resolves
/// nowhere is an `Err`; the controller discards the whole batch when the
/// registration closure propagates it.
pub struct ServiceRegistrar<'a> {
    committed: &'a ServiceGraph,
    added: Vec<Arc<ServiceNode>>,
    index: HashMap<ServiceKey, usize>,
}

impl<'a> ServiceRegistrar<'a> {
    pub(crate) fn new(committed: &'a ServiceGraph) -> Self {
        Self {
            committed,
            added: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn should_register_service(&self, service: &Arc<dyn Service>, key: &ServiceKey) -> bool {
        if self.committed.contains(key.as_str()) {
            log::error!("Service {} already registered with the service controller", key);
            return false;
        }

        if self.index.contains_key(key) {
            log::error!("A service with an identical key is already added to the current service registrar: {}", key);
            return false;
        }

        if let Some(existing) = self.added.iter().find(|node| node.wraps(service)) {
            log::error!(
                "Service {} is already added to the current service registrar under key {}",
                key,
                existing.key()
            );
            return false;
        }

        true
    }

    /// Stage `service` under `key`, depending on the services named in
    /// `dependencies`. Dependencies resolve against this batch first, then
    /// against the committed graph.
    pub fn register_service(
        &mut self,
        service: Arc<dyn Service>,
        key: impl Into<ServiceKey>,
        dependencies: &[&str],
    ) -> Result<bool> {
        let key = key.into();
        if !self.should_register_service(&service, &key) {
            return Ok(false);
        }

        let mut dependency_nodes = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let node = self
                .index
                .get(*dependency)
                .map(|idx| &self.added[*idx])
                .or_else(|| self.committed.get(dependency))
                .ok_or_else(|| ServiceSystemError::UnresolvedDependency {
                    key: key.clone(),
                    dependency: ServiceKey::from(*dependency),
                })?;
            dependency_nodes.push(Arc::downgrade(node));
        }

        log::debug!("Staged service {} with {} dependencies", key, dependency_nodes.len());
        let node = Arc::new(ServiceNode::new(service, key.clone(), dependency_nodes));
        self.index.insert(key, self.added.len());
        self.added.push(node);
        Ok(true)
    }

    /// Stage a closure that runs once when the service loads
    pub fn register_closure<F>(&mut self, closure: F, key: impl Into<ServiceKey>, dependencies: &[&str]) -> Result<bool>
    where
        F: FnMut() + Send + 'static,
    {
        let closure_service: Arc<dyn Service> = Arc::new(ClosureService::new(closure));
        self.register_service(closure_service, key, dependencies)
    }

    /// Stage an async-trait service
    pub fn register_async<S>(&mut self, service: S, key: impl Into<ServiceKey>, dependencies: &[&str]) -> Result<bool>
    where
        S: AsyncService,
    {
        let adapted: Arc<dyn Service> = Arc::new(AsyncServiceAdapter::new(service));
        self.register_service(adapted, key, dependencies)
    }

    /// Whether `key` is taken, either in this batch or in the committed graph
    pub fn is_registered(&self, key: &str) -> bool {
        self.index.contains_key(key) || self.committed.contains(key)
    }

    /// Look up a service from this batch or the committed graph
    pub fn service_for_key(&self, key: &str) -> Option<Arc<dyn Service>> {
        self.index
            .get(key)
            .map(|idx| &self.added[*idx])
            .or_else(|| self.committed.get(key))
            .map(|node| Arc::clone(node.service()))
    }

    /// Keys staged so far, in registration order
    pub fn added_keys(&self) -> Vec<ServiceKey> {
        self.added.iter().map(|node| node.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    /// Hand the staged nodes over, in registration order
    pub(crate) fn into_batch(self) -> Vec<Arc<ServiceNode>> {
        self.added
    }
}
