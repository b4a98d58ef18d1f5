use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::service_system::traits::{Service, ServiceKey};

/// A service's position in the dependency graph.
///
/// Everything except the running flag is fixed at construction. Dependencies
/// are held weakly; the graph owns every node.
pub struct ServiceNode {
    key: ServiceKey,
    service: Arc<dyn Service>,
    dependencies: Vec<Weak<ServiceNode>>,
    running: AtomicBool,
}

impl ServiceNode {
    /// Create a node that is not yet running
    pub fn new(service: Arc<dyn Service>, key: ServiceKey, dependencies: Vec<Weak<ServiceNode>>) -> Self {
        Self {
            key,
            service,
            dependencies,
            running: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    /// Dependencies that are still alive, in declaration order
    pub fn dependencies(&self) -> Vec<Arc<ServiceNode>> {
        self.dependencies.iter().filter_map(Weak::upgrade).collect()
    }

    /// Keys of the live dependencies, in declaration order
    pub fn dependency_keys(&self) -> Vec<ServiceKey> {
        self.dependencies()
            .iter()
            .map(|dep| dep.key.clone())
            .collect()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// True when every dependency is running. A dependency that can no
    /// longer be reached counts as not running.
    pub fn dependencies_running(&self) -> bool {
        self.dependencies
            .iter()
            .all(|dep| dep.upgrade().is_some_and(|node| node.is_running()))
    }

    /// Ready to start: not running yet, all dependencies running
    pub fn is_ready(&self) -> bool {
        !self.is_running() && self.dependencies_running()
    }

    /// Flip the flag after a confirmed successful load. Only the controller's
    /// scheduling task calls this.
    pub(crate) fn mark_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Whether `service` is the same instance this node wraps
    pub(crate) fn wraps(&self, service: &Arc<dyn Service>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.service), Arc::as_ptr(service))
    }
}

impl fmt::Display for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] => running={} <{}> dependencies: [",
            self.key,
            self.is_running(),
            self.service.name()
        )?;
        for (idx, dep) in self.dependencies.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match dep.upgrade() {
                Some(node) => write!(f, "{}", node)?,
                None => f.write_str("<dropped>")?,
            }
        }
        f.write_str("]")
    }
}

// Manual Debug: the service is a trait object without a Debug bound
impl fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNode")
            .field("key", &self.key)
            .field("running", &self.is_running())
            .field("service", &self.service.name())
            .field("dependencies", &self.dependency_keys())
            .finish()
    }
}
