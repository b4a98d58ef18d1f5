use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::service_system::error::ServiceSystemError;
use crate::service_system::node::ServiceNode;
use crate::service_system::traits::ServiceKey;

/// The committed dependency graph: every node the controller owns, by key.
///
/// Nodes are only ever added. A merge either inserts a whole batch or
/// nothing.
#[derive(Debug, Default)]
pub struct ServiceGraph {
    nodes: HashMap<ServiceKey, Arc<ServiceNode>>,
}

impl ServiceGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<ServiceNode>> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn keys(&self) -> Vec<ServiceKey> {
        self.nodes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &Arc<ServiceNode>)> {
        self.nodes.iter()
    }

    /// Nodes not yet running whose dependencies are all running
    pub fn ready_nodes(&self) -> Vec<Arc<ServiceNode>> {
        self.nodes
            .values()
            .filter(|node| node.is_ready())
            .cloned()
            .collect()
    }

    /// Keys of every node that is not running yet
    pub fn pending_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self
            .nodes
            .values()
            .filter(|node| !node.is_running())
            .map(|node| node.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Keys of every running node
    pub fn running_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self
            .nodes
            .values()
            .filter(|node| node.is_running())
            .map(|node| node.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Insert `batch` into the graph.
    ///
    /// Fails without inserting anything if a key is already present, if the
    /// batch repeats a key, or (with `detect_cycles`) if the merged graph
    /// would contain a cycle.
    pub fn merge(&mut self, batch: Vec<Arc<ServiceNode>>, detect_cycles: bool) -> Result<(), ServiceSystemError> {
        let mut batch_keys = HashSet::new();
        for node in &batch {
            if self.nodes.contains_key(node.key()) || !batch_keys.insert(node.key().clone()) {
                return Err(ServiceSystemError::DuplicateKey {
                    key: node.key().clone(),
                });
            }
        }

        if detect_cycles {
            let cyclic = self.cyclic_keys(&batch);
            if !cyclic.is_empty() {
                return Err(ServiceSystemError::DependencyCycle { path: cyclic });
            }
        }

        for node in batch {
            self.nodes.insert(node.key().clone(), node);
        }
        Ok(())
    }

    /// Kahn's algorithm over the committed graph plus `batch`.
    /// Returns the keys that could not be ordered (empty when acyclic).
    fn cyclic_keys(&self, batch: &[Arc<ServiceNode>]) -> Vec<ServiceKey> {
        let all: Vec<&Arc<ServiceNode>> = self.nodes.values().chain(batch.iter()).collect();
        let known: HashSet<&ServiceKey> = all.iter().map(|node| node.key()).collect();

        // node -> number of its dependencies still unordered
        let mut remaining: HashMap<ServiceKey, usize> = HashMap::new();
        // dependency -> nodes that depend on it
        let mut dependents: HashMap<ServiceKey, Vec<ServiceKey>> = HashMap::new();

        for node in &all {
            let deps: Vec<ServiceKey> = node
                .dependency_keys()
                .into_iter()
                .filter(|dep| known.contains(dep))
                .collect();
            remaining.insert(node.key().clone(), deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(node.key().clone());
            }
        }

        let mut queue: VecDeque<ServiceKey> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(key, _)| key.clone())
            .collect();

        while let Some(key) = queue.pop_front() {
            if let Some(children) = dependents.get(&key) {
                for child in children {
                    if let Some(count) = remaining.get_mut(child) {
                        *count -= 1;
                        if *count == 0 {
                            queue.push_back(child.clone());
                        }
                    }
                }
            }
            remaining.remove(&key);
        }

        let mut cyclic: Vec<ServiceKey> = remaining.into_keys().collect();
        cyclic.sort();
        cyclic
    }
}
