//! Cluster: the set of nodes targeted by a deployment in one environment.

use crate::node::Node;
use crate::{Environment, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The nodes for a single environment, snapshotted at the moment a pipeline
/// starts. Cluster membership is immutable for the lifetime of a pipeline
/// even if the registry's live membership changes underneath it.
#[derive(Debug, Clone)]
pub struct EnvironmentCluster {
    pub environment: Environment,
    nodes: Vec<Node>,
}

impl EnvironmentCluster {
    pub fn new(environment: Environment, nodes: Vec<Node>) -> Self {
        Self { environment, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn healthy_nodes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.status == crate::node::NodeStatus::Healthy)
            .count()
    }

    /// Nodes sorted deterministically by hostname — the ordering every
    /// strategy builds batches/phases from.
    pub fn sorted_nodes(&self) -> Vec<Node> {
        let mut nodes = self.nodes.clone();
        nodes.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        nodes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Holds the set of `(environment -> cluster)` mappings. Replica-local;
/// membership changes are visible immediately to new pipelines but never
/// to pipelines already in flight (they hold their own snapshot).
#[derive(Clone, Default)]
pub struct ClusterRegistry {
    clusters: Arc<RwLock<HashMap<Environment, EnvironmentCluster>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cluster: EnvironmentCluster) {
        self.clusters
            .write()
            .expect("cluster registry lock poisoned")
            .insert(cluster.environment, cluster);
    }

    /// Snapshot the cluster for `env`. Fails with `UnknownEnvironment` if no
    /// cluster has been registered for it.
    pub fn get(&self, env: Environment) -> Result<EnvironmentCluster> {
        self.clusters
            .read()
            .expect("cluster registry lock poisoned")
            .get(&env)
            .cloned()
            .ok_or_else(|| Error::UnknownEnvironment(env.to_string()))
    }

    pub fn environments(&self) -> Vec<Environment> {
        self.clusters
            .read()
            .expect("cluster registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }
}
