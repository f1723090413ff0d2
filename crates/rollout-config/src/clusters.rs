//! Static cluster membership, loaded once at startup.
//!
//! Node membership isn't named as durable state anywhere in the data model —
//! only `deployment_jobs` and `approval_requests` are — so it is configured
//! the same way as the orchestrator's tunables: a KDL document parsed once
//! into [`rollout_core::cluster::ClusterRegistry`].
//!
//! ```kdl
//! clusters {
//!     environment "Development" {
//!         node "dev-1.internal" 8080
//!     }
//!     environment "Production" {
//!         node "prod-1.internal" 8080
//!         node "prod-2.internal" 8080
//!     }
//! }
//! ```

use crate::{ConfigError, ConfigResult};
use kdl::KdlDocument;
use rollout_core::node::Node;
use rollout_core::Environment;
use std::str::FromStr;

/// One environment's statically configured node list.
pub struct ClusterSeed {
    pub environment: Environment,
    pub nodes: Vec<Node>,
}

pub fn parse_clusters(kdl: &str) -> ConfigResult<Vec<ClusterSeed>> {
    let doc: KdlDocument = kdl.parse()?;
    let Some(clusters_node) = doc.nodes().iter().find(|n| n.name().value() == "clusters") else {
        return Ok(Vec::new());
    };
    let children = clusters_node.children().cloned().unwrap_or_default();

    let mut seeds = Vec::new();
    for env_node in children.nodes().iter().filter(|n| n.name().value() == "environment") {
        let name = env_node
            .entries()
            .first()
            .and_then(|e| e.value().as_string())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "environment".to_string(),
                message: "expected the environment name as a string argument".to_string(),
            })?;
        let environment = Environment::from_str(name).map_err(|_| ConfigError::InvalidValue {
            field: "environment".to_string(),
            message: format!("unrecognized environment {name}"),
        })?;

        let node_children = env_node.children().cloned().unwrap_or_default();
        let mut nodes = Vec::new();
        for node_entry in node_children.nodes().iter().filter(|n| n.name().value() == "node") {
            let hostname = node_entry
                .entries()
                .first()
                .and_then(|e| e.value().as_string())
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "node".to_string(),
                    message: "expected hostname as the first argument".to_string(),
                })?;
            let port = node_entry
                .entries()
                .get(1)
                .and_then(|e| e.value().as_integer())
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "node".to_string(),
                    message: "expected port as the second argument".to_string(),
                })?;
            nodes.push(Node::new(hostname, port as u16, environment));
        }

        seeds.push(ClusterSeed { environment, nodes });
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_no_clusters() {
        assert!(parse_clusters("").unwrap().is_empty());
    }

    #[test]
    fn parses_nodes_per_environment() {
        let kdl = r#"
            clusters {
                environment "Development" {
                    node "dev-1.internal" 8080
                }
                environment "Production" {
                    node "prod-1.internal" 8080
                    node "prod-2.internal" 8080
                }
            }
        "#;
        let seeds = parse_clusters(kdl).unwrap();
        assert_eq!(seeds.len(), 2);
        let production = seeds
            .iter()
            .find(|s| s.environment == Environment::Production)
            .unwrap();
        assert_eq!(production.nodes.len(), 2);
        assert_eq!(production.nodes[0].hostname, "prod-1.internal");
        assert_eq!(production.nodes[0].port, 8080);
    }
}
