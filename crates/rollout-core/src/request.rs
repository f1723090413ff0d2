//! The inbound deployment request and its validation.

use crate::id::ExecutionId;
use crate::module::ModuleRef;
use crate::{Environment, Error, Result, StrategyKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to roll out a module version to an environment. Corresponds to
/// the body of `POST /deployments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub execution_id: ExecutionId,
    pub module: ModuleRef,
    pub environment: Environment,
    pub strategy: StrategyKind,
    pub require_approval: bool,
    pub requester_email: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DeploymentRequest {
    /// Validation performed in the orchestrator's `Validating` state.
    /// Cluster emptiness is checked separately once the cluster is resolved
    /// (the request alone doesn't carry cluster membership).
    pub fn validate(&self) -> Result<()> {
        if !self.module.is_valid() {
            return Err(Error::InvalidRequest(
                "module name and version must be non-empty".into(),
            ));
        }
        if self.requester_email.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "requester_email must be non-empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> DeploymentRequest {
        DeploymentRequest {
            execution_id: ExecutionId::new(),
            module: ModuleRef::new("checkout", "1.0.0"),
            environment: Environment::Staging,
            strategy: StrategyKind::Direct,
            require_approval: false,
            requester_email: "dev@example.com".to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn empty_module_name_is_rejected() {
        let mut request = valid_request();
        request.module = ModuleRef::new("", "1.0.0");
        assert!(matches!(request.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn blank_requester_email_is_rejected() {
        let mut request = valid_request();
        request.requester_email = "   ".to_string();
        assert!(matches!(request.validate(), Err(Error::InvalidRequest(_))));
    }
}
