//! Module identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A versioned module to roll out. Opaque to the core: no semver parsing,
/// no registry lookups. Two `ModuleRef`s are the same deployment target iff
/// their `name` matches; `version` only distinguishes *which* build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleRef {
    pub name: String,
    pub version: String,
}

impl ModuleRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.version.trim().is_empty()
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_or_version_is_invalid() {
        assert!(!ModuleRef::new("", "1.0.0").is_valid());
        assert!(!ModuleRef::new("checkout", "  ").is_valid());
        assert!(ModuleRef::new("checkout", "1.0.0").is_valid());
    }

    #[test]
    fn display_is_name_at_version() {
        assert_eq!(ModuleRef::new("checkout", "1.2.3").to_string(), "checkout@1.2.3");
    }
}
