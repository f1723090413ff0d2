//! Deployment strategy selection.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StrategyKind {
    Direct,
    Rolling,
    BlueGreen,
    Canary,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Direct => "Direct",
            StrategyKind::Rolling => "Rolling",
            StrategyKind::BlueGreen => "BlueGreen",
            StrategyKind::Canary => "Canary",
        };
        write!(f, "{s}")
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "direct" => Ok(StrategyKind::Direct),
            "rolling" => Ok(StrategyKind::Rolling),
            "bluegreen" => Ok(StrategyKind::BlueGreen),
            "canary" => Ok(StrategyKind::Canary),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_and_snake_case_spellings() {
        assert_eq!("blue-green".parse::<StrategyKind>().unwrap(), StrategyKind::BlueGreen);
        assert_eq!("blue_green".parse::<StrategyKind>().unwrap(), StrategyKind::BlueGreen);
        assert_eq!("ROLLING".parse::<StrategyKind>().unwrap(), StrategyKind::Rolling);
    }

    #[test]
    fn unknown_value_is_an_error() {
        let err = "leapfrog".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownStrategy(_)));
    }
}
