//! Match strategies, desired states and output encodings
//!
//! Identifiers arrive as strings from the CLI and the config file; parsing
//! them is where an unknown identifier becomes a fatal planning error.

use crate::error::PlanningError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much of a scope is resubmitted once a difference is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Only statements missing from the running configuration
    #[default]
    Line,
    /// The whole candidate scope if anything is missing
    Block,
    /// The whole candidate scope if anything is missing or the top-level order differs
    Exact,
    /// The whole candidate scope, without reading the running configuration
    Force,
    /// Positional comparison of the top-level sequence
    Strict,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 5] = [
        MatchStrategy::Line,
        MatchStrategy::Block,
        MatchStrategy::Exact,
        MatchStrategy::Force,
        MatchStrategy::Strict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Line => "line",
            MatchStrategy::Block => "block",
            MatchStrategy::Exact => "exact",
            MatchStrategy::Force => "force",
            MatchStrategy::Strict => "strict",
        }
    }

    /// Whether planning needs the running configuration at all
    pub fn reads_current(&self) -> bool {
        !matches!(self, MatchStrategy::Force)
    }
}

impl FromStr for MatchStrategy {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchStrategy::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| PlanningError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired state for substitution planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl FromStr for DesiredState {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            _ => Err(PlanningError::UnknownState(s.to_string())),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Present => f.write_str("present"),
            DesiredState::Absent => f.write_str("absent"),
        }
    }
}

/// Shape of the assembled command list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Context lines followed by nested commands
    #[default]
    Hierarchical,
    /// One flattened `<action> <path...> <leaf>` line per leaf
    Set { action: String },
}

impl FromStr for Encoding {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hierarchical" | "block" => Ok(Encoding::Hierarchical),
            "set" => Ok(Encoding::Set {
                action: "set".to_string(),
            }),
            _ => Err(PlanningError::UnknownEncoding(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_strategies() {
        for strategy in MatchStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<MatchStrategy>().unwrap(), strategy);
        }
        assert_eq!("EXACT".parse::<MatchStrategy>().unwrap(), MatchStrategy::Exact);
    }

    #[test]
    fn test_unknown_strategy_is_planning_error() {
        let err = "changed".parse::<MatchStrategy>().unwrap_err();
        assert_eq!(err, PlanningError::UnknownStrategy("changed".to_string()));
    }

    #[test]
    fn test_force_does_not_read_current() {
        assert!(!MatchStrategy::Force.reads_current());
        assert!(MatchStrategy::Line.reads_current());
    }

    #[test]
    fn test_desired_state_parse() {
        assert_eq!("absent".parse::<DesiredState>().unwrap(), DesiredState::Absent);
        assert!("gone".parse::<DesiredState>().is_err());
    }

    #[test]
    fn test_encoding_parse() {
        assert_eq!("hierarchical".parse::<Encoding>().unwrap(), Encoding::Hierarchical);
        assert_eq!(
            "set".parse::<Encoding>().unwrap(),
            Encoding::Set {
                action: "set".to_string()
            }
        );
        assert!(matches!(
            "xml".parse::<Encoding>(),
            Err(PlanningError::UnknownEncoding(_))
        ));
    }
}
