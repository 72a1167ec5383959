use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ActionError;

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

/// The kind of resource an Action applies to. Doubles as the resource scheme
/// (`member:`, `streamfile:`, `file:`, `object:`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Member,
    Streamfile,
    File,
    Object,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::Member,
            ActionType::Streamfile,
            ActionType::File,
            ActionType::Object,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Member => "member",
            ActionType::Streamfile => "streamfile",
            ActionType::File => "file",
            ActionType::Object => "object",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(ActionType::Member),
            "streamfile" => Ok(ActionType::Streamfile),
            "file" => Ok(ActionType::File),
            "object" => Ok(ActionType::Object),
            _ => Err(ActionError::UnknownResourceType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Remote execution environment a command is dispatched through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Ile,
    Qsh,
    Pase,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Ile => "ile",
            Environment::Qsh => "qsh",
            Environment::Pase => "pase",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ile" => Ok(Environment::Ile),
            "qsh" => Ok(Environment::Qsh),
            "pase" => Ok(Environment::Pase),
            _ => Err(ActionError::UnknownEnvironment(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshPolicy
// ---------------------------------------------------------------------------

/// What to invalidate in the resource tree once a run is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    #[default]
    No,
    Parent,
    Filter,
    Browser,
}

impl RefreshPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshPolicy::No => "no",
            RefreshPolicy::Parent => "parent",
            RefreshPolicy::Filter => "filter",
            RefreshPolicy::Browser => "browser",
        }
    }
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_parses_every_scheme() {
        for kind in ActionType::all() {
            let parsed: ActionType = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
        assert!("qsys".parse::<ActionType>().is_err());
    }

    #[test]
    fn environment_defaults_to_ile() {
        assert_eq!(Environment::default(), Environment::Ile);
        assert_eq!("pase".parse::<Environment>().unwrap(), Environment::Pase);
        assert!("bash".parse::<Environment>().is_err());
    }

    #[test]
    fn refresh_policy_serializes_lowercase() {
        let json = serde_json::to_string(&RefreshPolicy::Filter).unwrap();
        assert_eq!(json, "\"filter\"");
        let parsed: RefreshPolicy = serde_json::from_str("\"no\"").unwrap();
        assert_eq!(parsed, RefreshPolicy::No);
    }
}
