use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Outcome of [`crate::PermissionPolicy::check`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow(reason) => reason.fmt(f),
            Decision::Deny(reason) => reason.fmt(f),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    NoMission,
    NoRestrictions,
    MatchedAllowed { pattern: String },
    AllowedByDefault,
}

impl fmt::Display for AllowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowReason::NoMission => f.write_str("no mission context"),
            AllowReason::NoRestrictions => f.write_str("no restrictions for mission"),
            AllowReason::MatchedAllowed { pattern } => {
                write!(f, "matches allowed pattern: {pattern}")
            }
            AllowReason::AllowedByDefault => f.write_str("allowed by default"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Blocked { pattern: String },
    NotInAllowedList,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Blocked { pattern } => {
                write!(f, "command matches blocked pattern: {pattern}")
            }
            DenyReason::NotInAllowedList => f.write_str("command not in allowed list for mission"),
        }
    }
}
