use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use strum::Display;

/// Sent to the approval mechanism when a command needs sign-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecApprovalRequestEvent {
    pub request_id: String,
    /// The trimmed command that would run.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Operator's answer to an [`ExecApprovalRequestEvent`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    #[default]
    Denied,
}

impl ReviewDecision {
    pub fn is_approved(self) -> bool {
        self == ReviewDecision::Approved
    }
}

impl From<bool> for ReviewDecision {
    fn from(approved: bool) -> Self {
        if approved {
            ReviewDecision::Approved
        } else {
            ReviewDecision::Denied
        }
    }
}
