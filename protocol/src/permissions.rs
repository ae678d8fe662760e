use serde::Deserialize;
use serde::Serialize;

use crate::exec::ExecutionMode;

/// Per-mission command restrictions.
///
/// `blocked_commands` is always consulted before `allowed_commands`. An
/// `allowed_commands` of `Some(vec![])` denies everything; `None` means the
/// mission has no allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
    /// Upper bound for a request's timeout, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<u64>,
}

impl PermissionSet {
    pub fn allow_only<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_commands: Some(prefixes.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn block<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_commands
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    pub fn with_max_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout = Some(seconds);
        self
    }
}
