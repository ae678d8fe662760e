use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use strum::Display;
use strum::EnumString;

/// Timeout applied when a request does not carry one.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Shell interpreter a command is run under. `Auto` asks the resolver to pick
/// the platform's preferred interpreter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShellType {
    PowerShell,
    Cmd,
    Wsl2,
    Bash,
    Sh,
    #[default]
    Auto,
}

/// Governs whether a command needs explicit sign-off before it runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionMode {
    /// Every command asks for approval.
    #[default]
    Assisted,
    /// Nothing asks for approval.
    Yolo,
    /// Only commands outside the whitelist ask for approval.
    Whitelist,
}

/// Lifecycle of a single execution request.
///
/// ```text
/// Pending -> [AwaitingApproval -> Approved | Rejected] -> Running
///         -> Completed | Failed | Timeout | Cancelled
/// ```
///
/// `Failed` and `PermissionDenied` are also reachable straight from `Pending`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    AwaitingApproval,
    Approved,
    Rejected,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
    PermissionDenied,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Rejected
                | ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Timeout
                | ExecutionStatus::Cancelled
                | ExecutionStatus::PermissionDenied
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (
                Pending,
                AwaitingApproval | Running | Failed | PermissionDenied
            ) | (AwaitingApproval, Approved | Rejected)
                | (Approved, Running | Failed)
                | (Running, Completed | Failed | Timeout | Cancelled)
        )
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// An explicit `null` means the same as an absent key.
fn deserialize_timeout_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
}

/// A command submitted for execution. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(
        default = "default_timeout_seconds",
        deserialize_with = "deserialize_timeout_seconds"
    )]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub shell_type: ShellType,
}

impl ExecutionRequest {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            mission_id: None,
            cwd: None,
            env: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            shell_type: ShellType::Auto,
        }
    }

    pub fn with_mission(mut self, mission_id: impl Into<String>) -> Self {
        self.mission_id = Some(mission_id.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_shell(mut self, shell_type: ShellType) -> Self {
        self.shell_type = shell_type;
        self
    }
}

/// Outcome of a request. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: String,
    pub status: ExecutionStatus,
    /// Shell the command ran under; absent when resolution never happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_type: Option<ShellType>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub mission_id: Option<String>,
}

impl ExecutionResult {
    pub fn new(command: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            command: command.into(),
            status,
            shell_type: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            error: None,
            mission_id: None,
        }
    }

    pub fn success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecOutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutputDeltaEvent {
    pub request_id: String,
    pub stream: ExecOutputStream,
    /// UTF-8 text; invalid sequences are replaced with U+FFFD.
    pub chunk: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStatusEvent {
    pub request_id: String,
    pub status: ExecutionStatus,
}

/// Events emitted while a request is in flight, correlated by request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecEvent {
    #[serde(rename = "exec_output")]
    OutputDelta(ExecOutputDeltaEvent),
    #[serde(rename = "exec_status")]
    Status(ExecStatusEvent),
}

impl ExecEvent {
    pub fn output(
        request_id: impl Into<String>,
        stream: ExecOutputStream,
        chunk: impl Into<String>,
    ) -> Self {
        ExecEvent::OutputDelta(ExecOutputDeltaEvent {
            request_id: request_id.into(),
            stream,
            chunk: chunk.into(),
        })
    }

    pub fn status(request_id: impl Into<String>, status: ExecutionStatus) -> Self {
        ExecEvent::Status(ExecStatusEvent {
            request_id: request_id.into(),
            status,
        })
    }

    pub fn request_id(&self) -> &str {
        match self {
            ExecEvent::OutputDelta(event) => &event.request_id,
            ExecEvent::Status(event) => &event.request_id,
        }
    }
}
