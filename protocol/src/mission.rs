use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use strum::Display;
use strum::EnumString;

use crate::exec::ExecutionMode;
use crate::exec::ExecutionResult;
use crate::exec::ExecutionStatus;
use crate::exec::ShellType;
use crate::permissions::PermissionSet;

/// Number of characters of stdout/stderr kept on a [`CommandRecord`].
pub const OUTPUT_PREVIEW_CHARS: usize = 500;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissionStatus {
    #[default]
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// Audit entry for one command run inside a mission. Never mutated after it
/// is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: String,
    pub command: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub shell_type: Option<ShellType>,
    #[serde(default)]
    pub stdout_preview: String,
    #[serde(default)]
    pub stderr_preview: String,
    #[serde(default)]
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandRecord {
    pub fn from_result(id: impl Into<String>, result: &ExecutionResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            command: result.command.clone(),
            status: result.status,
            exit_code: result.exit_code,
            shell_type: result.shell_type,
            stdout_preview: preview(&result.stdout),
            stderr_preview: preview(&result.stderr),
            duration_ms: result.duration_ms,
            timestamp,
            error: result.error.clone(),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(OUTPUT_PREVIEW_CHARS).collect()
}

/// A named, permission-scoped grouping of command executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: MissionStatus,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub yolo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commands: Vec<CommandRecord>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub allowed_commands: Option<Vec<String>>,
    #[serde(default)]
    pub blocked_commands: Option<Vec<String>>,
    #[serde(default)]
    pub max_timeout: Option<u64>,
}

impl Mission {
    pub fn new(id: impl Into<String>, params: CreateMissionParams, now: DateTime<Utc>) -> Self {
        let CreateMissionParams {
            name,
            description,
            yolo,
            execution_mode,
            allowed_commands,
            blocked_commands,
            max_timeout,
            metadata,
        } = params;
        let execution_mode = if yolo {
            ExecutionMode::Yolo
        } else {
            execution_mode.unwrap_or_default()
        };
        Self {
            id: id.into(),
            name,
            description,
            status: MissionStatus::Pending,
            execution_mode,
            yolo,
            created_at: now,
            updated_at: now,
            completed_at: None,
            commands: Vec::new(),
            metadata: metadata.unwrap_or_default(),
            allowed_commands,
            blocked_commands,
            max_timeout,
        }
    }

    /// Applies `update` and refreshes `updated_at`. Setting `yolo` to true
    /// forces YOLO mode even if the same update names another mode.
    pub fn apply_update(&mut self, update: MissionUpdate, now: DateTime<Utc>) {
        let MissionUpdate {
            name,
            description,
            status,
            execution_mode,
            yolo,
            completed_at,
            metadata,
            allowed_commands,
            blocked_commands,
            max_timeout,
        } = update;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(mode) = execution_mode {
            self.execution_mode = mode;
        }
        if let Some(yolo) = yolo {
            self.yolo = yolo;
            if yolo {
                self.execution_mode = ExecutionMode::Yolo;
            }
        }
        if let Some(completed_at) = completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
        if let Some(allowed_commands) = allowed_commands {
            self.allowed_commands = allowed_commands;
        }
        if let Some(blocked_commands) = blocked_commands {
            self.blocked_commands = blocked_commands;
        }
        if let Some(max_timeout) = max_timeout {
            self.max_timeout = max_timeout;
        }
        self.updated_at = now;
    }

    /// The restrictions this mission imposes on command execution.
    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet {
            allowed_commands: self.allowed_commands.clone(),
            blocked_commands: self.blocked_commands.clone().unwrap_or_default(),
            execution_mode: Some(self.execution_mode),
            max_timeout: self.max_timeout,
        }
    }
}

/// Fields accepted when creating a mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateMissionParams {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub yolo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CreateMissionParams {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a mission. Absent fields are left untouched; the
/// nullable permission fields use `Some(None)` to clear a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MissionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yolo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_commands: Option<Option<Vec<String>>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub blocked_commands: Option<Option<Vec<String>>>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_timeout: Option<Option<u64>>,
}

impl MissionUpdate {
    pub fn status(status: MissionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Overwrites every permission field of a mission with `permissions`.
    pub fn permissions(permissions: PermissionSet) -> Self {
        let PermissionSet {
            allowed_commands,
            blocked_commands,
            execution_mode,
            max_timeout,
        } = permissions;
        Self {
            execution_mode,
            allowed_commands: Some(allowed_commands),
            blocked_commands: Some(Some(blocked_commands)),
            max_timeout: Some(max_timeout),
            ..Self::default()
        }
    }
}

/// Aggregate counts over a mission's command log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStats {
    pub mission_id: String,
    pub total_commands: usize,
    pub completed: usize,
    pub failed: usize,
    pub other: usize,
    pub total_duration_ms: u64,
    pub avg_duration_ms: u64,
}
