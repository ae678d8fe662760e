//! Messages exchanged with the transport. Each line on the wire is one JSON
//! object whose `type` field selects the variant.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use strum::IntoStaticStr;

use crate::approvals::ExecApprovalRequestEvent;
use crate::approvals::ReviewDecision;
use crate::exec::ExecEvent;
use crate::exec::ExecOutputDeltaEvent;
use crate::exec::ExecStatusEvent;
use crate::exec::ExecutionRequest;
use crate::exec::ExecutionResult;
use crate::exec::ShellType;
use crate::mission::CommandRecord;
use crate::mission::CreateMissionParams;
use crate::mission::Mission;
use crate::mission::MissionStats;
use crate::mission::MissionStatus;
use crate::mission::MissionUpdate;
use crate::permissions::PermissionSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InboundMessage {
    ExecuteCommand(ExecutionRequest),
    ApprovalDecision {
        request_id: String,
        decision: ReviewDecision,
    },
    CancelCommand {
        request_id: String,
    },
    MissionCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission: CreateMissionParams,
    },
    MissionGet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
    },
    MissionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        update: MissionUpdate,
    },
    MissionList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<MissionStatus>,
    },
    MissionDelete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
    },
    MissionHistory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    MissionStats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
    },
    SetPermissions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        permissions: PermissionSet,
    },
    RemovePermissions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
    },
    ListShells {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl InboundMessage {
    /// The wire name of this message, e.g. `"execute_command"`.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            InboundMessage::ExecuteCommand(request) => Some(&request.id),
            InboundMessage::ApprovalDecision { request_id, .. }
            | InboundMessage::CancelCommand { request_id } => Some(request_id),
            InboundMessage::MissionCreate { request_id, .. }
            | InboundMessage::MissionGet { request_id, .. }
            | InboundMessage::MissionUpdate { request_id, .. }
            | InboundMessage::MissionList { request_id, .. }
            | InboundMessage::MissionDelete { request_id, .. }
            | InboundMessage::MissionHistory { request_id, .. }
            | InboundMessage::MissionStats { request_id, .. }
            | InboundMessage::SetPermissions { request_id, .. }
            | InboundMessage::RemovePermissions { request_id, .. }
            | InboundMessage::ListShells { request_id }
            | InboundMessage::Ping { request_id }
            | InboundMessage::Sync { request_id } => request_id.as_deref(),
        }
    }
}

/// One entry of the `shells` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellInfo {
    pub shell_type: ShellType,
    /// Invocation prefix; the command text is appended as the final argument.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ExecOutput(ExecOutputDeltaEvent),
    ExecStatus(ExecStatusEvent),
    ApprovalRequest(ExecApprovalRequestEvent),
    CommandResult {
        request_id: String,
        result: ExecutionResult,
    },
    CancelResult {
        request_id: String,
        cancelled: bool,
    },
    MissionCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission: Mission,
    },
    Mission {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        mission: Option<Mission>,
    },
    MissionUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        mission: Option<Mission>,
    },
    MissionList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        missions: Vec<Mission>,
    },
    MissionDeleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        deleted: bool,
    },
    MissionHistory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        commands: Vec<CommandRecord>,
    },
    MissionStats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        stats: Option<MissionStats>,
    },
    /// Carries the set now in force, which can differ from the one sent:
    /// for a stored mission an absent `execution_mode` is filled with the
    /// mission's own mode.
    PermissionsUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        mission_id: String,
        /// `None` after the permission set was removed.
        permissions: Option<PermissionSet>,
    },
    Shells {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        shells: Vec<ShellInfo>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SyncComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        missions: usize,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_type: Option<String>,
        message: String,
    },
}

impl From<ExecEvent> for OutboundMessage {
    fn from(event: ExecEvent) -> Self {
        match event {
            ExecEvent::OutputDelta(delta) => OutboundMessage::ExecOutput(delta),
            ExecEvent::Status(status) => OutboundMessage::ExecStatus(status),
        }
    }
}
