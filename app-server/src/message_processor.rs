use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;
use warden_core::ExecutionEngine;
use warden_protocol::ExecutionRequest;
use warden_protocol::InboundMessage;
use warden_protocol::Mission;
use warden_protocol::OutboundMessage;
use warden_protocol::PermissionSet;
use warden_protocol::mission::MissionUpdate;
use warden_state::DEFAULT_HISTORY_LIMIT;
use warden_state::MissionStore;

use crate::outgoing_message::OutgoingMessageSender;

/// Dispatches decoded client messages to the engine and the mission store.
pub(crate) struct MessageProcessor {
    outgoing: Arc<OutgoingMessageSender>,
    engine: Arc<ExecutionEngine>,
    store: Arc<MissionStore>,
}

impl MessageProcessor {
    pub(crate) fn new(
        outgoing: Arc<OutgoingMessageSender>,
        engine: Arc<ExecutionEngine>,
        store: Arc<MissionStore>,
    ) -> Self {
        let processor = Self {
            outgoing,
            engine,
            store,
        };
        processor.register_all_permissions();
        processor
    }

    /// Registers every stored mission's permission set with the engine.
    pub(crate) fn register_all_permissions(&self) {
        let sets = self.store.permission_sets();
        debug!(count = sets.len(), "registering mission permissions");
        for (mission_id, permissions) in sets {
            self.engine.set_permissions(&mission_id, permissions);
        }
    }

    /// Denies approvals still waiting for a client that has gone away.
    pub(crate) async fn shutdown(&self) {
        let denied = self.outgoing.deny_pending_approvals().await;
        if denied > 0 {
            info!(denied, "denied pending approvals on shutdown");
        }
    }

    pub(crate) async fn process_message(&self, message: InboundMessage) {
        let request_type = message.kind();
        let request_id = message.request_id().map(ToString::to_string);
        debug!(request_type, ?request_id, "processing message");

        match self.dispatch(message).await {
            Ok(Some(reply)) => self.outgoing.send(reply).await,
            Ok(None) => {}
            Err(err) => {
                warn!(request_type, ?request_id, "request failed: {err:#}");
                self.outgoing
                    .send_error(request_id, request_type, format!("{err:#}"))
                    .await;
            }
        }
    }

    async fn dispatch(&self, message: InboundMessage) -> anyhow::Result<Option<OutboundMessage>> {
        let reply = match message {
            InboundMessage::ExecuteCommand(request) => {
                self.spawn_execute(request);
                return Ok(None);
            }
            InboundMessage::ApprovalDecision {
                request_id,
                decision,
            } => {
                if !self.outgoing.notify_approval(&request_id, decision).await {
                    anyhow::bail!("no pending approval for request {request_id}");
                }
                return Ok(None);
            }
            InboundMessage::CancelCommand { request_id } => {
                let cancelled = self.engine.cancel(&request_id);
                OutboundMessage::CancelResult {
                    request_id,
                    cancelled,
                }
            }
            InboundMessage::MissionCreate {
                request_id,
                mission,
            } => {
                let mission = self.store.create(mission);
                self.register_permissions(&mission);
                OutboundMessage::MissionCreated {
                    request_id,
                    mission,
                }
            }
            InboundMessage::MissionGet {
                request_id,
                mission_id,
            } => OutboundMessage::Mission {
                request_id,
                mission: self.store.get(&mission_id),
                mission_id,
            },
            InboundMessage::MissionUpdate {
                request_id,
                mission_id,
                update,
            } => {
                let mission = self.store.update(&mission_id, update);
                if let Some(mission) = &mission {
                    self.register_permissions(mission);
                }
                OutboundMessage::MissionUpdated {
                    request_id,
                    mission_id,
                    mission,
                }
            }
            InboundMessage::MissionList { request_id, status } => OutboundMessage::MissionList {
                request_id,
                missions: self.store.list(status),
            },
            InboundMessage::MissionDelete {
                request_id,
                mission_id,
            } => {
                let deleted = self.store.delete(&mission_id);
                self.engine.remove_permissions(&mission_id);
                OutboundMessage::MissionDeleted {
                    request_id,
                    mission_id,
                    deleted,
                }
            }
            InboundMessage::MissionHistory {
                request_id,
                mission_id,
                limit,
            } => {
                let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
                let Some(commands) = self.store.command_history(&mission_id, limit) else {
                    anyhow::bail!("mission not found: {mission_id}");
                };
                OutboundMessage::MissionHistory {
                    request_id,
                    mission_id,
                    commands,
                }
            }
            InboundMessage::MissionStats {
                request_id,
                mission_id,
            } => OutboundMessage::MissionStats {
                request_id,
                stats: self.store.stats(&mission_id),
            },
            InboundMessage::SetPermissions {
                request_id,
                mission_id,
                permissions,
            } => {
                let permissions = self.set_permissions(&mission_id, permissions);
                OutboundMessage::PermissionsUpdated {
                    request_id,
                    mission_id,
                    permissions: Some(permissions),
                }
            }
            InboundMessage::RemovePermissions {
                request_id,
                mission_id,
            } => {
                self.engine.remove_permissions(&mission_id);
                OutboundMessage::PermissionsUpdated {
                    request_id,
                    mission_id,
                    permissions: None,
                }
            }
            InboundMessage::ListShells { request_id } => OutboundMessage::Shells {
                request_id,
                shells: self.engine.available_shells().to_shell_infos(),
            },
            InboundMessage::Ping { request_id } => OutboundMessage::Pong {
                request_id,
                timestamp: Utc::now(),
            },
            InboundMessage::Sync { request_id } => {
                let missions = self.store.sync_from_backend().await;
                self.register_all_permissions();
                OutboundMessage::SyncComplete {
                    request_id,
                    missions,
                }
            }
        };
        Ok(Some(reply))
    }

    /// Stores `permissions` on the mission when it exists and registers the
    /// resulting set with the engine. Returns the set in force, which keeps
    /// the stored mission's mode when `permissions` names none.
    fn set_permissions(&self, mission_id: &str, permissions: PermissionSet) -> PermissionSet {
        let permissions = match self
            .store
            .update(mission_id, MissionUpdate::permissions(permissions.clone()))
        {
            Some(mission) => mission.permission_set(),
            None => permissions,
        };
        self.engine.set_permissions(mission_id, permissions.clone());
        permissions
    }

    fn register_permissions(&self, mission: &Mission) {
        self.engine
            .set_permissions(&mission.id, mission.permission_set());
    }

    /// Runs the request on its own task so approvals and cancellations for
    /// it can be processed while it is in flight.
    fn spawn_execute(&self, request: ExecutionRequest) {
        let engine = Arc::clone(&self.engine);
        let store = Arc::clone(&self.store);
        let outgoing = Arc::clone(&self.outgoing);
        tokio::spawn(async move {
            let request_id = request.id.clone();
            let mission_id = request.mission_id.clone();
            let result = engine.execute(request).await;
            if let Some(mission_id) = mission_id.as_deref() {
                match store.record_result(mission_id, &result) {
                    Some(record) => {
                        debug!(mission_id, command_id = %record.id, "recorded command result");
                    }
                    None => info!(mission_id, "result not recorded; mission not found"),
                }
            }
            outgoing
                .send(OutboundMessage::CommandResult { request_id, result })
                .await;
        });
    }
}
