use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use uuid::Uuid;
use warden_protocol::CommandRecord;
use warden_protocol::ExecutionResult;
use warden_protocol::ExecutionStatus;
use warden_protocol::Mission;
use warden_protocol::MissionStats;
use warden_protocol::MissionStatus;
use warden_protocol::PermissionSet;
use warden_protocol::mission::CreateMissionParams;
use warden_protocol::mission::MissionUpdate;

use crate::mirror::MissionMirror;
use crate::snapshot::load_snapshot;
use crate::snapshot::write_snapshot;

/// Records returned by [`MissionStore::command_history`] when no limit is
/// given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

type MissionMap = IndexMap<String, Mission>;

#[derive(Clone, Copy, Debug)]
enum MirrorAction {
    Create,
    Update,
}

/// Owns every mission and its command log.
///
/// Each mutation rewrites the snapshot file before returning. Persistence
/// failures are logged and the in-memory change is kept.
pub struct MissionStore {
    path: PathBuf,
    missions: Mutex<MissionMap>,
    mirror: Option<Arc<dyn MissionMirror>>,
}

impl MissionStore {
    /// Loads missions from the snapshot at `path`. A missing or unreadable
    /// snapshot starts the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let missions = match load_snapshot(&path) {
            Ok(missions) => {
                info!(count = missions.len(), path = %path.display(), "loaded missions");
                missions
            }
            Err(err) => {
                warn!("ignoring mission snapshot: {err}");
                MissionMap::new()
            }
        };
        Self {
            path,
            missions: Mutex::new(missions),
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn MissionMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn create(&self, params: CreateMissionParams) -> Mission {
        let mission = Mission::new(Uuid::new_v4().to_string(), params, Utc::now());
        {
            let mut missions = self.lock();
            missions.insert(mission.id.clone(), mission.clone());
            self.persist(&missions);
        }
        info!(
            mission_id = %mission.id,
            name = %mission.name,
            yolo = mission.yolo,
            "mission created"
        );
        self.mirror_upsert(&mission, MirrorAction::Create);
        mission
    }

    pub fn get(&self, mission_id: &str) -> Option<Mission> {
        self.lock().get(mission_id).cloned()
    }

    /// Missions, optionally filtered by status, most recently updated first.
    pub fn list(&self, status: Option<MissionStatus>) -> Vec<Mission> {
        let mut missions: Vec<Mission> = self
            .lock()
            .values()
            .filter(|mission| status.is_none_or(|status| mission.status == status))
            .cloned()
            .collect();
        missions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        missions
    }

    pub fn update(&self, mission_id: &str, update: MissionUpdate) -> Option<Mission> {
        let mission = {
            let mut missions = self.lock();
            let mission = missions.get_mut(mission_id)?;
            mission.apply_update(update, Utc::now());
            let mission = mission.clone();
            self.persist(&missions);
            mission
        };
        self.mirror_upsert(&mission, MirrorAction::Update);
        Some(mission)
    }

    pub fn delete(&self, mission_id: &str) -> bool {
        {
            let mut missions = self.lock();
            if missions.shift_remove(mission_id).is_none() {
                return false;
            }
            self.persist(&missions);
        }
        info!(mission_id, "mission deleted");
        self.mirror_delete(mission_id);
        true
    }

    pub fn activate(&self, mission_id: &str) -> Option<Mission> {
        self.update(mission_id, MissionUpdate::status(MissionStatus::Active))
    }

    pub fn pause(&self, mission_id: &str) -> Option<Mission> {
        self.update(mission_id, MissionUpdate::status(MissionStatus::Paused))
    }

    pub fn complete(&self, mission_id: &str) -> Option<Mission> {
        self.update(
            mission_id,
            MissionUpdate {
                completed_at: Some(Utc::now()),
                ..MissionUpdate::status(MissionStatus::Completed)
            },
        )
    }

    /// Marks the mission failed and records `error` under `metadata.error`,
    /// keeping any other metadata.
    pub fn fail(&self, mission_id: &str, error: &str) -> Option<Mission> {
        let mut metadata = self.get(mission_id)?.metadata;
        metadata.insert("error".to_string(), Value::String(error.to_string()));
        self.update(
            mission_id,
            MissionUpdate {
                metadata: Some(metadata),
                ..MissionUpdate::status(MissionStatus::Failed)
            },
        )
    }

    pub fn set_yolo(&self, mission_id: &str, enabled: bool) -> Option<Mission> {
        self.update(
            mission_id,
            MissionUpdate {
                yolo: Some(enabled),
                ..MissionUpdate::default()
            },
        )
    }

    /// Appends `record` to the mission's command log. Returns false for an
    /// unknown mission.
    pub fn track_command(&self, mission_id: &str, record: CommandRecord) -> bool {
        let mut missions = self.lock();
        let Some(mission) = missions.get_mut(mission_id) else {
            return false;
        };
        debug!(mission_id, command_id = %record.id, status = %record.status, "tracking command");
        mission.commands.push(record);
        mission.updated_at = Utc::now();
        self.persist(&missions);
        true
    }

    /// Builds a [`CommandRecord`] from `result` and appends it.
    pub fn record_result(&self, mission_id: &str, result: &ExecutionResult) -> Option<CommandRecord> {
        let record = CommandRecord::from_result(Uuid::new_v4().to_string(), result, Utc::now());
        self.track_command(mission_id, record.clone())
            .then_some(record)
    }

    /// The most recent `limit` records, oldest first.
    pub fn command_history(&self, mission_id: &str, limit: usize) -> Option<Vec<CommandRecord>> {
        let missions = self.lock();
        let commands = &missions.get(mission_id)?.commands;
        let start = commands.len().saturating_sub(limit);
        Some(commands[start..].to_vec())
    }

    pub fn stats(&self, mission_id: &str) -> Option<MissionStats> {
        let missions = self.lock();
        let commands = &missions.get(mission_id)?.commands;
        let total_commands = commands.len();
        let completed = count_status(commands, ExecutionStatus::Completed);
        let failed = count_status(commands, ExecutionStatus::Failed);
        let total_duration_ms: u64 = commands.iter().map(|record| record.duration_ms).sum();
        let avg_duration_ms = match u64::try_from(total_commands) {
            Ok(0) | Err(_) => 0,
            Ok(total) => total_duration_ms / total,
        };
        Some(MissionStats {
            mission_id: mission_id.to_string(),
            total_commands,
            completed,
            failed,
            other: total_commands - completed - failed,
            total_duration_ms,
            avg_duration_ms,
        })
    }

    pub fn permission_set(&self, mission_id: &str) -> Option<PermissionSet> {
        self.lock().get(mission_id).map(Mission::permission_set)
    }

    /// Permission sets of every mission, for registering with the policy.
    pub fn permission_sets(&self) -> Vec<(String, PermissionSet)> {
        self.lock()
            .values()
            .map(|mission| (mission.id.clone(), mission.permission_set()))
            .collect()
    }

    /// Upserts `missions` by id and persists. Local missions absent from
    /// `missions` are kept.
    pub fn apply_backend_snapshot(&self, missions: Vec<Mission>) -> usize {
        let count = missions.len();
        let mut local = self.lock();
        for mission in missions {
            local.insert(mission.id.clone(), mission);
        }
        self.persist(&local);
        count
    }

    /// Pulls the backend's missions into the store. Returns how many were
    /// received; failures are logged and count as zero.
    pub async fn sync_from_backend(&self) -> usize {
        let Some(mirror) = self.mirror.clone() else {
            return 0;
        };
        match mirror.fetch_missions().await {
            Ok(missions) => {
                let count = self.apply_backend_snapshot(missions);
                info!(count, "synced missions from backend");
                count
            }
            Err(err) => {
                warn!("failed to sync missions from backend: {err:#}");
                0
            }
        }
    }

    fn persist(&self, missions: &MissionMap) {
        if let Err(err) = write_snapshot(&self.path, missions) {
            error!("failed to persist missions: {err}");
        }
    }

    fn mirror_upsert(&self, mission: &Mission, action: MirrorAction) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let mission = mission.clone();
        spawn_mirror_task(mission.id.clone(), async move {
            match action {
                MirrorAction::Create => mirror.create_mission(&mission).await,
                MirrorAction::Update => mirror.update_mission(&mission).await,
            }
        });
    }

    fn mirror_delete(&self, mission_id: &str) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let id = mission_id.to_string();
        spawn_mirror_task(mission_id.to_string(), async move {
            mirror.delete_mission(&id).await
        });
    }

    fn lock(&self) -> MutexGuard<'_, MissionMap> {
        self.missions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Runs a mirror call in the background when a runtime is available.
fn spawn_mirror_task<F>(mission_id: String, task: F)
where
    F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(mission_id = %mission_id, "no runtime; skipping backend mirror");
        return;
    };
    handle.spawn(async move {
        match task.await {
            Ok(()) => debug!(mission_id = %mission_id, "mirrored mission to backend"),
            Err(err) => warn!(mission_id = %mission_id, "backend mirror failed: {err:#}"),
        }
    });
}

fn count_status(commands: &[CommandRecord], status: ExecutionStatus) -> usize {
    commands
        .iter()
        .filter(|record| record.status == status)
        .count()
}
