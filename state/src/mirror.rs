use async_trait::async_trait;
use warden_protocol::Mission;

/// Remote copy of the mission set. Failures are reported to the caller,
/// which logs them; they never undo a local mutation.
#[async_trait]
pub trait MissionMirror: Send + Sync {
    async fn create_mission(&self, mission: &Mission) -> anyhow::Result<()>;

    async fn update_mission(&self, mission: &Mission) -> anyhow::Result<()>;

    async fn delete_mission(&self, mission_id: &str) -> anyhow::Result<()>;

    /// The backend's authoritative list of missions.
    async fn fetch_missions(&self) -> anyhow::Result<Vec<Mission>>;
}
