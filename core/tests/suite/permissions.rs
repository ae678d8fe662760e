use anyhow::Result;
use pretty_assertions::assert_eq;
use warden_protocol::ExecutionMode;
use warden_protocol::ExecutionRequest;
use warden_protocol::ExecutionStatus;
use warden_protocol::PermissionSet;
use warden_protocol::approvals::ReviewDecision;

use super::support::RecordingApproval;
use super::support::TestEngine;

#[tokio::test]
async fn denied_command_never_spawns_or_asks() -> Result<()> {
    let approval = RecordingApproval::answering(ReviewDecision::Approved);
    let mut test = TestEngine::with_approval(ExecutionMode::Assisted, approval.clone());
    test.engine
        .set_permissions("m1", PermissionSet::allow_only(["echo"]));

    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("created");
    let command = format!("touch {}", marker.display());
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", command).with_mission("m1"))
        .await;

    assert_eq!(result.status, ExecutionStatus::PermissionDenied);
    assert_eq!(
        result.error.as_deref(),
        Some("permission denied: command not in allowed list for mission")
    );
    assert_eq!(result.mission_id.as_deref(), Some("m1"));
    assert!(!marker.exists());
    assert_eq!(approval.request_count(), 0);
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::PermissionDenied]
    );
    Ok(())
}

#[tokio::test]
async fn block_list_wins_over_allow_list() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    test.engine.set_permissions(
        "m1",
        PermissionSet::allow_only(["echo"]).block(["echo secret"]),
    );

    let blocked = test
        .engine
        .execute(ExecutionRequest::new("r1", "echo secret stuff").with_mission("m1"))
        .await;
    let allowed = test
        .engine
        .execute(ExecutionRequest::new("r2", "echo public").with_mission("m1"))
        .await;

    assert_eq!(blocked.status, ExecutionStatus::PermissionDenied);
    assert_eq!(
        blocked.error.as_deref(),
        Some("permission denied: command matches blocked pattern: echo secret")
    );
    assert_eq!(allowed.status, ExecutionStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn removing_permissions_lifts_restrictions() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    test.engine
        .set_permissions("m1", PermissionSet::allow_only(Vec::<String>::new()));

    let locked = test
        .engine
        .execute(ExecutionRequest::new("r1", "true").with_mission("m1"))
        .await;
    assert_eq!(locked.status, ExecutionStatus::PermissionDenied);

    assert!(test.engine.remove_permissions("m1").is_some());
    assert_eq!(test.engine.permissions("m1"), None);
    let open = test
        .engine
        .execute(ExecutionRequest::new("r2", "true").with_mission("m1"))
        .await;
    assert_eq!(open.status, ExecutionStatus::Completed);
    Ok(())
}
