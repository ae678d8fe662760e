use std::sync::Arc;

use anyhow::Result;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use warden_protocol::ExecutionMode;
use warden_protocol::ExecutionRequest;
use warden_protocol::ExecutionStatus;
use warden_protocol::PermissionSet;
use warden_protocol::approvals::ReviewDecision;

use super::support::DeferredApproval;
use super::support::RecordingApproval;
use super::support::TestEngine;

#[tokio::test]
async fn yolo_never_asks_for_approval() -> Result<()> {
    let approval = RecordingApproval::answering(ReviewDecision::Denied);
    let test = TestEngine::with_approval(ExecutionMode::Yolo, approval.clone());
    for (id, command) in [("r1", "true"), ("r2", "rm -f /nonexistent-warden-file")] {
        let result = test.engine.execute(ExecutionRequest::new(id, command)).await;
        assert_eq!(result.status, ExecutionStatus::Completed);
    }
    assert_eq!(approval.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn assisted_without_provider_is_rejected() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Assisted);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "echo hi").with_mission("m1"))
        .await;

    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.mission_id.as_deref(), Some("m1"));
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::AwaitingApproval, ExecutionStatus::Rejected]
    );
    Ok(())
}

#[tokio::test]
async fn assisted_runs_after_approval() -> Result<()> {
    let approval = RecordingApproval::answering(ReviewDecision::Approved);
    let mut test = TestEngine::with_approval(ExecutionMode::Assisted, approval.clone());
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", " echo approved ").with_mission("m1"))
        .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.stdout, "approved\n");
    assert_eq!(
        test.statuses("r1"),
        vec![
            ExecutionStatus::AwaitingApproval,
            ExecutionStatus::Approved,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
        ]
    );
    let requests = approval.requests.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, "echo approved");
    assert_eq!(requests[0].mission_id.as_deref(), Some("m1"));
    Ok(())
}

#[tokio::test]
async fn whitelisted_command_completes_without_provider() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Whitelist);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "echo listed"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::Running, ExecutionStatus::Completed]
    );

    let result = test
        .engine
        .execute(ExecutionRequest::new("r2", "touch /tmp/warden-not-listed"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Rejected);
    Ok(())
}

#[tokio::test]
async fn mission_mode_overrides_default() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Assisted);
    test.engine.set_permissions(
        "m1",
        PermissionSet::default().with_mode(ExecutionMode::Yolo),
    );

    let in_mission = test
        .engine
        .execute(ExecutionRequest::new("r1", "true").with_mission("m1"))
        .await;
    let outside = test.engine.execute(ExecutionRequest::new("r2", "true")).await;

    assert_eq!(in_mission.status, ExecutionStatus::Completed);
    assert_eq!(outside.status, ExecutionStatus::Rejected);
    Ok(())
}

#[tokio::test]
async fn approval_wait_suspends_until_answered() -> Result<()> {
    let (tx, mut pending) = mpsc::unbounded_channel();
    let test = TestEngine::with_approval(
        ExecutionMode::Assisted,
        Arc::new(DeferredApproval { pending: tx }),
    );

    let engine = test.engine.clone();
    let run = tokio::spawn(async move { engine.execute(ExecutionRequest::new("r1", "echo later")).await });

    let (request, answer) = pending
        .recv()
        .await
        .ok_or_else(|| anyhow::anyhow!("no approval requested"))?;
    assert_eq!(request.request_id, "r1");
    assert!(!run.is_finished());
    answer
        .send(ReviewDecision::Approved)
        .map_err(|_| anyhow::anyhow!("engine stopped waiting"))?;

    let result = run.await?;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.stdout, "later\n");
    Ok(())
}

#[tokio::test]
async fn explicit_denial_is_rejected() -> Result<()> {
    let approval = RecordingApproval::answering(ReviewDecision::Denied);
    let test = TestEngine::with_approval(ExecutionMode::Assisted, approval.clone());
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "echo no"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.stdout, "");
    assert_eq!(approval.request_count(), 1);
    Ok(())
}

#[tokio::test]
async fn spawn_failure_after_approval_never_runs() -> Result<()> {
    let approval = RecordingApproval::answering(ReviewDecision::Approved);
    let mut test = TestEngine::with_approval(ExecutionMode::Assisted, approval);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "true").with_cwd("/definitely/not/here"))
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(
        test.statuses("r1"),
        vec![
            ExecutionStatus::AwaitingApproval,
            ExecutionStatus::Approved,
            ExecutionStatus::Failed,
        ]
    );
    Ok(())
}
