use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use warden_protocol::ExecEvent;
use warden_protocol::ExecOutputStream;
use warden_protocol::ExecutionMode;
use warden_protocol::ExecutionRequest;
use warden_protocol::ExecutionStatus;
use warden_protocol::PermissionSet;
use warden_protocol::ShellType;

use super::support::TestEngine;

#[tokio::test]
async fn yolo_runs_and_captures_output() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Yolo);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "  echo hello; echo oops >&2  "))
        .await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.command, "echo hello; echo oops >&2");
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.stderr, "oops\n");
    assert_eq!(result.shell_type, Some(ShellType::Sh));
    assert_eq!(result.error, None);
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::Running, ExecutionStatus::Completed]
    );
    Ok(())
}

#[tokio::test]
async fn output_is_streamed_with_request_id() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Yolo);
    test.engine
        .execute(ExecutionRequest::new("r1", "printf 'a'; printf 'b' >&2"))
        .await;

    let mut stdout = String::new();
    let mut stderr = String::new();
    while let Ok(event) = test.events.try_recv() {
        if let ExecEvent::OutputDelta(delta) = event {
            assert_eq!(delta.request_id, "r1");
            match delta.stream {
                ExecOutputStream::Stdout => stdout.push_str(&delta.chunk),
                ExecOutputStream::Stderr => stderr.push_str(&delta.chunk),
            }
        }
    }
    assert_eq!((stdout.as_str(), stderr.as_str()), ("a", "b"));
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_failed_with_code() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "exit 7"))
        .await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, Some(7));
    assert_eq!(result.error, None);
    Ok(())
}

#[tokio::test]
async fn empty_command_fails_without_running() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Assisted);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "   ").with_shell(ShellType::Cmd))
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("empty command"));
    // No shell resolution happened: the unavailable shell did not matter.
    assert_eq!(result.shell_type, None);
    assert_eq!(test.statuses("r1"), vec![ExecutionStatus::Failed]);
    Ok(())
}

#[tokio::test]
async fn unavailable_shell_fails_before_approval() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Assisted);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "dir").with_shell(ShellType::Cmd))
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("shell cmd is not available (available: sh)")
    );
    assert_eq!(test.statuses("r1"), vec![ExecutionStatus::Failed]);
    Ok(())
}

#[tokio::test]
async fn timeout_kills_and_unregisters() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Yolo);
    let started = Instant::now();
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "sleep 30").with_timeout_seconds(1))
        .await;

    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.error.as_deref(), Some("command timed out after 1s"));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!test.engine.is_running("r1"));
    assert!(!test.engine.cancel("r1"));
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::Running, ExecutionStatus::Timeout]
    );
    Ok(())
}

#[tokio::test]
async fn mission_timeout_cap_applies() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    test.engine
        .set_permissions("m1", PermissionSet::default().with_max_timeout(1));
    let started = Instant::now();
    let result = test
        .engine
        .execute(
            ExecutionRequest::new("r1", "sleep 30")
                .with_mission("m1")
                .with_timeout_seconds(120),
        )
        .await;
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.mission_id.as_deref(), Some("m1"));
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn cancel_stops_running_request() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Yolo);
    let engine = test.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .execute(ExecutionRequest::new("r1", "sleep 30"))
            .await
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !test.engine.is_running("r1") {
        anyhow::ensure!(Instant::now() < deadline, "request never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(test.engine.cancel("r1"));

    let result = handle.await?;
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.error.as_deref(), Some("command cancelled"));
    assert!(!test.engine.cancel("r1"));
    assert_eq!(
        test.statuses("r1"),
        vec![ExecutionStatus::Running, ExecutionStatus::Cancelled]
    );
    Ok(())
}

#[tokio::test]
async fn cancel_unknown_request_is_a_no_op() {
    let test = TestEngine::new(ExecutionMode::Yolo);
    assert!(!test.engine.cancel("does-not-exist"));
}

#[tokio::test]
async fn env_overrides_and_cwd_reach_the_child() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    let dir = tempfile::tempdir()?;
    let request = ExecutionRequest::new("r1", "printf '%s ' \"$WARDEN_MARKER\"; pwd -P")
        .with_cwd(dir.path())
        .with_env(HashMap::from([(
            "WARDEN_MARKER".to_string(),
            "from-request".to_string(),
        )]));

    let result = test.engine.execute(request).await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(
        result.stdout.trim_end(),
        format!("from-request {}", dir.path().canonicalize()?.display())
    );
    Ok(())
}

#[tokio::test]
async fn missing_cwd_is_a_spawn_failure() -> Result<()> {
    let mut test = TestEngine::new(ExecutionMode::Yolo);
    let result = test
        .engine
        .execute(ExecutionRequest::new("r1", "true").with_cwd("/definitely/not/here"))
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, None);
    assert_matches!(
        result.error.as_deref(),
        Some(error) if error.starts_with("failed to spawn command")
    );
    assert!(!test.engine.is_running("r1"));
    assert_eq!(test.statuses("r1"), vec![ExecutionStatus::Failed]);
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_run_independently() -> Result<()> {
    let test = TestEngine::new(ExecutionMode::Yolo);
    let started = Instant::now();
    let (slow, fast) = tokio::join!(
        test.engine
            .execute(ExecutionRequest::new("slow", "sleep 1; echo slow")),
        test.engine
            .execute(ExecutionRequest::new("fast", "echo fast")),
    );
    assert_eq!(slow.stdout, "slow\n");
    assert_eq!(fast.stdout, "fast\n");
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}
