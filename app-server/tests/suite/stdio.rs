use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use warden_app_server::run_with_io;
use warden_core::AvailableShells;
use warden_core::Config;
use warden_core::ConfigOverrides;
use warden_protocol::ExecutionMode;
use warden_protocol::ShellType;

fn test_config(dir: &TempDir, mode: ExecutionMode) -> Config {
    Config::with_defaults(
        dir.path().to_path_buf(),
        ConfigOverrides {
            execution_mode: Some(mode),
            data_dir: Some(dir.path().join("data")),
            max_output_bytes: None,
        },
    )
}

fn sh_only() -> AvailableShells {
    let mut shells = AvailableShells::new();
    shells.insert(ShellType::Sh, ["/bin/sh", "-c"]);
    shells
}

/// Feeds `requests` to a server, closes its input and collects every line
/// it writes until it exits.
async fn converse(config: Config, requests: &[String]) -> anyhow::Result<Vec<Value>> {
    let lines: Vec<&[u8]> = requests.iter().map(String::as_bytes).collect();
    converse_bytes(config, &lines).await
}

async fn converse_bytes(config: Config, requests: &[&[u8]]) -> anyhow::Result<Vec<Value>> {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let server = tokio::spawn(run_with_io(config, sh_only(), server_read, server_write));

    let (client_read, mut client_write) = tokio::io::split(client);
    for request in requests {
        client_write.write_all(request).await?;
        client_write.write_all(b"\n").await?;
    }
    client_write.shutdown().await?;

    let mut replies = Vec::new();
    let mut lines = BufReader::new(client_read).lines();
    let collect = async {
        while let Some(line) = lines.next_line().await? {
            replies.push(serde_json::from_str::<Value>(&line)?);
        }
        anyhow::Ok(())
    };
    tokio::time::timeout(Duration::from_secs(20), collect).await??;
    server.await??;
    Ok(replies)
}

fn of_type<'a>(replies: &'a [Value], kind: &str) -> Vec<&'a Value> {
    replies.iter().filter(|reply| reply["type"] == kind).collect()
}

#[tokio::test]
async fn ping_and_malformed_lines() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let replies = converse(
        test_config(&dir, ExecutionMode::Yolo),
        &[
            "not json".to_string(),
            json!({"type": "shutdown"}).to_string(),
            json!({"type": "ping", "request_id": "p1"}).to_string(),
        ],
    )
    .await?;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["type"], "pong");
    assert_eq!(replies[0]["request_id"], "p1");
    Ok(())
}

#[tokio::test]
async fn undecodable_line_is_skipped() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let ping = json!({"type": "ping", "request_id": "p1"}).to_string();
    let replies = converse_bytes(
        test_config(&dir, ExecutionMode::Yolo),
        &[b"\xff\xfe garbage".as_slice(), ping.as_bytes()],
    )
    .await?;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["type"], "pong");
    assert_eq!(replies[0]["request_id"], "p1");
    Ok(())
}

#[tokio::test]
async fn missions_persist_across_sessions() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let replies = converse(
        test_config(&dir, ExecutionMode::Yolo),
        &[json!({
            "type": "mission_create",
            "request_id": "c1",
            "mission": {"name": "audit", "blocked_commands": ["rm"]},
        })
        .to_string()],
    )
    .await?;
    let created = of_type(&replies, "mission_created");
    assert_eq!(created.len(), 1);
    let mission_id = created[0]["mission"]["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("mission id missing"))?
        .to_string();

    let replies = converse(
        test_config(&dir, ExecutionMode::Yolo),
        &[
            json!({"type": "mission_get", "mission_id": mission_id}).to_string(),
            json!({"type": "mission_stats", "mission_id": mission_id}).to_string(),
        ],
    )
    .await?;
    assert_eq!(replies[0]["type"], "mission");
    assert_eq!(replies[0]["mission"]["name"], "audit");
    assert_eq!(replies[1]["type"], "mission_stats");
    assert_eq!(replies[1]["stats"]["total_commands"], 0);
    Ok(())
}

#[tokio::test]
async fn blocked_command_is_denied_without_running() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let replies = converse(
        test_config(&dir, ExecutionMode::Yolo),
        &[
            json!({
                "type": "set_permissions",
                "mission_id": "m1",
                "permissions": {"blocked_commands": ["rm"], "execution_mode": "yolo"},
            })
            .to_string(),
            json!({
                "type": "execute_command",
                "id": "r1",
                "command": "rm -rf /tmp/never",
                "mission_id": "m1",
            })
            .to_string(),
        ],
    )
    .await?;

    let results = of_type(&replies, "command_result");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["result"]["status"], "permission_denied");
    assert_eq!(
        results[0]["result"]["error"],
        "permission denied: command matches blocked pattern: rm"
    );
    assert!(of_type(&replies, "exec_output").is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn execute_streams_output_and_result() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let replies = converse(
        test_config(&dir, ExecutionMode::Yolo),
        &[json!({"type": "execute_command", "id": "r1", "command": "echo hi"}).to_string()],
    )
    .await?;

    let statuses: Vec<&Value> = of_type(&replies, "exec_status")
        .into_iter()
        .map(|status| &status["status"])
        .collect();
    assert_eq!(statuses, vec![&json!("running"), &json!("completed")]);

    let output: String = of_type(&replies, "exec_output")
        .into_iter()
        .filter_map(|chunk| chunk["chunk"].as_str())
        .collect();
    assert_eq!(output, "hi\n");

    let results = of_type(&replies, "command_result");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["request_id"], "r1");
    assert_eq!(results[0]["result"]["exit_code"], 0);
    assert_eq!(results[0]["result"]["shell_type"], "sh");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn pending_approval_is_denied_at_eof() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let replies = converse(
        test_config(&dir, ExecutionMode::Assisted),
        &[json!({"type": "execute_command", "id": "r1", "command": "echo never"}).to_string()],
    )
    .await?;

    assert!(
        of_type(&replies, "exec_status")
            .iter()
            .any(|status| status["status"] == "awaiting_approval")
    );
    let results = of_type(&replies, "command_result");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["result"]["status"], "rejected");
    Ok(())
}
