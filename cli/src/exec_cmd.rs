use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use warden_app_server::open_store;
use warden_core::ApprovalProvider;
use warden_core::Config;
use warden_core::EngineConfig;
use warden_core::ExecEventSink;
use warden_core::ExecutionEngine;
use warden_core::FixedApproval;
use warden_core::detect_available;
use warden_protocol::ExecEvent;
use warden_protocol::ExecOutputStream;
use warden_protocol::ExecutionRequest;
use warden_protocol::ShellType;
use warden_protocol::approvals::ExecApprovalRequestEvent;
use warden_protocol::approvals::ReviewDecision;

/// Exit code reported when the command never produced one.
const NO_EXIT_CODE: i32 = 1;

#[derive(Debug, clap::Parser)]
pub struct ExecCommand {
    /// Shell to run under: powershell, cmd, wsl2, bash, sh or auto.
    #[arg(long = "shell", value_name = "SHELL", default_value = "auto")]
    pub shell: ShellType,

    /// Seconds before the command is killed. Defaults to the configured
    /// `default_timeout_seconds`.
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Working directory for the command.
    #[arg(long = "cwd", value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Run under this mission's permissions and record the result on it.
    #[arg(long = "mission", value_name = "ID")]
    pub mission: Option<String>,

    /// Approve without prompting.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Command to run. A single argument is passed to the shell verbatim;
    /// several are quoted and joined.
    #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl ExecCommand {
    fn command_text(&self) -> anyhow::Result<String> {
        match self.command.as_slice() {
            [single] => Ok(single.clone()),
            args => shlex::try_join(args.iter().map(String::as_str))
                .context("command contains a NUL byte"),
        }
    }
}

/// Writes output chunks to this process's stdout and stderr as they arrive.
struct TerminalSink;

#[async_trait]
impl ExecEventSink for TerminalSink {
    async fn send_event(&self, event: ExecEvent) {
        let ExecEvent::OutputDelta(delta) = event else {
            return;
        };
        let result = match delta.stream {
            ExecOutputStream::Stdout => write_flush(&mut std::io::stdout(), &delta.chunk),
            ExecOutputStream::Stderr => write_flush(&mut std::io::stderr(), &delta.chunk),
        };
        if let Err(err) = result {
            tracing::debug!("failed to forward output: {err}");
        }
    }
}

fn write_flush(out: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    out.write_all(chunk.as_bytes())?;
    out.flush()
}

/// Asks on the terminal. Anything other than `y`/`yes` denies.
struct TerminalApproval;

#[async_trait]
impl ApprovalProvider for TerminalApproval {
    async fn request_approval(&self, request: ExecApprovalRequestEvent) -> ReviewDecision {
        let prompt = match &request.mission_id {
            Some(mission_id) => format!("Run `{}` for mission {mission_id}? [y/N] ", request.command),
            None => format!("Run `{}`? [y/N] ", request.command),
        };
        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return ReviewDecision::Denied;
        }
        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut answer).await {
            Ok(_) => parse_answer(&answer),
            Err(_) => ReviewDecision::Denied,
        }
    }
}

fn parse_answer(answer: &str) -> ReviewDecision {
    let answer = answer.trim().to_lowercase();
    ReviewDecision::from(answer == "y" || answer == "yes")
}

pub async fn run(cmd: ExecCommand, config: Config) -> anyhow::Result<i32> {
    let command = cmd.command_text()?;
    let approval: Arc<dyn ApprovalProvider> = if cmd.yes {
        Arc::new(FixedApproval(ReviewDecision::Approved))
    } else {
        Arc::new(TerminalApproval)
    };
    let engine = ExecutionEngine::new(
        EngineConfig::from(&config),
        detect_available(),
        Arc::new(TerminalSink),
    )
    .with_approval_provider(approval);

    let store = match &cmd.mission {
        Some(mission_id) => {
            let store = open_store(&config);
            let permissions = store
                .permission_set(mission_id)
                .with_context(|| format!("mission not found: {mission_id}"))?;
            engine.set_permissions(mission_id, permissions);
            Some(store)
        }
        None => None,
    };

    let mut request = ExecutionRequest::new(cli_request_id(), command)
        .with_shell(cmd.shell)
        .with_timeout_seconds(cmd.timeout.unwrap_or(config.default_timeout_seconds));
    if let Some(cwd) = cmd.cwd {
        request = request.with_cwd(cwd);
    }
    if let Some(mission_id) = &cmd.mission {
        request = request.with_mission(mission_id);
    }

    let result = engine.execute(request).await;
    if let (Some(store), Some(mission_id)) = (&store, &cmd.mission) {
        store.record_result(mission_id, &result);
    }

    if let Some(error) = &result.error {
        eprintln!("warden: {}: {error}", result.status);
    } else if !result.success() {
        eprintln!("warden: {}", result.status);
    }
    Ok(result.exit_code.unwrap_or(NO_EXIT_CODE))
}

fn cli_request_id() -> String {
    format!("cli-{}", std::process::id())
}
