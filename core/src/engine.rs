//! The execution pipeline: permission check, shell resolution, approval gate
//! and supervised run for each request.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::time::Duration;
use std::time::Instant;

use tracing::info;
use tracing::warn;
use warden_execpolicy::Decision;
use warden_execpolicy::PermissionPolicy;
use warden_execpolicy::default_whitelist;
use warden_execpolicy::matches;
use warden_protocol::ExecutionMode;
use warden_protocol::ExecutionRequest;
use warden_protocol::ExecutionResult;
use warden_protocol::ExecutionStatus;
use warden_protocol::PermissionSet;
use warden_protocol::ShellType;
use warden_protocol::approvals::ExecApprovalRequestEvent;

use crate::approval::ApprovalProvider;
use crate::config::Config;
use crate::config::DEFAULT_MAX_OUTPUT_BYTES;
use crate::error::ExecError;
use crate::events::ExecEventSink;
use crate::events::RequestEventSink;
use crate::exec::ExecParams;
use crate::exec::run_supervised;
use crate::exec_env::create_env;
use crate::registry::ProcessRegistry;
use crate::shell::AvailableShells;
use crate::shell::is_wsl;
use crate::shell::resolve;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Mode used when a request's mission does not override it.
    pub default_mode: ExecutionMode,
    pub whitelist: Vec<String>,
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::default(),
            whitelist: default_whitelist(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_mode: config.execution_mode,
            whitelist: config.whitelist.clone(),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// What the policy says about one request, captured before any await.
struct PolicySnapshot {
    decision: Decision,
    mode: Option<ExecutionMode>,
    max_timeout: Option<u64>,
}

/// Runs requests concurrently; each is keyed by its id for cancellation.
///
/// The engine owns the permission policy and the registry of running
/// processes, so several engines can coexist in one process.
pub struct ExecutionEngine {
    config: EngineConfig,
    shells: AvailableShells,
    policy: RwLock<PermissionPolicy>,
    approval: Option<Arc<dyn ApprovalProvider>>,
    events: Arc<dyn ExecEventSink>,
    registry: ProcessRegistry,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, shells: AvailableShells, events: Arc<dyn ExecEventSink>) -> Self {
        info!(
            mode = %config.default_mode,
            shells = ?shells.shell_types(),
            wsl = is_wsl(),
            "execution engine ready"
        );
        Self {
            config,
            shells,
            policy: RwLock::new(PermissionPolicy::new()),
            approval: None,
            events,
            registry: ProcessRegistry::new(),
        }
    }

    /// Without a provider every request that needs approval is rejected.
    pub fn with_approval_provider(mut self, approval: Arc<dyn ApprovalProvider>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn available_shells(&self) -> &AvailableShells {
        &self.shells
    }

    pub fn set_permissions(&self, mission_id: &str, permissions: PermissionSet) {
        self.policy_mut().set_permissions(mission_id, permissions);
    }

    pub fn remove_permissions(&self, mission_id: &str) -> Option<PermissionSet> {
        self.policy_mut().remove_permissions(mission_id)
    }

    pub fn permissions(&self, mission_id: &str) -> Option<PermissionSet> {
        self.policy().permissions(mission_id).cloned()
    }

    /// Cancels a running request. Unknown or finished ids return false.
    pub fn cancel(&self, request_id: &str) -> bool {
        let cancelled = self.registry.cancel(request_id);
        if cancelled {
            info!(request_id, "cancellation requested");
        }
        cancelled
    }

    pub fn is_running(&self, request_id: &str) -> bool {
        self.registry.contains(request_id)
    }

    /// Runs `request` through the pipeline. Always produces exactly one
    /// result and one terminal status event.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let events = RequestEventSink::new(self.events.as_ref());
        let result = match self.execute_inner(&request, &events).await {
            Ok(result) => result,
            Err((err, shell_type)) => {
                let mut result = ExecutionResult::new(request.command.trim(), err.status());
                result.error = Some(err.to_string());
                result.shell_type = shell_type;
                result.mission_id = request.mission_id.clone();
                result
            }
        };
        events.emit_status(&request.id, result.status).await;
        result
    }

    async fn execute_inner(
        &self,
        request: &ExecutionRequest,
        events: &RequestEventSink<'_>,
    ) -> Result<ExecutionResult, (ExecError, Option<ShellType>)> {
        let command = request.command.trim();
        if command.is_empty() {
            return Err((ExecError::EmptyCommand, None));
        }
        let mission_id = request.mission_id.as_deref();

        let snapshot = self.policy_snapshot(mission_id, command);
        if let Decision::Deny(reason) = snapshot.decision {
            warn!(
                request_id = %request.id,
                mission_id = ?mission_id,
                %reason,
                "command denied by mission policy"
            );
            return Err((ExecError::PermissionDenied(reason), None));
        }

        let (shell_type, prefix) =
            resolve(request.shell_type, &self.shells).map_err(|err| (ExecError::from(err), None))?;

        let timeout_seconds = match snapshot.max_timeout {
            Some(cap) => request.timeout_seconds.min(cap),
            None => request.timeout_seconds,
        };
        let mode = snapshot.mode.unwrap_or(self.config.default_mode);

        if self.needs_approval(command, mode) {
            events
                .emit_status(&request.id, ExecutionStatus::AwaitingApproval)
                .await;
            if !self.request_approval(request, command).await {
                return Err((ExecError::Rejected, Some(shell_type)));
            }
            events
                .emit_status(&request.id, ExecutionStatus::Approved)
                .await;
        }

        let registration = self.registry.register(&request.id);
        let timeout = Duration::from_secs(timeout_seconds);
        let start = Instant::now();
        let params = ExecParams {
            request_id: request.id.clone(),
            argv: prefix
                .into_iter()
                .chain(std::iter::once(command.to_string()))
                .collect(),
            cwd: request.cwd.clone(),
            env: create_env(request.env.as_ref()),
            timeout,
            max_output_bytes: self.config.max_output_bytes,
        };
        let output = run_supervised(params, events, registration.token()).await;
        drop(registration);

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(request_id = %request.id, "spawn failed: {err}");
                let mut result = ExecutionResult::new(command, err.status());
                result.error = Some(err.to_string());
                result.shell_type = Some(shell_type);
                result.duration_ms = elapsed_ms(start.elapsed());
                result.mission_id = request.mission_id.clone();
                return Ok(result);
            }
        };

        let termination_error = output.termination_error(timeout);
        let status = match (&termination_error, output.exit_code) {
            (Some(err), _) => err.status(),
            (None, Some(0)) => ExecutionStatus::Completed,
            (None, _) => ExecutionStatus::Failed,
        };
        Ok(ExecutionResult {
            command: command.to_string(),
            status,
            shell_type: Some(shell_type),
            exit_code: output.exit_code,
            stdout: output.stdout.to_string_lossy(),
            stderr: output.stderr.to_string_lossy(),
            duration_ms: elapsed_ms(output.duration),
            error: termination_error.map(|err| err.to_string()),
            mission_id: request.mission_id.clone(),
        })
    }

    fn needs_approval(&self, command: &str, mode: ExecutionMode) -> bool {
        match mode {
            ExecutionMode::Yolo => false,
            ExecutionMode::Assisted => true,
            ExecutionMode::Whitelist => !matches(command, &self.config.whitelist),
        }
    }

    async fn request_approval(&self, request: &ExecutionRequest, command: &str) -> bool {
        let Some(approval) = &self.approval else {
            info!(request_id = %request.id, "no approval provider configured; rejecting");
            return false;
        };
        info!(request_id = %request.id, command, "approval requested");
        let decision = approval
            .request_approval(ExecApprovalRequestEvent {
                request_id: request.id.clone(),
                command: command.to_string(),
                mission_id: request.mission_id.clone(),
                cwd: request.cwd.clone(),
            })
            .await;
        info!(request_id = %request.id, %decision, "approval decided");
        decision.is_approved()
    }

    fn policy_snapshot(&self, mission_id: Option<&str>, command: &str) -> PolicySnapshot {
        let policy = self.policy();
        PolicySnapshot {
            decision: policy.check(mission_id, command),
            mode: policy.effective_mode(mission_id),
            max_timeout: policy.max_timeout(mission_id),
        }
    }

    fn policy(&self) -> RwLockReadGuard<'_, PermissionPolicy> {
        self.policy
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn policy_mut(&self) -> RwLockWriteGuard<'_, PermissionPolicy> {
        self.policy
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn elapsed_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
