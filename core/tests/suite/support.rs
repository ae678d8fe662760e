#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use warden_core::ApprovalProvider;
use warden_core::AvailableShells;
use warden_core::EngineConfig;
use warden_core::ExecutionEngine;
use warden_protocol::ExecEvent;
use warden_protocol::ExecutionMode;
use warden_protocol::ExecutionStatus;
use warden_protocol::ShellType;
use warden_protocol::approvals::ExecApprovalRequestEvent;
use warden_protocol::approvals::ReviewDecision;

pub fn posix_shells() -> AvailableShells {
    let mut shells = AvailableShells::new();
    shells.insert(ShellType::Sh, ["/bin/sh", "-c"]);
    shells
}

pub struct TestEngine {
    pub engine: Arc<ExecutionEngine>,
    pub events: mpsc::UnboundedReceiver<ExecEvent>,
}

impl TestEngine {
    pub fn new(mode: ExecutionMode) -> Self {
        Self::build(mode, None)
    }

    pub fn with_approval(mode: ExecutionMode, approval: Arc<dyn ApprovalProvider>) -> Self {
        Self::build(mode, Some(approval))
    }

    fn build(mode: ExecutionMode, approval: Option<Arc<dyn ApprovalProvider>>) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let config = EngineConfig {
            default_mode: mode,
            max_output_bytes: 64 * 1024,
            ..EngineConfig::default()
        };
        let mut engine = ExecutionEngine::new(config, posix_shells(), Arc::new(tx));
        if let Some(approval) = approval {
            engine = engine.with_approval_provider(approval);
        }
        Self {
            engine: Arc::new(engine),
            events,
        }
    }

    /// Status events recorded so far for `request_id`, in order.
    pub fn statuses(&mut self, request_id: &str) -> Vec<ExecutionStatus> {
        let mut statuses = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let ExecEvent::Status(status) = event {
                if status.request_id == request_id {
                    statuses.push(status.status);
                }
            }
        }
        statuses
    }
}

/// Records every approval request and answers with a fixed decision.
#[derive(Default)]
pub struct RecordingApproval {
    pub decision: Option<ReviewDecision>,
    pub requests: Mutex<Vec<ExecApprovalRequestEvent>>,
}

impl RecordingApproval {
    pub fn answering(decision: ReviewDecision) -> Arc<Self> {
        Arc::new(Self {
            decision: Some(decision),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ApprovalProvider for RecordingApproval {
    async fn request_approval(&self, request: ExecApprovalRequestEvent) -> ReviewDecision {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.decision.unwrap_or_default()
    }
}

/// Holds each approval request until the test answers it.
pub struct DeferredApproval {
    pub pending: mpsc::UnboundedSender<(ExecApprovalRequestEvent, oneshot::Sender<ReviewDecision>)>,
}

#[async_trait]
impl ApprovalProvider for DeferredApproval {
    async fn request_approval(&self, request: ExecApprovalRequestEvent) -> ReviewDecision {
        let (tx, rx) = oneshot::channel();
        if self.pending.send((request, tx)).is_err() {
            return ReviewDecision::Denied;
        }
        rx.await.unwrap_or_default()
    }
}
