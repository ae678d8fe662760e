use async_trait::async_trait;
use warden_protocol::approvals::ExecApprovalRequestEvent;
use warden_protocol::approvals::ReviewDecision;

/// Source of operator decisions for commands that need sign-off.
///
/// The engine awaits the returned future without a deadline, so an
/// implementation may resolve immediately or after a real external wait.
#[async_trait]
pub trait ApprovalProvider: Send + Sync {
    async fn request_approval(&self, request: ExecApprovalRequestEvent) -> ReviewDecision;
}

/// Answers every request with the same decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedApproval(pub ReviewDecision);

#[async_trait]
impl ApprovalProvider for FixedApproval {
    async fn request_approval(&self, _request: ExecApprovalRequestEvent) -> ReviewDecision {
        self.0
    }
}
