use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::warn;
use warden_core::ApprovalProvider;
use warden_core::ExecEventSink;
use warden_protocol::ExecEvent;
use warden_protocol::OutboundMessage;
use warden_protocol::approvals::ExecApprovalRequestEvent;
use warden_protocol::approvals::ReviewDecision;

/// Sends messages to the client and tracks approvals awaiting an answer.
pub(crate) struct OutgoingMessageSender {
    sender: mpsc::Sender<OutboundMessage>,
    pending_approvals: Mutex<HashMap<String, oneshot::Sender<ReviewDecision>>>,
    /// Set once the client is gone; later approvals are denied at once.
    closed: AtomicBool,
}

impl OutgoingMessageSender {
    pub(crate) fn new(sender: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            sender,
            pending_approvals: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) async fn send(&self, message: OutboundMessage) {
        if let Err(err) = self.sender.send(message).await {
            warn!("failed to send message to client: {err:?}");
        }
    }

    pub(crate) async fn send_error(
        &self,
        request_id: Option<String>,
        request_type: &str,
        message: String,
    ) {
        self.send(OutboundMessage::Error {
            request_id,
            request_type: Some(request_type.to_string()),
            message,
        })
        .await;
    }

    /// Resolves the approval awaiting `request_id`. Returns false when no
    /// approval is pending for it.
    pub(crate) async fn notify_approval(&self, request_id: &str, decision: ReviewDecision) -> bool {
        let entry = self.pending_approvals.lock().await.remove(request_id);
        match entry {
            Some(sender) => {
                if sender.send(decision).is_err() {
                    warn!(request_id, "approval waiter dropped before the decision arrived");
                }
                true
            }
            None => {
                warn!(request_id, "no pending approval");
                false
            }
        }
    }

    /// Drops every pending approval and denies any requested afterwards.
    pub(crate) async fn deny_pending_approvals(&self) -> usize {
        let mut pending = self.pending_approvals.lock().await;
        self.closed.store(true, Ordering::Release);
        let count = pending.len();
        pending.clear();
        count
    }

    #[cfg(test)]
    pub(crate) async fn pending_approval_count(&self) -> usize {
        self.pending_approvals.lock().await.len()
    }
}

#[async_trait]
impl ExecEventSink for OutgoingMessageSender {
    async fn send_event(&self, event: ExecEvent) {
        self.send(OutboundMessage::from(event)).await;
    }
}

#[async_trait]
impl ApprovalProvider for OutgoingMessageSender {
    async fn request_approval(&self, request: ExecApprovalRequestEvent) -> ReviewDecision {
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_approvals.lock().await;
            if self.closed.load(Ordering::Acquire) {
                warn!(request_id = %request_id, "client gone; denying approval");
                return ReviewDecision::Denied;
            }
            pending.insert(request_id.clone(), tx);
        }

        if self
            .sender
            .send(OutboundMessage::ApprovalRequest(request))
            .await
            .is_err()
        {
            warn!(request_id = %request_id, "client gone; denying approval");
            self.pending_approvals.lock().await.remove(&request_id);
            return ReviewDecision::Denied;
        }

        // A dropped sender means the server is shutting down.
        rx.await.unwrap_or_default()
    }
}
