use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;
use warden_protocol::ExecEvent;
use warden_protocol::ExecutionStatus;

/// Receives output chunks and status changes while requests are in flight.
///
/// Implementations must not fail: a sink that cannot deliver an event drops
/// it.
#[async_trait]
pub trait ExecEventSink: Send + Sync {
    async fn send_event(&self, event: ExecEvent);
}

/// One request's view of the shared sink. Status changes must follow
/// [`ExecutionStatus::can_transition_to`]; debug builds assert it.
pub(crate) struct RequestEventSink<'a> {
    inner: &'a dyn ExecEventSink,
    last_status: Mutex<ExecutionStatus>,
}

impl<'a> RequestEventSink<'a> {
    pub(crate) fn new(inner: &'a dyn ExecEventSink) -> Self {
        Self {
            inner,
            last_status: Mutex::new(ExecutionStatus::Pending),
        }
    }

    pub(crate) async fn emit_status(&self, request_id: &str, status: ExecutionStatus) {
        self.send_event(ExecEvent::status(request_id, status)).await;
    }
}

#[async_trait]
impl<'a> ExecEventSink for RequestEventSink<'a> {
    async fn send_event(&self, event: ExecEvent) {
        if let ExecEvent::Status(change) = &event {
            let mut last = self
                .last_status
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            debug_assert!(
                last.can_transition_to(change.status),
                "illegal status transition {} -> {}",
                *last,
                change.status
            );
            *last = change.status;
        }
        self.inner.send_event(event).await;
    }
}

#[async_trait]
impl ExecEventSink for mpsc::UnboundedSender<ExecEvent> {
    async fn send_event(&self, event: ExecEvent) {
        if self.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

#[async_trait]
impl ExecEventSink for mpsc::Sender<ExecEvent> {
    async fn send_event(&self, event: ExecEvent) {
        if self.send(event).await.is_err() {
            trace!("event receiver dropped");
        }
    }
}
