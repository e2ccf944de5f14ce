//! Fire-and-forget job event emission.

use super::{JobEvent, JobPhase};
use crate::ids::JobId;
use tokio::sync::mpsc;

/// Sender half handed to executors for reporting job lifecycle events.
///
/// Cheap to clone. Sends never block and are silently ignored once the
/// receiving side has shut down, so executors keep running to completion
/// even when nobody listens anymore.
#[derive(Clone)]
pub struct JobEventSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl JobEventSink {
    pub fn new(tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    #[inline]
    fn send(&self, job_id: JobId, phase: JobPhase) {
        // Receiver gone means the core shut down
        let _ = self.tx.send(JobEvent { job_id, phase });
    }

    #[inline]
    pub fn started(&self, job_id: JobId) {
        self.send(job_id, JobPhase::Started);
    }

    #[inline]
    pub fn progress(&self, job_id: JobId, done: u32, total: u32) {
        self.send(job_id, JobPhase::Progress { done, total });
    }

    #[inline]
    pub fn finished(&self, job_id: JobId, result: serde_json::Value) {
        self.send(job_id, JobPhase::Finished { result });
    }

    #[inline]
    pub fn errored(&self, job_id: JobId, message: impl Into<String>) {
        self.send(
            job_id,
            JobPhase::Errored {
                message: message.into(),
            },
        );
    }

    #[inline]
    pub fn canceled(&self, job_id: JobId) {
        self.send(job_id, JobPhase::Canceled);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
