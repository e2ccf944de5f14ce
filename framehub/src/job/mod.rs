//! Job execution boundary.
//!
//! A job is one run of an analysis. The coordination core never computes
//! anything itself: it hands a [`JobRequest`] to a [`JobExecutor`] and
//! listens for [`JobEvent`]s on the channel behind a [`JobEventSink`].
//!
//! # Lifecycle
//!
//! ```text
//! created ──started──► running ──progress──► running ──finished──► finished
//!                         │                                   └─errored──► error
//!                         └────────────canceled──────────────────────────► canceled
//! ```
//!
//! The [`JobTable`] tracks the one current job per analysis and filters
//! events from jobs that have been superseded or cancelled.

mod local;
mod roi;
mod sink;
mod table;

pub use local::{
    LocalJobExecutor, LocalJobExecutorConfig, DEFAULT_PROGRESS_STEPS, DEFAULT_STEP_DELAY,
};
pub use roi::{validate_roi, Roi};
pub use sink::JobEventSink;
pub use table::{JobRecord, JobTable};

use crate::analysis::AnalysisDetails;
use crate::dataset::Dataset;
use crate::ids::{AnalysisId, JobId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while starting or running a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobExecutionError {
    /// The executor refused to start the job.
    #[error("job rejected: {0}")]
    Rejected(String),

    /// The analysis parameters are not valid for the dataset.
    #[error("invalid roi: {0}")]
    InvalidRoi(String),

    /// The executor is no longer accepting work.
    #[error("executor is shut down")]
    ShutDown,
}

/// Identifies a running job and the analysis it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    #[serde(rename = "job")]
    pub job_id: JobId,
    #[serde(rename = "analysis")]
    pub analysis_id: AnalysisId,
}

/// Status of a job as reported in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Handed to the executor, no event seen yet.
    Created,
    Running,
    Finished,
    Canceled,
    Error,
}

impl JobStatus {
    /// Returns true once no further events are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Canceled | Self::Error)
    }
}

/// Lifecycle phase carried by a [`JobEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobPhase {
    Started,
    Progress { done: u32, total: u32 },
    Finished { result: serde_json::Value },
    Errored { message: String },
    Canceled,
}

impl JobPhase {
    /// The job status after this phase has been applied.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Started | Self::Progress { .. } => JobStatus::Running,
            Self::Finished { .. } => JobStatus::Finished,
            Self::Errored { .. } => JobStatus::Error,
            Self::Canceled => JobStatus::Canceled,
        }
    }
}

/// A lifecycle event emitted by an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub phase: JobPhase,
}

/// Everything an executor needs to run one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: JobId,
    pub analysis_id: AnalysisId,
    pub dataset: Dataset,
    pub details: AnalysisDetails,
}

impl JobRequest {
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.job_id,
            analysis_id: self.analysis_id,
        }
    }
}

/// The compute engine the core delegates to.
///
/// `start` must not block: the job runs in the background and reports via
/// `events`. `cancel` is a request; the executor confirms with a
/// [`JobPhase::Canceled`] event when it has stopped.
pub trait JobExecutor: Send + Sync {
    fn start(&self, request: JobRequest, events: JobEventSink) -> Result<(), JobExecutionError>;

    fn cancel(&self, job_id: &JobId);

    /// Stops every running job and refuses new ones. Called once when the
    /// core shuts down.
    fn shutdown(&self) {}
}
