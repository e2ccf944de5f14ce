//! In-process job executor.
//!
//! Runs every job as its own tokio task. There is no numerical engine behind
//! it: a job validates its parameters against the dataset, reports a fixed
//! number of progress steps and finishes with a summary of the result
//! geometry. It is what the CLI and the tests run against, and the reference
//! for how an executor must behave at the boundary.

use super::{roi, JobEventSink, JobExecutionError, JobExecutor, JobRequest};
use crate::analysis::AnalysisKind;
use crate::ids::JobId;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default number of progress events per job.
pub const DEFAULT_PROGRESS_STEPS: u32 = 4;

/// Default pause between progress events.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(25);

/// Tuning for [`LocalJobExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalJobExecutorConfig {
    pub progress_steps: u32,
    pub step_delay: Duration,
}

impl Default for LocalJobExecutorConfig {
    fn default() -> Self {
        Self {
            progress_steps: DEFAULT_PROGRESS_STEPS,
            step_delay: DEFAULT_STEP_DELAY,
        }
    }
}

/// Executor running jobs on the current tokio runtime.
pub struct LocalJobExecutor {
    config: LocalJobExecutorConfig,
    running: Arc<DashMap<JobId, CancellationToken>>,
    shutdown: CancellationToken,
}

impl LocalJobExecutor {
    pub fn new(config: LocalJobExecutorConfig) -> Self {
        Self {
            config,
            running: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of jobs that have not stopped yet.
    pub fn running_jobs(&self) -> usize {
        self.running.len()
    }
}

impl Default for LocalJobExecutor {
    fn default() -> Self {
        Self::new(LocalJobExecutorConfig::default())
    }
}

impl JobExecutor for LocalJobExecutor {
    fn start(&self, request: JobRequest, events: JobEventSink) -> Result<(), JobExecutionError> {
        if self.shutdown.is_cancelled() {
            return Err(JobExecutionError::ShutDown);
        }

        let job_id = request.job_id;
        let cancel = self.shutdown.child_token();
        self.running.insert(job_id, cancel.clone());

        let running = Arc::clone(&self.running);
        let config = self.config;
        tokio::spawn(async move {
            run_job(request, events, config, cancel).await;
            running.remove(&job_id);
        });
        Ok(())
    }

    fn cancel(&self, job_id: &JobId) {
        match self.running.get(job_id) {
            Some(token) => token.cancel(),
            None => debug!(job_id = %job_id, "Cancel for job that is not running"),
        }
    }

    fn shutdown(&self) {
        debug!(running = self.running.len(), "Local executor shutting down");
        self.shutdown.cancel();
    }
}

async fn run_job(
    request: JobRequest,
    events: JobEventSink,
    config: LocalJobExecutorConfig,
    cancel: CancellationToken,
) {
    let job_id = request.job_id;
    events.started(job_id);

    if let Err(e) = roi::validate_roi(&request.details, &request.dataset) {
        warn!(job_id = %job_id, error = %e, "Job parameters rejected");
        events.errored(job_id, e.to_string());
        return;
    }

    let total = config.progress_steps;
    for done in 1..=total {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(job_id = %job_id, done, total, "Job cancelled");
                events.canceled(job_id);
                return;
            }

            _ = tokio::time::sleep(config.step_delay) => {}
        }
        events.progress(job_id, done, total);
    }

    let kind = request.details.analysis_type;
    let result_shape = match kind {
        AnalysisKind::SumFrames
        | AnalysisKind::SdFrames
        | AnalysisKind::PickFrame
        | AnalysisKind::PickFftFrame
        | AnalysisKind::FftSumFrames => request.dataset.detector_size().to_vec(),
        _ => request.dataset.scan_size().to_vec(),
    };
    events.finished(
        job_id,
        json!({
            "analysisType": kind,
            "shape": result_shape,
        }),
    );
}
