//! Authoritative coordination state and the rules for changing it.
//!
//! Every method validates before it mutates, and appends the messages its
//! change produces to `out` in the order observers must see them. The core
//! publishes `out` while still holding the write lock.

use crate::analysis::{
    Analysis, AnalysisDetails, AnalysisOrchestrator, CompoundAnalysis, CompoundAnalysisDetails,
    RemovedCompound,
};
use crate::connection::{ConnectionManager, ConnectionSpec, ConnectionStatus};
use crate::dataset::{Dataset, DatasetRegistry};
use crate::error::{CoordinationError, EntityKind, ErrorCode};
use crate::events::{Message, Snapshot};
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId, JobId};
use crate::job::{
    JobEvent, JobEventSink, JobExecutor, JobHandle, JobPhase, JobRecord, JobRequest, JobStatus,
    JobTable,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a create-or-update command.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert<T> {
    pub value: T,
    pub created: bool,
}

pub(crate) struct CoreState {
    connection: ConnectionManager,
    datasets: DatasetRegistry,
    analyses: AnalysisOrchestrator,
    jobs: JobTable,
    executor: Arc<dyn JobExecutor>,
    job_events: JobEventSink,
}

impl CoreState {
    pub(crate) fn new(executor: Arc<dyn JobExecutor>, job_events: JobEventSink) -> Self {
        Self {
            connection: ConnectionManager::new(),
            datasets: DatasetRegistry::new(),
            analyses: AnalysisOrchestrator::new(),
            jobs: JobTable::new(),
            executor,
            job_events,
        }
    }

    pub(crate) fn require_connected(&self) -> Result<(), CoordinationError> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(CoordinationError::NotConnected)
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn connection_status(&self) -> ConnectionStatus {
        self.connection.current().status()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub(crate) fn dataset(&self, id: &DatasetId) -> Option<Dataset> {
        self.datasets.get(id).cloned()
    }

    pub(crate) fn datasets(&self) -> Vec<Dataset> {
        self.datasets.list()
    }

    pub(crate) fn analysis(&self, id: &AnalysisId) -> Option<Analysis> {
        self.analyses.analysis(id).cloned()
    }

    pub(crate) fn compound_analysis(&self, id: &CompoundAnalysisId) -> Option<CompoundAnalysis> {
        self.analyses.compound(id).cloned()
    }

    pub(crate) fn job(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.get(id).copied()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            connection: self.connection.current().status().connection,
            datasets: self.datasets.list(),
            compound_analyses: self.analyses.compounds(),
            analyses: self.analyses.analyses(),
            jobs: self.jobs.list(),
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Commits an already verified spec. An existing connection is torn down
    /// first, together with everything registered under it.
    pub(crate) fn connect(
        &mut self,
        spec: ConnectionSpec,
        out: &mut Vec<Message>,
    ) -> ConnectionStatus {
        if self.connection.is_connected() {
            self.teardown(out);
        }
        let previous = self.connection.replace(spec.clone());
        info!(
            kind = spec.kind(),
            reconnect = previous.is_connected(),
            "Connected to compute resource"
        );
        out.push(Message::Connect { connection: spec });
        self.connection_status()
    }

    /// Tears everything down and detaches. Idempotent.
    pub(crate) fn disconnect(&mut self, out: &mut Vec<Message>) {
        self.teardown(out);
        if self.connection.disconnect() {
            info!("Disconnected from compute resource");
            out.push(Message::Disconnect);
        }
    }

    fn teardown(&mut self, out: &mut Vec<Message>) {
        for removed in self.analyses.clear() {
            self.emit_compound_removal(removed, out);
        }
        for id in self.datasets.ids() {
            if self.datasets.remove(&id).is_ok() {
                out.push(Message::DeleteDataset { dataset: id });
            }
        }
        for record in self.jobs.list() {
            self.retire_job(&record.analysis, out);
        }
        self.jobs.clear();
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// Stores a prepared dataset. Reusing an id replaces the old dataset and
    /// removes everything that depended on it.
    pub(crate) fn register_dataset(
        &mut self,
        dataset: Dataset,
        out: &mut Vec<Message>,
    ) -> Result<Dataset, CoordinationError> {
        self.require_connected()?;
        let id = dataset.id;
        if self.datasets.contains(&id) {
            let dependents = self.analyses.remove_for_dataset(&id);
            info!(
                dataset_id = %id,
                compound_analyses = dependents.len(),
                "Replacing dataset"
            );
            for removed in dependents {
                self.emit_compound_removal(removed, out);
            }
        }
        self.datasets.insert(dataset.clone());
        info!(
            dataset_id = %id,
            dataset_type = dataset.params.params.type_name(),
            shape = ?dataset.shape(),
            "Dataset registered"
        );
        out.push(Message::CreateDataset {
            dataset: id,
            details: dataset.clone(),
        });
        Ok(dataset)
    }

    pub(crate) fn remove_dataset(
        &mut self,
        id: &DatasetId,
        out: &mut Vec<Message>,
    ) -> Result<Dataset, CoordinationError> {
        self.require_connected()?;
        if !self.datasets.contains(id) {
            return Err(CoordinationError::not_found(EntityKind::Dataset, id));
        }
        for removed in self.analyses.remove_for_dataset(id) {
            self.emit_compound_removal(removed, out);
        }
        let dataset = self.datasets.remove(id)?;
        info!(dataset_id = %id, "Dataset removed");
        out.push(Message::DeleteDataset { dataset: *id });
        Ok(dataset)
    }

    // =========================================================================
    // Analyses
    // =========================================================================

    pub(crate) fn create_or_update_compound(
        &mut self,
        id: CompoundAnalysisId,
        dataset: DatasetId,
        details: CompoundAnalysisDetails,
        out: &mut Vec<Message>,
    ) -> Result<Upsert<CompoundAnalysis>, CoordinationError> {
        self.require_connected()?;
        let outcome =
            self.analyses
                .create_or_update_compound(id, dataset, details, &self.datasets)?;

        let compound = outcome.compound;
        info!(
            compound_analysis_id = %id,
            dataset_id = %dataset,
            created = outcome.created,
            "Compound analysis stored"
        );
        out.push(compound_message(&compound, outcome.created));

        for analysis in outcome.retargeted {
            self.retire_job(&analysis.id, out);
            out.push(analysis_message(&analysis, false));
        }

        Ok(Upsert {
            value: compound,
            created: outcome.created,
        })
    }

    pub(crate) fn remove_compound(
        &mut self,
        id: &CompoundAnalysisId,
        out: &mut Vec<Message>,
    ) -> Result<CompoundAnalysis, CoordinationError> {
        self.require_connected()?;
        let removed = self.analyses.remove_compound(id)?;
        let compound = removed.compound.clone();
        info!(
            compound_analysis_id = %id,
            analyses = removed.analyses.len(),
            "Compound analysis removed"
        );
        self.emit_compound_removal(removed, out);
        Ok(compound)
    }

    pub(crate) fn create_or_update_analysis(
        &mut self,
        id: AnalysisId,
        compound: CompoundAnalysisId,
        details: AnalysisDetails,
        out: &mut Vec<Message>,
    ) -> Result<Upsert<Analysis>, CoordinationError> {
        self.require_connected()?;
        let outcome = self
            .analyses
            .create_or_update_analysis(id, compound, details)?;

        if !outcome.created {
            // Parameters changed, results of the old job are stale
            self.retire_job(&id, out);
        }

        let analysis = outcome.analysis;
        info!(
            analysis_id = %id,
            compound_analysis_id = %compound,
            analysis_type = %analysis.details.analysis_type,
            created = outcome.created,
            "Analysis stored"
        );
        out.push(analysis_message(&analysis, outcome.created));
        for parent in &outcome.reordered {
            out.push(compound_message(parent, false));
        }

        Ok(Upsert {
            value: analysis,
            created: outcome.created,
        })
    }

    pub(crate) fn remove_analysis(
        &mut self,
        id: &AnalysisId,
        out: &mut Vec<Message>,
    ) -> Result<Analysis, CoordinationError> {
        self.require_connected()?;
        let (analysis, parent) = self.analyses.remove_analysis(id)?;
        self.retire_job(id, out);
        info!(analysis_id = %id, "Analysis removed");
        out.push(Message::AnalysisRemoved { analysis: *id });
        if let Some(parent) = parent {
            out.push(compound_message(&parent, false));
        }
        Ok(analysis)
    }

    fn emit_compound_removal(&mut self, removed: RemovedCompound, out: &mut Vec<Message>) {
        for analysis in &removed.analyses {
            self.retire_job(&analysis.id, out);
            out.push(Message::AnalysisRemoved {
                analysis: analysis.id,
            });
        }
        out.push(Message::CompoundAnalysisRemoved {
            compound_analysis: removed.compound.id,
        });
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Starts a new job for `id`, superseding any job the analysis had.
    ///
    /// Executor failures do not fail the command: the job is recorded as
    /// errored and a `JOB_ERROR` message goes out.
    pub(crate) fn run_analysis(
        &mut self,
        id: &AnalysisId,
        out: &mut Vec<Message>,
    ) -> Result<JobHandle, CoordinationError> {
        self.require_connected()?;
        let analysis = self
            .analyses
            .analysis(id)
            .cloned()
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Analysis, id))?;
        let dataset = self
            .datasets
            .get(&analysis.dataset)
            .cloned()
            .ok_or(CoordinationError::DatasetNotFound(analysis.dataset))?;

        self.retire_job(id, out);

        let request = JobRequest {
            job_id: JobId::generate(),
            analysis_id: *id,
            dataset,
            details: analysis.details,
        };
        let handle = request.handle();
        self.jobs.insert(handle);

        match self.executor.start(request, self.job_events.clone()) {
            Ok(()) => {
                info!(job_id = %handle.job_id, analysis_id = %id, "Job started");
            }
            Err(e) => {
                warn!(job_id = %handle.job_id, analysis_id = %id, error = %e, "Executor rejected job");
                self.jobs.set_status(&handle.job_id, JobStatus::Error);
                let err = CoordinationError::from(e);
                out.push(Message::JobError {
                    job: handle.job_id,
                    analysis: *id,
                    code: err.code(),
                    msg: err.to_string(),
                });
            }
        }
        Ok(handle)
    }

    /// Cancels the current job of its analysis.
    pub(crate) fn cancel_job(
        &mut self,
        id: &JobId,
        out: &mut Vec<Message>,
    ) -> Result<JobHandle, CoordinationError> {
        self.require_connected()?;
        let record = self
            .jobs
            .get(id)
            .copied()
            .ok_or_else(|| CoordinationError::not_found(EntityKind::Job, id))?;
        if record.status.is_terminal() {
            debug!(job_id = %id, status = ?record.status, "Cancel for finished job");
            return Ok(record.handle());
        }
        self.executor.cancel(id);
        self.jobs.set_status(id, JobStatus::Canceled);
        info!(job_id = %id, analysis_id = %record.analysis, "Job cancelled");
        out.push(Message::CancelJobDone {
            job: *id,
            analysis: record.analysis,
        });
        Ok(record.handle())
    }

    /// Drops the current job of `analysis`, cancelling it if still live.
    fn retire_job(&mut self, analysis: &AnalysisId, out: &mut Vec<Message>) {
        if let Some(record) = self.jobs.remove_for_analysis(analysis) {
            if !record.status.is_terminal() {
                self.executor.cancel(&record.id);
                debug!(job_id = %record.id, analysis_id = %analysis, "Job superseded");
                out.push(Message::CancelJobDone {
                    job: record.id,
                    analysis: *analysis,
                });
            }
        }
    }

    /// Folds an executor event into the job table. Events from superseded or
    /// finished jobs produce nothing.
    pub(crate) fn apply_job_event(&mut self, event: JobEvent, out: &mut Vec<Message>) {
        let record = match self.jobs.apply(&event) {
            Some(record) => record,
            None => {
                debug!(job_id = %event.job_id, "Ignoring event from stale job");
                return;
            }
        };
        let (job, analysis) = (record.id, record.analysis);
        debug!(job_id = %job, analysis_id = %analysis, status = ?record.status, "Job event");

        out.push(match event.phase {
            JobPhase::Started => Message::JobStarted { job, analysis },
            JobPhase::Progress { done, total } => Message::TaskResult {
                job,
                analysis,
                done,
                total,
            },
            JobPhase::Finished { result } => Message::FinishJob {
                job,
                analysis,
                result,
            },
            JobPhase::Errored { message } => Message::JobError {
                job,
                analysis,
                code: ErrorCode::JobExecutionError,
                msg: message,
            },
            JobPhase::Canceled => Message::CancelJobDone { job, analysis },
        });
    }
}

fn compound_message(compound: &CompoundAnalysis, created: bool) -> Message {
    let (compound_analysis, dataset, details) =
        (compound.id, compound.dataset, compound.details.clone());
    if created {
        Message::CompoundAnalysisCreated {
            compound_analysis,
            dataset,
            details,
        }
    } else {
        Message::CompoundAnalysisUpdated {
            compound_analysis,
            dataset,
            details,
        }
    }
}

fn analysis_message(analysis: &Analysis, created: bool) -> Message {
    let (id, compound_analysis, dataset, details) = (
        analysis.id,
        analysis.compound_analysis,
        analysis.dataset,
        analysis.details.clone(),
    );
    if created {
        Message::AnalysisCreated {
            analysis: id,
            compound_analysis,
            dataset,
            details,
        }
    } else {
        Message::AnalysisUpdated {
            analysis: id,
            compound_analysis,
            dataset,
            details,
        }
    }
}
