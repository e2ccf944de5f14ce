//! Job records as seen by the coordination core.

use super::{JobEvent, JobHandle, JobStatus};
use crate::ids::{AnalysisId, JobId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot entry for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub analysis: AnalysisId,
    pub status: JobStatus,
}

impl JobRecord {
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.id,
            analysis_id: self.analysis,
        }
    }
}

struct Entry {
    record: JobRecord,
    seq: u64,
}

/// Current job per analysis.
///
/// Only the latest job of an analysis has a record; starting a new one drops
/// the old record, and events for dropped jobs are ignored by [`apply`].
///
/// [`apply`]: JobTable::apply
#[derive(Default)]
pub struct JobTable {
    jobs: HashMap<JobId, Entry>,
    by_analysis: HashMap<AnalysisId, JobId>,
    next_seq: u64,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new job in `Created` state, returning the record it
    /// superseded.
    pub fn insert(&mut self, handle: JobHandle) -> Option<JobRecord> {
        let superseded = self.remove_for_analysis(&handle.analysis_id);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_analysis.insert(handle.analysis_id, handle.job_id);
        self.jobs.insert(
            handle.job_id,
            Entry {
                record: JobRecord {
                    id: handle.job_id,
                    analysis: handle.analysis_id,
                    status: JobStatus::Created,
                },
                seq,
            },
        );
        superseded
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.get(id).map(|entry| &entry.record)
    }

    pub fn current_for(&self, analysis: &AnalysisId) -> Option<&JobRecord> {
        self.by_analysis.get(analysis).and_then(|id| self.get(id))
    }

    /// Applies an executor event. Returns the updated record, or `None` if
    /// the job is unknown or already terminal.
    pub fn apply(&mut self, event: &JobEvent) -> Option<JobRecord> {
        self.set_status(&event.job_id, event.phase.status())
    }

    /// Moves a live job to `status`. Terminal jobs are left alone.
    pub fn set_status(&mut self, id: &JobId, status: JobStatus) -> Option<JobRecord> {
        let entry = self.jobs.get_mut(id)?;
        if entry.record.status.is_terminal() {
            return None;
        }
        entry.record.status = status;
        Some(entry.record)
    }

    pub fn remove_for_analysis(&mut self, analysis: &AnalysisId) -> Option<JobRecord> {
        let id = self.by_analysis.remove(analysis)?;
        self.jobs.remove(&id).map(|entry| entry.record)
    }

    /// All records in start order.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut entries: Vec<&Entry> = self.jobs.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.record).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.by_analysis.clear();
    }
}
