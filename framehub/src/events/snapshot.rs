//! Point-in-time projection of the whole coordination state.

use crate::analysis::{Analysis, CompoundAnalysis};
use crate::connection::ConnectionBody;
use crate::dataset::Dataset;
use crate::job::JobRecord;
use serde::Serialize;

/// Everything a newly subscribed observer needs to rebuild its view.
///
/// Lists are in creation order. Built while holding the core's state lock,
/// so it never reflects half of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub connection: ConnectionBody,
    pub datasets: Vec<Dataset>,
    pub compound_analyses: Vec<CompoundAnalysis>,
    pub analyses: Vec<Analysis>,
    pub jobs: Vec<JobRecord>,
}

impl Snapshot {
    /// True when no entity of any kind is registered.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
            && self.compound_analyses.is_empty()
            && self.analyses.is_empty()
            && self.jobs.is_empty()
    }
}
