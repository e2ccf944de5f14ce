//! Compound analyses and their child analyses.
//!
//! The [`AnalysisOrchestrator`] enforces the reference rules: a compound
//! analysis always points at a registered dataset and an analysis always
//! belongs to an existing compound analysis. Every mutating method validates
//! first and only then touches its maps, so an `Err` means nothing changed.
//!
//! Job handling is not done here. Outcomes report which analyses were
//! replaced, moved or removed, and the coordinator cancels their jobs.

mod index;
mod types;

pub use index::DependencyIndex;
pub use types::{
    Analysis, AnalysisDetails, AnalysisKind, CompoundAnalysis, CompoundAnalysisDetails,
};

use crate::dataset::DatasetRegistry;
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A compound analysis referenced an unknown dataset.
    #[error("dataset {0} not found")]
    DatasetNotFound(DatasetId),

    /// An analysis referenced an unknown compound analysis.
    #[error("compound analysis {0} not found")]
    CompoundAnalysisNotFound(CompoundAnalysisId),

    /// The compound analysis addressed for removal does not exist.
    #[error("compound analysis {0} does not exist")]
    CompoundNotFound(CompoundAnalysisId),

    /// The analysis addressed for removal does not exist.
    #[error("analysis {0} does not exist")]
    AnalysisNotFound(AnalysisId),

    /// Analysis details failed structural validation.
    #[error("{0}")]
    InvalidDetails(String),
}

/// Result of creating or updating a compound analysis.
#[derive(Debug, Clone)]
pub struct CompoundOutcome {
    pub compound: CompoundAnalysis,
    pub created: bool,
    /// Child analyses now pointing at a different dataset.
    pub retargeted: Vec<Analysis>,
}

/// Result of creating or updating an analysis.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub created: bool,
    /// Compound analyses whose child ordering changed as a side effect.
    pub reordered: Vec<CompoundAnalysis>,
}

/// A removed compound analysis together with the children removed with it.
#[derive(Debug, Clone)]
pub struct RemovedCompound {
    pub compound: CompoundAnalysis,
    pub analyses: Vec<Analysis>,
}

struct CompoundEntry {
    compound: CompoundAnalysis,
    seq: u64,
}

struct AnalysisEntry {
    analysis: Analysis,
    seq: u64,
}

/// Owner of all compound analyses and analyses.
#[derive(Default)]
pub struct AnalysisOrchestrator {
    compounds: HashMap<CompoundAnalysisId, CompoundEntry>,
    analyses: HashMap<AnalysisId, AnalysisEntry>,
    index: DependencyIndex,
    next_seq: u64,
}

impl AnalysisOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Creates the compound analysis `id`, or replaces its dataset reference
    /// and ordering metadata if it exists.
    pub fn create_or_update_compound(
        &mut self,
        id: CompoundAnalysisId,
        dataset: DatasetId,
        mut details: CompoundAnalysisDetails,
        datasets: &DatasetRegistry,
    ) -> Result<CompoundOutcome, AnalysisError> {
        if !datasets.contains(&dataset) {
            return Err(AnalysisError::DatasetNotFound(dataset));
        }

        let existing_dataset = self.compounds.get(&id).map(|entry| entry.compound.dataset);
        let mut retargeted = Vec::new();
        match existing_dataset {
            Some(old) if old != dataset => {
                self.index.unlink_compound(&old, &id);
                self.index.link_compound(dataset, id);
                for child in self.index.analyses_of(&id).to_vec() {
                    if let Some(entry) = self.analyses.get_mut(&child) {
                        entry.analysis.dataset = dataset;
                        retargeted.push(entry.analysis.clone());
                    }
                }
            }
            Some(_) => {}
            None => self.index.link_compound(dataset, id),
        }

        details.analyses = normalize_order(&details.analyses, self.index.analyses_of(&id));
        let compound = CompoundAnalysis {
            id,
            dataset,
            details,
        };

        let created = match self.compounds.get_mut(&id) {
            Some(entry) => {
                entry.compound = compound.clone();
                false
            }
            None => {
                let seq = self.take_seq();
                self.compounds.insert(
                    id,
                    CompoundEntry {
                        compound: compound.clone(),
                        seq,
                    },
                );
                true
            }
        };

        Ok(CompoundOutcome {
            compound,
            created,
            retargeted,
        })
    }

    /// Creates the analysis `id` under `compound_id`, or replaces its
    /// parameters (and possibly its parent) if it exists.
    pub fn create_or_update_analysis(
        &mut self,
        id: AnalysisId,
        compound_id: CompoundAnalysisId,
        details: AnalysisDetails,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        details.validate()?;
        let dataset = self
            .compounds
            .get(&compound_id)
            .map(|entry| entry.compound.dataset)
            .ok_or(AnalysisError::CompoundAnalysisNotFound(compound_id))?;

        let mut reordered = Vec::new();
        let previous_parent = self
            .analyses
            .get(&id)
            .map(|entry| entry.analysis.compound_analysis);
        if let Some(prev) = previous_parent.filter(|prev| *prev != compound_id) {
            self.index.unlink_analysis(&prev, &id);
            reordered.extend(self.detach_from_order(&prev, &id));
        }
        self.index.link_analysis(compound_id, id);
        reordered.extend(self.attach_to_order(&compound_id, id));

        let analysis = Analysis {
            id,
            dataset,
            compound_analysis: compound_id,
            details,
        };

        let created = match self.analyses.get_mut(&id) {
            Some(entry) => {
                entry.analysis = analysis.clone();
                false
            }
            None => {
                let seq = self.take_seq();
                self.analyses.insert(
                    id,
                    AnalysisEntry {
                        analysis: analysis.clone(),
                        seq,
                    },
                );
                true
            }
        };

        Ok(AnalysisOutcome {
            analysis,
            created,
            reordered,
        })
    }

    /// Removes one analysis. Returns it and its parent if the parent's
    /// ordering changed.
    pub fn remove_analysis(
        &mut self,
        id: &AnalysisId,
    ) -> Result<(Analysis, Option<CompoundAnalysis>), AnalysisError> {
        let entry = self
            .analyses
            .remove(id)
            .ok_or(AnalysisError::AnalysisNotFound(*id))?;
        let parent = entry.analysis.compound_analysis;
        self.index.unlink_analysis(&parent, id);
        let reordered = self.detach_from_order(&parent, id);
        Ok((entry.analysis, reordered))
    }

    /// Removes a compound analysis and every child analysis.
    pub fn remove_compound(
        &mut self,
        id: &CompoundAnalysisId,
    ) -> Result<RemovedCompound, AnalysisError> {
        let entry = self
            .compounds
            .remove(id)
            .ok_or(AnalysisError::CompoundNotFound(*id))?;
        let children = self.index.drop_compound(&entry.compound.dataset, id);
        let analyses = children
            .iter()
            .filter_map(|child| self.analyses.remove(child))
            .map(|entry| entry.analysis)
            .collect();
        Ok(RemovedCompound {
            compound: entry.compound,
            analyses,
        })
    }

    /// Removes everything that depends on `dataset`.
    pub fn remove_for_dataset(&mut self, dataset: &DatasetId) -> Vec<RemovedCompound> {
        self.index
            .compounds_of(dataset)
            .to_vec()
            .iter()
            .filter_map(|id| self.remove_compound(id).ok())
            .collect()
    }

    /// Removes every compound analysis, in creation order.
    pub fn clear(&mut self) -> Vec<RemovedCompound> {
        let ids: Vec<CompoundAnalysisId> =
            self.compounds().into_iter().map(|compound| compound.id).collect();
        let removed = ids
            .iter()
            .filter_map(|id| self.remove_compound(id).ok())
            .collect();
        self.index.clear();
        removed
    }

    pub fn analysis(&self, id: &AnalysisId) -> Option<&Analysis> {
        self.analyses.get(id).map(|entry| &entry.analysis)
    }

    pub fn compound(&self, id: &CompoundAnalysisId) -> Option<&CompoundAnalysis> {
        self.compounds.get(id).map(|entry| &entry.compound)
    }

    /// All analyses in creation order.
    pub fn analyses(&self) -> Vec<Analysis> {
        let mut entries: Vec<&AnalysisEntry> = self.analyses.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.analysis.clone()).collect()
    }

    /// All compound analyses in creation order.
    pub fn compounds(&self) -> Vec<CompoundAnalysis> {
        let mut entries: Vec<&CompoundEntry> = self.compounds.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.compound.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty() && self.analyses.is_empty()
    }

    fn attach_to_order(
        &mut self,
        compound: &CompoundAnalysisId,
        analysis: AnalysisId,
    ) -> Option<CompoundAnalysis> {
        let entry = self.compounds.get_mut(compound)?;
        if entry.compound.details.analyses.contains(&analysis) {
            return None;
        }
        entry.compound.details.analyses.push(analysis);
        Some(entry.compound.clone())
    }

    fn detach_from_order(
        &mut self,
        compound: &CompoundAnalysisId,
        analysis: &AnalysisId,
    ) -> Option<CompoundAnalysis> {
        let entry = self.compounds.get_mut(compound)?;
        let before = entry.compound.details.analyses.len();
        entry.compound.details.analyses.retain(|a| a != analysis);
        (entry.compound.details.analyses.len() != before).then(|| entry.compound.clone())
    }
}

/// Requested ids that are real children keep their order; remaining children
/// follow in link order; unknown ids are dropped.
fn normalize_order(requested: &[AnalysisId], children: &[AnalysisId]) -> Vec<AnalysisId> {
    let mut order: Vec<AnalysisId> = Vec::with_capacity(children.len());
    for id in requested.iter().chain(children.iter()) {
        if children.contains(id) && !order.contains(id) {
            order.push(*id);
        }
    }
    order
}
