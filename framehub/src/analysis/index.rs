//! Incrementally maintained dependency index.
//!
//! dataset → compound analyses → analyses. Cascades walk this index instead
//! of scanning every entity, so removal cost is proportional to the number
//! of affected entities. Children are kept in link order.

use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DependencyIndex {
    compounds_by_dataset: HashMap<DatasetId, Vec<CompoundAnalysisId>>,
    analyses_by_compound: HashMap<CompoundAnalysisId, Vec<AnalysisId>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_compound(&mut self, dataset: DatasetId, compound: CompoundAnalysisId) {
        let children = self.compounds_by_dataset.entry(dataset).or_default();
        if !children.contains(&compound) {
            children.push(compound);
        }
        self.analyses_by_compound.entry(compound).or_default();
    }

    pub fn unlink_compound(&mut self, dataset: &DatasetId, compound: &CompoundAnalysisId) {
        remove_child(&mut self.compounds_by_dataset, dataset, compound);
    }

    /// Forgets a compound entirely, returning the analyses still linked to it.
    pub fn drop_compound(
        &mut self,
        dataset: &DatasetId,
        compound: &CompoundAnalysisId,
    ) -> Vec<AnalysisId> {
        self.unlink_compound(dataset, compound);
        self.analyses_by_compound.remove(compound).unwrap_or_default()
    }

    pub fn link_analysis(&mut self, compound: CompoundAnalysisId, analysis: AnalysisId) {
        let children = self.analyses_by_compound.entry(compound).or_default();
        if !children.contains(&analysis) {
            children.push(analysis);
        }
    }

    pub fn unlink_analysis(&mut self, compound: &CompoundAnalysisId, analysis: &AnalysisId) {
        if let Some(children) = self.analyses_by_compound.get_mut(compound) {
            children.retain(|child| child != analysis);
        }
    }

    pub fn compounds_of(&self, dataset: &DatasetId) -> &[CompoundAnalysisId] {
        self.compounds_by_dataset
            .get(dataset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn analyses_of(&self, compound: &CompoundAnalysisId) -> &[AnalysisId] {
        self.analyses_by_compound
            .get(compound)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.compounds_by_dataset.clear();
        self.analyses_by_compound.clear();
    }
}

fn remove_child<K, V>(map: &mut HashMap<K, Vec<V>>, key: &K, child: &V)
where
    K: std::hash::Hash + Eq,
    V: PartialEq,
{
    let now_empty = match map.get_mut(key) {
        Some(children) => {
            children.retain(|c| c != child);
            children.is_empty()
        }
        None => false,
    };
    if now_empty {
        map.remove(key);
    }
}
