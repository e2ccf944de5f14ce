//! Dataset registration.
//!
//! Registration runs in two steps. [`prepare`] validates the parameter bag,
//! derives the shape and checks that a backing file is reachable; it never
//! touches shared state. [`DatasetRegistry`] then stores the prepared record.
//! Cascading removal of dependents is driven by the coordinator, which owns
//! both the registry and the analysis orchestrator.

mod dtype;
mod params;

pub use dtype::DType;
pub use params::{Dataset, DatasetDetails, DatasetParams, MemoryParams, RawParams};

use crate::ids::DatasetId;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by dataset validation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// Parameters failed structural validation.
    #[error("{0}")]
    Invalid(String),

    /// The backing file could not be opened.
    #[error("cannot access {path}: {reason}")]
    Unreachable { path: PathBuf, reason: String },

    /// The backing file is smaller than the declared geometry requires.
    #[error("{path} holds {actual} bytes, geometry requires {expected}")]
    TooSmall {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// No dataset with this id is registered.
    #[error("dataset {0} not found")]
    NotFound(DatasetId),
}

/// Validates `params` and builds the record to register under `id`.
pub async fn prepare(id: DatasetId, params: DatasetParams) -> Result<Dataset, DatasetError> {
    let shape = params.derive_shape()?;

    if let DatasetParams::Raw(raw) = &params {
        let expected = params.byte_size(&shape)?;
        let metadata =
            tokio::fs::metadata(&raw.path)
                .await
                .map_err(|e| DatasetError::Unreachable {
                    path: raw.path.clone(),
                    reason: e.to_string(),
                })?;
        if !metadata.is_file() {
            return Err(DatasetError::Unreachable {
                path: raw.path.clone(),
                reason: "not a regular file".to_string(),
            });
        }
        if metadata.len() < expected {
            return Err(DatasetError::TooSmall {
                path: raw.path.clone(),
                expected,
                actual: metadata.len(),
            });
        }
    }

    Ok(Dataset {
        id,
        params: DatasetDetails { params, shape },
    })
}

struct Entry {
    dataset: Dataset,
    seq: u64,
}

/// Registered datasets keyed by client-supplied id.
///
/// Listing order is registration order; re-registering an id moves it to
/// the end, since the replacement is a new dataset as far as clients are
/// concerned.
#[derive(Default)]
pub struct DatasetRegistry {
    datasets: HashMap<DatasetId, Entry>,
    next_seq: u64,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `dataset`, returning the record it replaced, if any.
    pub fn insert(&mut self, dataset: Dataset) -> Option<Dataset> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.datasets
            .insert(dataset.id, Entry { dataset, seq })
            .map(|entry| entry.dataset)
    }

    pub fn remove(&mut self, id: &DatasetId) -> Result<Dataset, DatasetError> {
        self.datasets
            .remove(id)
            .map(|entry| entry.dataset)
            .ok_or(DatasetError::NotFound(*id))
    }

    pub fn get(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.get(id).map(|entry| &entry.dataset)
    }

    pub fn contains(&self, id: &DatasetId) -> bool {
        self.datasets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// All datasets in registration order.
    pub fn list(&self) -> Vec<Dataset> {
        let mut entries: Vec<&Entry> = self.datasets.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.dataset.clone()).collect()
    }

    /// Ids of all datasets in registration order.
    pub fn ids(&self) -> Vec<DatasetId> {
        self.list().into_iter().map(|dataset| dataset.id).collect()
    }
}
