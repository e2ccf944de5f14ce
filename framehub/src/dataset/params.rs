//! Dataset parameter bags and derived geometry.

use super::dtype::DType;
use super::DatasetError;
use crate::ids::DatasetId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Type-tagged dataset parameters as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DatasetParams {
    /// Headerless binary file of frames in C order.
    #[serde(rename = "RAW")]
    Raw(RawParams),

    /// Synthetic in-memory frames, no backing file.
    #[serde(rename = "MEMORY")]
    Memory(MemoryParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParams {
    pub path: PathBuf,
    pub dtype: DType,
    pub detector_size: Vec<usize>,
    pub scan_size: Vec<usize>,
    #[serde(default)]
    pub enable_direct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryParams {
    pub dtype: DType,
    pub detector_size: Vec<usize>,
    pub scan_size: Vec<usize>,
}

impl DatasetParams {
    /// Wire name of the dataset type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Raw(_) => "RAW",
            Self::Memory(_) => "MEMORY",
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Raw(p) => p.dtype,
            Self::Memory(p) => p.dtype,
        }
    }

    pub fn scan_size(&self) -> &[usize] {
        match self {
            Self::Raw(p) => &p.scan_size,
            Self::Memory(p) => &p.scan_size,
        }
    }

    pub fn detector_size(&self) -> &[usize] {
        match self {
            Self::Raw(p) => &p.detector_size,
            Self::Memory(p) => &p.detector_size,
        }
    }

    /// Checks geometry and returns the derived shape, `scan_size ++ detector_size`.
    pub fn derive_shape(&self) -> Result<Vec<usize>, DatasetError> {
        let scan = self.scan_size();
        let detector = self.detector_size();

        if scan.is_empty() {
            return Err(DatasetError::Invalid(
                "scan_size must have at least one dimension".to_string(),
            ));
        }
        if detector.len() != 2 {
            return Err(DatasetError::Invalid(format!(
                "detector_size must have 2 dimensions, got {}",
                detector.len()
            )));
        }
        if let Some(field) = [("scan_size", scan), ("detector_size", detector)]
            .iter()
            .find(|(_, dims)| dims.contains(&0))
            .map(|(name, _)| *name)
        {
            return Err(DatasetError::Invalid(format!(
                "{} entries must be positive",
                field
            )));
        }

        Ok(scan.iter().chain(detector.iter()).copied().collect())
    }

    /// Number of bytes the full dataset occupies.
    pub fn byte_size(&self, shape: &[usize]) -> Result<u64, DatasetError> {
        shape
            .iter()
            .try_fold(self.dtype().itemsize() as u64, |acc, dim| {
                acc.checked_mul(*dim as u64)
            })
            .ok_or_else(|| DatasetError::Invalid("dataset size overflows".to_string()))
    }
}

/// Persisted parameter view: the supplied parameters plus derived `shape`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDetails {
    #[serde(flatten)]
    pub params: DatasetParams,
    pub shape: Vec<usize>,
}

/// A registered dataset as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub params: DatasetDetails,
}

impl Dataset {
    pub fn shape(&self) -> &[usize] {
        &self.params.shape
    }

    pub fn scan_size(&self) -> &[usize] {
        self.params.params.scan_size()
    }

    pub fn detector_size(&self) -> &[usize] {
        self.params.params.detector_size()
    }
}
