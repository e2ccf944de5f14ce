//! Analysis and compound-analysis records.

use super::AnalysisError;
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known analysis kinds.
///
/// The orchestrator only checks that a kind is known; what the parameters
/// mean for each kind is the job executor's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisKind {
    ApplyRoi,
    ApplyDiskMask,
    ApplyRingMask,
    ApplyPointSelector,
    CenterOfMass,
    SumFrames,
    SdFrames,
    SumSig,
    PickFrame,
    PickFftFrame,
    #[serde(rename = "FFTSUM_FRAMES")]
    FftSumFrames,
    RadialFourier,
    Fem,
    Clust,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplyRoi => "APPLY_ROI",
            Self::ApplyDiskMask => "APPLY_DISK_MASK",
            Self::ApplyRingMask => "APPLY_RING_MASK",
            Self::ApplyPointSelector => "APPLY_POINT_SELECTOR",
            Self::CenterOfMass => "CENTER_OF_MASS",
            Self::SumFrames => "SUM_FRAMES",
            Self::SdFrames => "SD_FRAMES",
            Self::SumSig => "SUM_SIG",
            Self::PickFrame => "PICK_FRAME",
            Self::PickFftFrame => "PICK_FFT_FRAME",
            Self::FftSumFrames => "FFTSUM_FRAMES",
            Self::RadialFourier => "RADIAL_FOURIER",
            Self::Fem => "FEM",
            Self::Clust => "CLUST",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis type plus its opaque parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    #[serde(rename = "analysisType")]
    pub analysis_type: AnalysisKind,
    #[serde(default = "empty_object")]
    pub parameters: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl AnalysisDetails {
    pub fn new(analysis_type: AnalysisKind, parameters: serde_json::Value) -> Self {
        Self {
            analysis_type,
            parameters,
        }
    }

    /// Structural check: parameters must be a JSON object.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.parameters.is_object() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidDetails(format!(
                "parameters for {} must be an object",
                self.analysis_type
            )))
        }
    }
}

/// A single parameterized computation scheduled against a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: AnalysisId,
    pub dataset: DatasetId,
    pub compound_analysis: CompoundAnalysisId,
    pub details: AnalysisDetails,
}

/// Client-supplied compound analysis description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundAnalysisDetails {
    pub main_type: AnalysisKind,
    /// Requested ordering of child analyses.
    #[serde(default)]
    pub analyses: Vec<AnalysisId>,
}

/// A grouping of analyses over one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundAnalysis {
    pub id: CompoundAnalysisId,
    pub dataset: DatasetId,
    pub details: CompoundAnalysisDetails,
}
