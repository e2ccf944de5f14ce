//! Error taxonomy for the coordination core.
//!
//! Component errors ([`ConnectionError`], [`DatasetError`], [`AnalysisError`])
//! fold into [`CoordinationError`], which is what every command returns.
//! Callers branch on [`CoordinationError::code`], never on the message text.

use crate::analysis::AnalysisError;
use crate::connection::ConnectionError;
use crate::dataset::DatasetError;
use crate::ids::{CompoundAnalysisId, DatasetId};
use crate::job::JobExecutionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable, machine-readable error codes.
///
/// The serialized form doubles as the `messageType` of error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotConnected,
    #[serde(rename = "CLUSTER_CONN_ERROR")]
    ClusterConnectionError,
    InvalidParameters,
    NotFound,
    DatasetNotFound,
    CompoundAnalysisNotFound,
    JobExecutionError,
}

impl ErrorCode {
    /// Returns the wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::ClusterConnectionError => "CLUSTER_CONN_ERROR",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::NotFound => "NOT_FOUND",
            Self::DatasetNotFound => "DATASET_NOT_FOUND",
            Self::CompoundAnalysisNotFound => "COMPOUND_ANALYSIS_NOT_FOUND",
            Self::JobExecutionError => "JOB_EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds, used to qualify `NotFound` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Dataset,
    CompoundAnalysis,
    Analysis,
    Job,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset => write!(f, "dataset"),
            Self::CompoundAnalysis => write!(f, "compound analysis"),
            Self::Analysis => write!(f, "analysis"),
            Self::Job => write!(f, "job"),
        }
    }
}

/// Errors returned by coordination commands.
///
/// Validation failures are detected before any mutation, so receiving one of
/// these means the authoritative state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    /// No compute resource is attached.
    #[error("not connected to a compute resource")]
    NotConnected,

    /// The cluster could not be reached or refused the handshake.
    #[error("could not connect to cluster at {address}: {reason}")]
    ClusterConnection { address: String, reason: String },

    /// The request payload failed structural validation.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The addressed entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// A compound analysis referenced an unknown dataset.
    #[error("dataset {0} not found")]
    DatasetNotFound(DatasetId),

    /// An analysis referenced an unknown compound analysis.
    #[error("compound analysis {0} not found")]
    CompoundAnalysisNotFound(CompoundAnalysisId),

    /// The job executor failed a job.
    #[error("job execution failed: {0}")]
    JobExecution(String),
}

impl CoordinationError {
    /// Returns the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::NotConnected,
            Self::ClusterConnection { .. } => ErrorCode::ClusterConnectionError,
            Self::InvalidParameters(_) => ErrorCode::InvalidParameters,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::DatasetNotFound(_) => ErrorCode::DatasetNotFound,
            Self::CompoundAnalysisNotFound(_) => ErrorCode::CompoundAnalysisNotFound,
            Self::JobExecution(_) => ErrorCode::JobExecutionError,
        }
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<ConnectionError> for CoordinationError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::InvalidSpec(reason) => Self::InvalidParameters(reason),
            ConnectionError::Unreachable { address, reason } => {
                Self::ClusterConnection { address, reason }
            }
        }
    }
}

impl From<DatasetError> for CoordinationError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::NotFound(id) => Self::not_found(EntityKind::Dataset, id),
            other => Self::InvalidParameters(other.to_string()),
        }
    }
}

impl From<AnalysisError> for CoordinationError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::DatasetNotFound(id) => Self::DatasetNotFound(id),
            AnalysisError::CompoundAnalysisNotFound(id) => Self::CompoundAnalysisNotFound(id),
            AnalysisError::CompoundNotFound(id) => Self::not_found(EntityKind::CompoundAnalysis, id),
            AnalysisError::AnalysisNotFound(id) => Self::not_found(EntityKind::Analysis, id),
            AnalysisError::InvalidDetails(reason) => Self::InvalidParameters(reason),
        }
    }
}

impl From<JobExecutionError> for CoordinationError {
    fn from(err: JobExecutionError) -> Self {
        Self::JobExecution(err.to_string())
    }
}
