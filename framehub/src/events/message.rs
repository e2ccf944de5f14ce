//! Message catalogue.
//!
//! Every message goes out as a JSON object carrying `status` (`ok` or
//! `error`) and `messageType`, plus the fields of its variant:
//!
//! ```text
//! {"status": "ok", "messageType": "CREATE_DATASET", "dataset": "...", "details": {...}}
//! ```

use super::Snapshot;
use crate::analysis::{AnalysisDetails, CompoundAnalysisDetails};
use crate::connection::ConnectionSpec;
use crate::dataset::Dataset;
use crate::error::{CoordinationError, ErrorCode};
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId, JobId};
use serde::Serialize;
use serde_json::{json, Value};

/// Outcome tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Ok,
    Error,
}

/// State-change notifications fanned out to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "messageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    InitialState(Snapshot),

    Connect {
        connection: ConnectionSpec,
    },

    Disconnect,

    CreateDataset {
        dataset: DatasetId,
        details: Dataset,
    },

    DeleteDataset {
        dataset: DatasetId,
    },

    CompoundAnalysisCreated {
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
        dataset: DatasetId,
        details: CompoundAnalysisDetails,
    },

    CompoundAnalysisUpdated {
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
        dataset: DatasetId,
        details: CompoundAnalysisDetails,
    },

    CompoundAnalysisRemoved {
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
    },

    AnalysisCreated {
        analysis: AnalysisId,
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
        dataset: DatasetId,
        details: AnalysisDetails,
    },

    AnalysisUpdated {
        analysis: AnalysisId,
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
        dataset: DatasetId,
        details: AnalysisDetails,
    },

    AnalysisRemoved {
        analysis: AnalysisId,
    },

    JobStarted {
        job: JobId,
        analysis: AnalysisId,
    },

    /// Intermediate progress of a running job.
    TaskResult {
        job: JobId,
        analysis: AnalysisId,
        done: u32,
        total: u32,
    },

    FinishJob {
        job: JobId,
        analysis: AnalysisId,
        result: Value,
    },

    CancelJobDone {
        job: JobId,
        analysis: AnalysisId,
    },

    /// A job failed. `code` is always `JOB_EXECUTION_ERROR`.
    JobError {
        job: JobId,
        analysis: AnalysisId,
        code: ErrorCode,
        msg: String,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    status: MessageStatus,
    #[serde(flatten)]
    message: &'a Message,
}

impl Message {
    pub fn status(&self) -> MessageStatus {
        match self {
            Self::JobError { .. } => MessageStatus::Error,
            _ => MessageStatus::Ok,
        }
    }

    /// The `messageType` string of this message.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::InitialState(_) => "INITIAL_STATE",
            Self::Connect { .. } => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::CreateDataset { .. } => "CREATE_DATASET",
            Self::DeleteDataset { .. } => "DELETE_DATASET",
            Self::CompoundAnalysisCreated { .. } => "COMPOUND_ANALYSIS_CREATED",
            Self::CompoundAnalysisUpdated { .. } => "COMPOUND_ANALYSIS_UPDATED",
            Self::CompoundAnalysisRemoved { .. } => "COMPOUND_ANALYSIS_REMOVED",
            Self::AnalysisCreated { .. } => "ANALYSIS_CREATED",
            Self::AnalysisUpdated { .. } => "ANALYSIS_UPDATED",
            Self::AnalysisRemoved { .. } => "ANALYSIS_REMOVED",
            Self::JobStarted { .. } => "JOB_STARTED",
            Self::TaskResult { .. } => "TASK_RESULT",
            Self::FinishJob { .. } => "FINISH_JOB",
            Self::CancelJobDone { .. } => "CANCEL_JOB_DONE",
            Self::JobError { .. } => "JOB_ERROR",
        }
    }

    /// Wire form of this message.
    pub fn to_json(&self) -> Value {
        encode(&Envelope {
            status: self.status(),
            message: self,
        })
    }
}

/// Error reply for a rejected command.
pub fn error_response(err: &CoordinationError) -> Value {
    json!({
        "status": MessageStatus::Error,
        "messageType": err.code(),
        "msg": err.to_string(),
    })
}

/// Serializes a wire value. All wire types have string keys, so failure here
/// is a bug; it is logged and reported as an error object.
pub(crate) fn encode<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode wire message");
        json!({
            "status": MessageStatus::Error,
            "msg": format!("encoding failed: {}", e),
        })
    })
}
