//! Structured commands and their JSON replies.
//!
//! A transport either decodes requests into [`Command`]s itself and hands
//! them to [`CoordinationCore::dispatch`], or passes the raw JSON to
//! [`CoordinationCore::dispatch_value`]. Both always answer with a JSON
//! object: the success reply, or `{"status": "error", "messageType": CODE, "msg"}`.
//! A request that does not decode (unknown `op`, unknown dtype, missing or
//! mistyped field) is answered with `INVALID_PARAMETERS`.

use super::CoordinationCore;
use crate::analysis::{AnalysisDetails, CompoundAnalysisDetails};
use crate::connection::ConnectionSpec;
use crate::dataset::DatasetParams;
use crate::error::CoordinationError;
use crate::events::{encode, error_response, Message, MessageStatus};
use crate::ids::{AnalysisId, CompoundAnalysisId, DatasetId, JobId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Every operation the core accepts, tagged by `op`.
///
/// ```text
/// {"op": "registerDataset", "id": "...", "params": {"type": "MEMORY", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Command {
    GetConfig,
    GetConnection,
    Connect {
        connection: ConnectionSpec,
    },
    Disconnect,
    RegisterDataset {
        id: DatasetId,
        params: DatasetParams,
    },
    RemoveDataset {
        id: DatasetId,
    },
    GetDataset {
        id: DatasetId,
    },
    ListDatasets,
    CreateOrUpdateCompoundAnalysis {
        id: CompoundAnalysisId,
        dataset: DatasetId,
        details: CompoundAnalysisDetails,
    },
    RemoveCompoundAnalysis {
        id: CompoundAnalysisId,
    },
    CreateOrUpdateAnalysis {
        id: AnalysisId,
        #[serde(rename = "compoundAnalysis")]
        compound_analysis: CompoundAnalysisId,
        details: AnalysisDetails,
    },
    RemoveAnalysis {
        id: AnalysisId,
    },
    RunAnalysis {
        id: AnalysisId,
    },
    CancelJob {
        id: JobId,
    },
}

impl Command {
    /// Decodes a JSON request.
    pub fn parse(request: Value) -> Result<Self, CoordinationError> {
        serde_json::from_value(request)
            .map_err(|e| CoordinationError::InvalidParameters(e.to_string()))
    }

    /// The `op` tag of this command.
    pub fn op(&self) -> &'static str {
        match self {
            Self::GetConfig => "getConfig",
            Self::GetConnection => "getConnection",
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::RegisterDataset { .. } => "registerDataset",
            Self::RemoveDataset { .. } => "removeDataset",
            Self::GetDataset { .. } => "getDataset",
            Self::ListDatasets => "listDatasets",
            Self::CreateOrUpdateCompoundAnalysis { .. } => "createOrUpdateCompoundAnalysis",
            Self::RemoveCompoundAnalysis { .. } => "removeCompoundAnalysis",
            Self::CreateOrUpdateAnalysis { .. } => "createOrUpdateAnalysis",
            Self::RemoveAnalysis { .. } => "removeAnalysis",
            Self::RunAnalysis { .. } => "runAnalysis",
            Self::CancelJob { .. } => "cancelJob",
        }
    }
}

fn ok(message_type: &str, mut fields: Value) -> Value {
    if let Some(map) = fields.as_object_mut() {
        map.insert("status".to_string(), json!(MessageStatus::Ok));
        map.insert("messageType".to_string(), json!(message_type));
    }
    fields
}

impl CoordinationCore {
    /// Decodes and executes a raw JSON request.
    pub async fn dispatch_value(&self, request: Value) -> Value {
        match Command::parse(request) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                tracing::warn!(code = %e.code(), error = %e, "Malformed command");
                error_response(&e)
            }
        }
    }

    /// Executes `command` and renders the reply.
    pub async fn dispatch(&self, command: Command) -> Value {
        tracing::debug!(op = command.op(), "Dispatching command");
        let reply = match command {
            Command::GetConfig => Ok(ok(
                "CONFIG",
                json!({ "config": encode(self.server_config()) }),
            )),
            Command::GetConnection => Ok(encode(&self.connection().await)),
            Command::Connect { connection } => {
                self.connect(connection).await.map(|status| encode(&status))
            }
            Command::Disconnect => {
                self.disconnect().await;
                Ok(Message::Disconnect.to_json())
            }
            Command::RegisterDataset { id, params } => {
                self.register_dataset(id, params).await.map(|dataset| {
                    Message::CreateDataset {
                        dataset: id,
                        details: dataset,
                    }
                    .to_json()
                })
            }
            Command::RemoveDataset { id } => self
                .remove_dataset(id)
                .await
                .map(|_| Message::DeleteDataset { dataset: id }.to_json()),
            Command::GetDataset { id } => self.dataset(id).await.map(|dataset| {
                ok(
                    "DATASET",
                    json!({ "dataset": id, "details": encode(&dataset) }),
                )
            }),
            Command::ListDatasets => {
                let datasets = self.datasets().await;
                Ok(ok("DATASETS", json!({ "datasets": encode(&datasets) })))
            }
            Command::CreateOrUpdateCompoundAnalysis {
                id,
                dataset,
                details,
            } => self
                .create_or_update_compound_analysis(id, dataset, details)
                .await
                .map(|upsert| {
                    let compound = upsert.value;
                    let message = if upsert.created {
                        Message::CompoundAnalysisCreated {
                            compound_analysis: compound.id,
                            dataset: compound.dataset,
                            details: compound.details,
                        }
                    } else {
                        Message::CompoundAnalysisUpdated {
                            compound_analysis: compound.id,
                            dataset: compound.dataset,
                            details: compound.details,
                        }
                    };
                    message.to_json()
                }),
            Command::RemoveCompoundAnalysis { id } => {
                self.remove_compound_analysis(id).await.map(|_| {
                    Message::CompoundAnalysisRemoved {
                        compound_analysis: id,
                    }
                    .to_json()
                })
            }
            Command::CreateOrUpdateAnalysis {
                id,
                compound_analysis,
                details,
            } => self
                .create_or_update_analysis(id, compound_analysis, details)
                .await
                .map(|upsert| {
                    let analysis = upsert.value;
                    let message = if upsert.created {
                        Message::AnalysisCreated {
                            analysis: analysis.id,
                            compound_analysis: analysis.compound_analysis,
                            dataset: analysis.dataset,
                            details: analysis.details,
                        }
                    } else {
                        Message::AnalysisUpdated {
                            analysis: analysis.id,
                            compound_analysis: analysis.compound_analysis,
                            dataset: analysis.dataset,
                            details: analysis.details,
                        }
                    };
                    message.to_json()
                }),
            Command::RemoveAnalysis { id } => self
                .remove_analysis(id)
                .await
                .map(|_| Message::AnalysisRemoved { analysis: id }.to_json()),
            Command::RunAnalysis { id } => self
                .run_analysis(id)
                .await
                .map(|handle| ok("RUN_ANALYSIS", encode(&handle))),
            Command::CancelJob { id } => self
                .cancel_job(id)
                .await
                .map(|handle| ok("CANCEL_JOB", encode(&handle))),
        };

        reply.unwrap_or_else(|e| error_response(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let command: Command = serde_json::from_value(json!({
            "op": "connect",
            "connection": {"type": "TCP", "address": "tcp://unknown:8786"}
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::Connect {
                connection: ConnectionSpec::Cluster {
                    address: "tcp://unknown:8786".to_string()
                }
            }
        );
        assert_eq!(command.op(), "connect");
    }

    #[test]
    fn test_parse_analysis_command() {
        let command: Command = serde_json::from_value(json!({
            "op": "createOrUpdateAnalysis",
            "id": "00000000-0000-0000-0000-000000000003",
            "compoundAnalysis": "00000000-0000-0000-0000-000000000002",
            "details": {
                "analysisType": "SUM_FRAMES",
                "parameters": {"roi": {"shape": "disk", "r": 1, "cx": 1, "cy": 1}}
            }
        }))
        .unwrap();
        assert_eq!(command.op(), "createOrUpdateAnalysis");
    }

    #[test]
    fn test_op_matches_serialized_tag() {
        let commands = vec![
            Command::GetConfig,
            Command::ListDatasets,
            Command::Disconnect,
            Command::CancelJob {
                id: JobId::generate(),
            },
            Command::RemoveCompoundAnalysis {
                id: CompoundAnalysisId::from_uuid(uuid::Uuid::from_u128(1)),
            },
        ];
        for command in commands {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["op"], json!(command.op()));
        }
    }

    #[test]
    fn test_unknown_op_rejected() {
        let res: Result<Command, _> = serde_json::from_value(json!({"op": "selfDestruct"}));
        assert!(res.is_err());
    }

    fn assert_invalid(request: Value) {
        let err = Command::parse(request).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidParameters);
    }

    #[test]
    fn test_parse_reports_invalid_parameters() {
        assert_invalid(json!({
            "op": "registerDataset",
            "id": "00000000-0000-0000-0000-000000000001",
            "params": {"type": "MEMORY", "dtype": "float16",
                       "detector_size": [8, 8], "scan_size": [4, 4]}
        }));
        assert_invalid(json!({
            "op": "registerDataset",
            "id": "00000000-0000-0000-0000-000000000001",
            "params": {"type": "RAW", "dtype": "float32",
                       "detector_size": [8, 8], "scan_size": [4, 4]}
        }));
        assert_invalid(json!({
            "op": "connect",
            "connection": {"type": "local", "numWorkers": -1}
        }));
        assert_invalid(json!({"op": "selfDestruct"}));
        assert_invalid(json!([]));
    }

    #[test]
    fn test_ok_adds_envelope() {
        let value = ok("DATASETS", json!({"datasets": []}));
        assert_eq!(
            value,
            json!({"status": "ok", "messageType": "DATASETS", "datasets": []})
        );
    }
}
