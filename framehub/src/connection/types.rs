//! Connection specs and the process-wide connection state.

use serde::{Deserialize, Serialize};

/// A request to attach the server to a compute resource.
///
/// On the wire this is `{"type": "local", "numWorkers": 2}` or
/// `{"type": "tcp", "address": "tcp://scheduler:8786"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectionSpec {
    /// A local worker pool.
    #[serde(rename = "local", alias = "LOCAL")]
    Local {
        #[serde(rename = "numWorkers")]
        num_workers: usize,
    },

    /// A remote cluster scheduler.
    #[serde(rename = "tcp", alias = "TCP", alias = "cluster", alias = "CLUSTER")]
    Cluster { address: String },
}

impl ConnectionSpec {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Cluster { .. } => "cluster",
        }
    }
}

/// The single current compute-resource binding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connection {
    #[default]
    Disconnected,
    Connected(ConnectionSpec),
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Returns the active spec, if connected.
    pub fn spec(&self) -> Option<&ConnectionSpec> {
        match self {
            Self::Disconnected => None,
            Self::Connected(spec) => Some(spec),
        }
    }

    /// Wire view of this connection.
    pub fn status(&self) -> ConnectionStatus {
        match self {
            Self::Disconnected => ConnectionStatus {
                status: ConnectionStatusTag::Disconnected,
                connection: ConnectionBody::Empty(Empty {}),
            },
            Self::Connected(spec) => ConnectionStatus {
                status: ConnectionStatusTag::Ok,
                connection: ConnectionBody::Spec(spec.clone()),
            },
        }
    }
}

/// Reply shape for connection reads and successful connects.
///
/// `{"status": "disconnected", "connection": {}}` or
/// `{"status": "ok", "connection": {"type": "local", "numWorkers": 2}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub status: ConnectionStatusTag,
    pub connection: ConnectionBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatusTag {
    Ok,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConnectionBody {
    Spec(ConnectionSpec),
    Empty(Empty),
}

/// Serializes as `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Empty {}
