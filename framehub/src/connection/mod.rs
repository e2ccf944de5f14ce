//! Compute-resource connection management.
//!
//! The [`ConnectionManager`] owns the one connection state of a core. Connect
//! requests are checked in two phases: [`verify`] validates the spec and
//! probes a cluster address without touching any state, then
//! [`ConnectionManager::replace`] commits. A failed verification therefore
//! can never leave a half-connected state behind.

mod probe;
mod types;

pub use probe::{parse_cluster_address, ClusterProbe, ProbeResult, TcpClusterProbe};
pub use types::{
    Connection, ConnectionBody, ConnectionSpec, ConnectionStatus, ConnectionStatusTag, Empty,
};

use thiserror::Error;

/// Errors raised while establishing a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The spec is structurally invalid.
    #[error("invalid connection spec: {0}")]
    InvalidSpec(String),

    /// The cluster address did not answer.
    #[error("cluster at {address} is unreachable: {reason}")]
    Unreachable { address: String, reason: String },
}

/// Validates `spec` and, for clusters, probes the scheduler address.
pub async fn verify(spec: &ConnectionSpec, probe: &dyn ClusterProbe) -> Result<(), ConnectionError> {
    match spec {
        ConnectionSpec::Local { num_workers } => {
            if *num_workers == 0 {
                return Err(ConnectionError::InvalidSpec(
                    "numWorkers must be a positive integer".to_string(),
                ));
            }
            Ok(())
        }
        ConnectionSpec::Cluster { address } => {
            let (host, port) = parse_cluster_address(address).ok_or_else(|| {
                ConnectionError::InvalidSpec(format!(
                    "address '{}' is not of the form tcp://host:port",
                    address
                ))
            })?;
            probe
                .probe(host, port)
                .await
                .map_err(|reason| ConnectionError::Unreachable {
                    address: address.clone(),
                    reason,
                })
        }
    }
}

/// Owner of the current connection state.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    current: Connection,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current connection.
    pub fn current(&self) -> &Connection {
        &self.current
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_connected()
    }

    /// Commits an already verified spec, returning the previous state.
    pub fn replace(&mut self, spec: ConnectionSpec) -> Connection {
        std::mem::replace(&mut self.current, Connection::Connected(spec))
    }

    /// Transitions to `Disconnected`. Returns whether a connection was active.
    pub fn disconnect(&mut self) -> bool {
        let was = self.current.is_connected();
        self.current = Connection::Disconnected;
        was
    }
}
