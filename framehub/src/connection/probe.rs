//! Cluster reachability checks.
//!
//! A cluster connect is only committed once the scheduler address answered.
//! The check is behind [`ClusterProbe`] so tests can substitute a fake.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;

/// Outcome of a single probe.
pub type ProbeResult = Result<(), String>;

/// Checks whether a cluster scheduler address is reachable.
pub trait ClusterProbe: Send + Sync {
    /// Attempts a handshake with `host:port`.
    fn probe<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>>;
}

/// Probe that opens a TCP connection to the scheduler.
#[derive(Debug, Clone)]
pub struct TcpClusterProbe {
    timeout: Duration,
}

impl TcpClusterProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpClusterProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_CLUSTER_CONNECT_TIMEOUT_MS))
    }
}

impl ClusterProbe for TcpClusterProbe {
    fn probe<'a>(
        &'a self,
        host: &'a str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = ProbeResult> + Send + 'a>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {}ms", self.timeout.as_millis())),
            }
        })
    }
}

/// Splits `tcp://host:port` (scheme optional) into its parts.
///
/// Returns `None` for anything that is not a host followed by a numeric port.
pub fn parse_cluster_address(address: &str) -> Option<(&str, u16)> {
    let rest = address.trim();
    let rest = rest.strip_prefix("tcp://").unwrap_or(rest);
    let (host, port) = rest.rsplit_once(':')?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = port.parse::<u16>().ok().filter(|p| *p != 0)?;
    Some((host, port))
}
