//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Server identity and capabilities
    pub server: ServerSettings,
    /// Cluster connection settings
    pub cluster: ClusterSettings,
    /// Observer delivery settings
    pub events: EventsSettings,
    /// Built-in job executor settings
    pub executor: ExecutorSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Number of cores advertised for local connections
    pub local_cores: usize,
    /// Result file formats offered to clients, by identifier
    pub result_formats: Vec<String>,
}

/// Cluster connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    /// Timeout in milliseconds for the reachability probe
    pub connect_timeout_ms: u64,
}

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsSettings {
    /// Messages buffered per observer before it is dropped
    pub subscriber_queue_capacity: usize,
}

/// Built-in job executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Progress events emitted per job
    pub progress_steps: u32,
    /// Pause between progress events in milliseconds
    pub step_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
