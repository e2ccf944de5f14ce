//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the result format catalogue,
//! and the `ConfigFile::default()` implementation.

use super::file::config_directory;
use super::settings::*;

/// Default cluster probe timeout (2 seconds).
pub const DEFAULT_CLUSTER_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default number of messages buffered per observer.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize =
    crate::events::DEFAULT_SUBSCRIBER_QUEUE_CAPACITY;

/// Default number of progress events per job.
pub const DEFAULT_PROGRESS_STEPS: u32 = crate::job::DEFAULT_PROGRESS_STEPS;

/// Default pause between progress events (25ms).
pub const DEFAULT_STEP_DELAY_MS: u64 = 25;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "framehub.log";

/// Result file formats the server knows how to offer: (identifier, description).
pub const KNOWN_RESULT_FORMATS: &[(&str, &str)] = &[
    ("npz", "numpy format (.npz)"),
    ("tiff", "TIFF format (.tif)"),
    ("raw", "RAW format (.raw)"),
];

/// Looks up the description of a known result format.
pub fn result_format_description(identifier: &str) -> Option<&'static str> {
    KNOWN_RESULT_FORMATS
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, description)| *description)
}

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                local_cores: num_cpus(),
                result_formats: KNOWN_RESULT_FORMATS
                    .iter()
                    .map(|(id, _)| id.to_string())
                    .collect(),
            },
            cluster: ClusterSettings {
                connect_timeout_ms: DEFAULT_CLUSTER_CONNECT_TIMEOUT_MS,
            },
            events: EventsSettings {
                subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            },
            executor: ExecutorSettings {
                progress_steps: DEFAULT_PROGRESS_STEPS,
                step_delay_ms: DEFAULT_STEP_DELAY_MS,
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
