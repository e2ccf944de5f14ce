//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[server]
; Number of cores advertised for local connections (default: number of CPU cores)
local_cores = {}
; Result file formats offered to clients, comma separated (default: npz,tiff,raw)
;   npz  - numpy format (.npz)
;   tiff - TIFF format (.tif)
;   raw  - RAW format (.raw)
result_formats = {}

[cluster]
; Timeout in milliseconds when probing a cluster scheduler address (default: 2000)
connect_timeout_ms = {}

[events]
; Messages buffered per observer (default: 1024)
; An observer that falls this far behind is disconnected
subscriber_queue_capacity = {}

[executor]
; Progress events emitted per job by the built-in executor (default: 4)
progress_steps = {}
; Pause between progress events in milliseconds (default: 25)
step_delay_ms = {}

[logging]
; Log file, truncated on every start (default: ~/.framehub/framehub.log)
file = {}
"#,
        config.server.local_cores,
        config.server.result_formats.join(","),
        config.cluster.connect_timeout_ms,
        config.events.subscriber_queue_capacity,
        config.executor.progress_steps,
        config.executor.step_delay_ms,
        path_to_string(&config.logging.file),
    )
}

/// Convert a path to a string, replacing home directory with ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
