//! Server capabilities as reported to clients.

use super::defaults::result_format_description;
use super::settings::ConfigFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Source revision baked in at compile time via `FRAMEHUB_REVISION`.
pub const REVISION: &str = match option_env!("FRAMEHUB_REVISION") {
    Some(revision) => revision,
    None => "unknown",
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFormat {
    pub identifier: String,
    pub description: String,
}

/// Answer to a config request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub version: String,
    pub revision: String,
    pub local_cores: usize,
    pub cwd: PathBuf,
    pub separator: String,
    pub result_file_formats: BTreeMap<String, ResultFormat>,
}

impl ServerConfig {
    pub fn from_config(config: &ConfigFile) -> Self {
        let result_file_formats = config
            .server
            .result_formats
            .iter()
            .filter_map(|id| {
                let description = result_format_description(id)?;
                Some((
                    id.clone(),
                    ResultFormat {
                        identifier: id.clone(),
                        description: description.to_string(),
                    },
                ))
            })
            .collect();

        Self {
            version: crate::VERSION.to_string(),
            revision: REVISION.to_string(),
            local_cores: config.server.local_cores,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            separator: std::path::MAIN_SEPARATOR.to_string(),
            result_file_formats,
        }
    }
}
