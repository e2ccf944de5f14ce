//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::result_format_description;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("local_cores") {
            config.server.local_cores =
                parse_positive(v, "server", "local_cores", "must be a positive integer")?;
        }
        if let Some(v) = section.get("result_formats") {
            let formats: Vec<String> = v
                .split(',')
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect();
            if let Some(unknown) = formats
                .iter()
                .find(|f| result_format_description(f).is_none())
            {
                return Err(ConfigFileError::InvalidValue {
                    section: "server".to_string(),
                    key: "result_formats".to_string(),
                    value: v.to_string(),
                    reason: format!("unknown format '{}', expected npz, tiff or raw", unknown),
                });
            }
            config.server.result_formats = formats;
        }
    }

    // [cluster] section
    if let Some(section) = ini.section(Some("cluster")) {
        if let Some(v) = section.get("connect_timeout_ms") {
            config.cluster.connect_timeout_ms = parse_positive(
                v,
                "cluster",
                "connect_timeout_ms",
                "must be a positive integer (milliseconds)",
            )?;
        }
    }

    // [events] section
    if let Some(section) = ini.section(Some("events")) {
        if let Some(v) = section.get("subscriber_queue_capacity") {
            config.events.subscriber_queue_capacity = parse_positive(
                v,
                "events",
                "subscriber_queue_capacity",
                "must be a positive integer",
            )?;
        }
    }

    // [executor] section
    if let Some(section) = ini.section(Some("executor")) {
        if let Some(v) = section.get("progress_steps") {
            config.executor.progress_steps =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "executor".to_string(),
                    key: "progress_steps".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer".to_string(),
                })?;
        }
        if let Some(v) = section.get("step_delay_ms") {
            config.executor.step_delay_ms =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "executor".to_string(),
                    key: "step_delay_ms".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer (milliseconds)".to_string(),
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parses an integer that must be greater than zero.
fn parse_positive<T>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
