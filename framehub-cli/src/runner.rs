//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and core creation so
//! command handlers only deal with their own work.

use crate::error::CliError;
use framehub::config::ConfigFile;
use framehub::logging::{init_logging, LogOptions, LoggingGuard};
use framehub::CoordinationCore;
use std::io::IsTerminal;
use std::path::Path;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (from `config_path` or the default location) and
    /// initialize logging.
    ///
    /// Console logging goes to stderr and is only enabled when stderr is a
    /// terminal, so piped output stays machine readable.
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let options = LogOptions {
            console: std::io::stderr().is_terminal(),
            debug: debug_mode,
        };
        let logging_guard = init_logging(&config.logging.file, options)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("FrameHub v{}", framehub::VERSION);
        info!("FrameHub CLI: {} command", command);
    }

    /// Build a multi-threaded tokio runtime.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }

    /// Create a coordination core with the built-in executor and probe.
    ///
    /// Must be called from inside the runtime.
    pub fn create_core(&self) -> CoordinationCore {
        let core = CoordinationCore::from_config(&self.config);
        info!("Coordination core created");
        core
    }
}
