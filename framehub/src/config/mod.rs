//! Configuration for the coordination server.
//!
//! Configuration lives in `~/.framehub/config.ini`. Every key is optional;
//! missing keys fall back to [`ConfigFile::default()`]. [`ServerConfig`] is
//! the read-only view of server capabilities handed to clients.
//!
//! # Example
//!
//! ```
//! use framehub::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.events.subscriber_queue_capacity, 1024);
//! ```

mod defaults;
mod file;
mod parser;
mod server;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use server::{ResultFormat, ServerConfig, REVISION};
pub use settings::*;
