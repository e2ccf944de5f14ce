//! FrameHub - coordination server core for interactive 4D-STEM analysis
//!
//! This library keeps the authoritative record of a compute connection,
//! registered datasets, compound analyses, analyses and their jobs, and
//! broadcasts every state change to connected observers.
//!
//! # High-Level API
//!
//! The [`coordinator`] module provides the single entry point:
//!
//! ```ignore
//! use framehub::config::ConfigFile;
//! use framehub::connection::ConnectionSpec;
//! use framehub::coordinator::CoordinationCore;
//!
//! let core = CoordinationCore::from_config(&ConfigFile::load()?);
//! let mut events = core.subscribe().await; // first message: INITIAL_STATE
//!
//! core.connect(ConnectionSpec::Local { num_workers: 2 }).await?;
//! let dataset = core.register_dataset(dataset_id, params).await?;
//! ```

pub mod analysis;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod dataset;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;
pub mod logging;

pub use coordinator::{Command, CoordinationCore, CoreOptions};
pub use error::CoordinationError;

/// Version of the FrameHub library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
