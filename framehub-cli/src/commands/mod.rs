//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (show, path, init)
//! - [`info`] - Print the server capabilities
//! - [`replay`] - Run a script of commands against a fresh core

pub mod config;
pub mod info;
pub mod replay;
