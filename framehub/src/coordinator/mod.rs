//! The coordination core.
//!
//! [`CoordinationCore`] composes the connection manager, dataset registry,
//! analysis orchestrator, job table and event bus behind one lock. It is the
//! only public way to change coordination state.
//!
//! ```text
//! command ──► validate ──► apply (write lock) ──► publish ──► observers
//!                                 ▲
//! executor ──► JobEvent ──► relay ┘
//! ```

mod command;
mod core;
mod state;

pub use self::command::Command;
pub use self::core::{CoordinationCore, CoreOptions};
pub use self::state::Upsert;
