//! Observer notifications.
//!
//! [`Message`] is the catalogue of everything observers can see,
//! [`EventBus`] fans messages out, and [`Snapshot`] is the payload of the
//! `INITIAL_STATE` message each observer receives first.

mod bus;
mod message;
mod snapshot;

pub use bus::{DropReason, EventBus, Subscription, DEFAULT_SUBSCRIBER_QUEUE_CAPACITY};
pub use message::{error_response, Message, MessageStatus};
pub use snapshot::Snapshot;

pub(crate) use message::encode;
