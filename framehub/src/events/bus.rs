//! Fan-out of messages to observers.
//!
//! Each observer gets its own bounded queue. Publishing never waits: an
//! observer whose queue is full is dropped with [`DropReason::Lagged`] and
//! its receiver drains what was queued and then ends. Observers that went
//! away are pruned on the next publish.

use super::Message;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default per-observer queue length.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

/// Why the bus stopped delivering to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The observer's queue was full.
    Lagged,
    /// The bus was shut down.
    Shutdown,
}

type SharedDropReason = Arc<Mutex<Option<DropReason>>>;

struct SubscriberState {
    sender: mpsc::Sender<Arc<Message>>,
    drop_reason: SharedDropReason,
}

impl SubscriberState {
    fn set_drop_reason(&self, reason: DropReason) {
        if let Ok(mut guard) = self.drop_reason.lock() {
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
    }
}

struct BusInner {
    subscribers: DashMap<u64, SubscriberState>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Broadcast hub for [`Message`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates a bus whose observers each buffer up to `capacity` messages.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Registers an observer whose first message is `initial`.
    ///
    /// The caller must hold whatever lock orders publishes, so that nothing
    /// can slip in between the state `initial` was built from and the first
    /// broadcast this observer sees.
    pub fn subscribe_with(&self, initial: Message) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        // Fresh channel with capacity >= 1, cannot be full
        let _ = sender.try_send(Arc::new(initial));

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let drop_reason: SharedDropReason = Arc::new(Mutex::new(None));
        self.inner.subscribers.insert(
            id,
            SubscriberState {
                sender,
                drop_reason: Arc::clone(&drop_reason),
            },
        );
        debug!(subscriber = id, "Observer subscribed");

        Subscription {
            id,
            receiver,
            drop_reason,
            bus: Arc::clone(&self.inner),
        }
    }

    /// Delivers `message` to every observer. Returns how many received it.
    pub fn publish(&self, message: Message) -> usize {
        let message = Arc::new(message);
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for entry in self.inner.subscribers.iter() {
            match entry.value().sender.try_send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    entry.value().set_drop_reason(DropReason::Lagged);
                    dropped.push((*entry.key(), true));
                }
                Err(TrySendError::Closed(_)) => dropped.push((*entry.key(), false)),
            }
        }

        for (id, lagged) in dropped {
            self.inner.subscribers.remove(&id);
            if lagged {
                warn!(
                    subscriber = id,
                    message_type = message.message_type(),
                    "Dropping lagging observer"
                );
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Disconnects every observer.
    pub fn close(&self) {
        let ids: Vec<u64> = self.inner.subscribers.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, state)) = self.inner.subscribers.remove(&id) {
                state.set_drop_reason(DropReason::Shutdown);
            }
        }
    }
}

/// Receiving end for one observer. Unsubscribes when dropped.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<Message>>,
    drop_reason: SharedDropReason,
    bus: Arc<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next message. `None` once the bus stopped delivering
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }

    /// Returns a queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.try_recv().ok()
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason.lock().ok().and_then(|guard| *guard)
    }

    /// Stops delivery to this observer. Idempotent.
    pub fn unsubscribe(&mut self) {
        if self.bus.subscribers.remove(&self.id).is_some() {
            debug!(subscriber = self.id, "Observer unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
