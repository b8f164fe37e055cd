//! The shared message store.
//!
//! A [`MessageBus`] maps message ids to live messages and is the single
//! source of truth for rendering. Every mutation is announced on a broadcast
//! channel so views can re-render without polling.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::id::{IdGenerator, UuidGenerator};
use crate::kind::MessageKind;
use crate::message::{FlashMessage, MessageContent, MessageId};
use crate::options::OptionsPatch;
use crate::timer::{Scheduler, TokioScheduler};

/// Default channel capacity for store change notifications.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Change notification emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An entry was inserted or overwritten.
    Pushed { id: MessageId },
    /// An entry was removed.
    Removed { id: MessageId },
    /// The whole store was reset.
    Cleared { count: usize },
}

impl StoreEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Pushed { .. } => "Pushed",
            Self::Removed { .. } => "Removed",
            Self::Cleared { .. } => "Cleared",
        }
    }
}

#[derive(Default)]
struct Entries {
    next_seq: u64,
    map: HashMap<MessageId, (u64, FlashMessage)>,
}

pub(crate) struct Store {
    entries: RwLock<Entries>,
    events: broadcast::Sender<StoreEvent>,
    defaults: OptionsPatch,
    scheduler: Arc<dyn Scheduler>,
    ids: Arc<dyn IdGenerator>,
}

impl Store {
    pub(crate) fn push(&self, id: MessageId, message: FlashMessage) {
        let previous = {
            let mut entries = self.entries.write();
            let seq = match entries.map.get(&id) {
                Some((seq, _)) => *seq,
                None => {
                    let seq = entries.next_seq;
                    entries.next_seq += 1;
                    seq
                }
            };
            entries.map.insert(id.clone(), (seq, message.clone()))
        };
        // Dropped outside the lock: a message may hold the last handle to a callback
        if let Some((_, previous)) = previous {
            if !previous.ptr_eq(&message) {
                previous.detach();
            }
        }
        tracing::debug!(id = %id, "Message pushed to store");
        let _ = self.events.send(StoreEvent::Pushed { id });
    }

    pub(crate) fn remove(&self, id: &MessageId) -> bool {
        let entry = self.entries.write().map.remove(id);
        let removed = entry.is_some();
        drop(entry);
        if removed {
            tracing::debug!(id = %id, "Message removed from store");
            let _ = self.events.send(StoreEvent::Removed { id: id.clone() });
        }
        removed
    }

    fn clear(&self) -> usize {
        let cleared = std::mem::take(&mut self.entries.write().map);
        let count = cleared.len();
        for (_, message) in cleared.into_values() {
            message.detach();
        }
        let _ = self.events.send(StoreEvent::Cleared { count });
        count
    }

    fn snapshot(&self) -> Vec<FlashMessage> {
        let entries = self.entries.read();
        let mut ordered: Vec<_> = entries.map.values().collect();
        ordered.sort_by_key(|(seq, _)| *seq);
        ordered.into_iter().map(|(_, m)| m.clone()).collect()
    }
}

/// Handle to one message store.
///
/// Cloning is cheap; all clones share the same store. A plugin installation
/// creates exactly one bus and hands it to every consumer.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<Store>,
}

impl MessageBus {
    /// Create a bus with built-in defaults, UUID ids and tokio timers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a bus whose messages inherit `defaults`.
    pub fn with_defaults(defaults: OptionsPatch) -> Self {
        Self::builder().defaults(defaults).build()
    }

    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::default()
    }

    /// Installation-wide message defaults.
    pub fn defaults(&self) -> &OptionsPatch {
        &self.shared.defaults
    }

    /// Create a message bound to this bus.
    ///
    /// The message is registered immediately unless `auto_emit` resolves to false.
    pub fn flash(
        &self,
        content: impl Into<MessageContent>,
        kind: impl Into<MessageKind>,
        options: OptionsPatch,
    ) -> Result<FlashMessage> {
        FlashMessage::new(self, content, kind, &options, &self.shared.defaults)
    }

    /// Insert or overwrite the entry at `id`. Last write wins.
    pub fn push(&self, id: MessageId, message: FlashMessage) {
        self.shared.push(id, message);
    }

    /// Remove the entry at `id`, without running any message hooks.
    ///
    /// Returns `false` if there was no such entry.
    pub fn destroy(&self, id: &MessageId) -> bool {
        self.shared.remove(id)
    }

    /// Reset the store to empty.
    ///
    /// Removed messages go back to `Draft`: their `before_destroy` hooks do
    /// not run and their timers stay scheduled. A timer that fires later
    /// destroys its message against a store that no longer holds it.
    pub fn destroy_all(&self) {
        let count = self.shared.clear();
        tracing::info!(count, "Flash store cleared");
    }

    /// Destroy every live message through its own `destroy`, hooks included.
    pub fn dismiss_all(&self) -> usize {
        let messages = self.shared.snapshot();
        let count = messages.len();
        for message in messages {
            message.destroy();
        }
        tracing::info!(count, "All flash messages dismissed");
        count
    }

    pub fn get(&self, id: &MessageId) -> Option<FlashMessage> {
        self.shared.entries.read().map.get(id).map(|(_, m)| m.clone())
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.shared.entries.read().map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shared.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages currently in the store, in insertion order.
    pub fn messages(&self) -> Vec<FlashMessage> {
        self.shared.snapshot()
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> StoreReceiver {
        StoreReceiver {
            rx: self.shared.events.subscribe(),
        }
    }

    /// Get the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.events.receiver_count()
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn next_id(&self) -> MessageId {
        self.shared.ids.next_id()
    }

    pub(crate) fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.shared.scheduler.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<Store> {
        Arc::downgrade(&self.shared)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("len", &self.len())
            .field("defaults", &self.shared.defaults)
            .finish()
    }
}

/// Builder for [`MessageBus`].
pub struct MessageBusBuilder {
    defaults: OptionsPatch,
    scheduler: Arc<dyn Scheduler>,
    ids: Arc<dyn IdGenerator>,
    event_capacity: usize,
}

impl Default for MessageBusBuilder {
    fn default() -> Self {
        Self {
            defaults: OptionsPatch::default(),
            scheduler: Arc::new(TokioScheduler::new()),
            ids: Arc::new(UuidGenerator),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl MessageBusBuilder {
    pub fn defaults(mut self, defaults: OptionsPatch) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// How many change events are buffered for slow subscribers.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> MessageBus {
        let (events, _) = broadcast::channel(self.event_capacity);
        MessageBus {
            shared: Arc::new(Store {
                entries: RwLock::new(Entries::default()),
                events,
                defaults: self.defaults,
                scheduler: self.scheduler,
                ids: self.ids,
            }),
        }
    }
}

/// Receiver for store change events.
pub struct StoreReceiver {
    rx: broadcast::Receiver<StoreEvent>,
}

impl StoreReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` once every bus handle is gone. Events missed by a
    /// lagging receiver are skipped.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Store subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
