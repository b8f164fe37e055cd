//! Flash message types and the self-destruct state machine.
//!
//! A [`FlashMessage`] is a cheap handle: the store, the caller and a pending
//! timer all share the same underlying message.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bus::{MessageBus, Store};
use crate::error::{Error, Result};
use crate::kind::MessageKind;
use crate::options::{Callback, MessageOptions, OptionsPatch};
use crate::timer::{Scheduler, TimerHandle};

/// Opaque message identifier, unique per message and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Structured payload interpreted by the renderer
    Structured(serde_json::Value),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<serde_json::Value> for MessageContent {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }
}

/// Lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Not in any store: never emitted, or detached by a bulk clear
    Draft,
    /// Registered; a timer is live if the timeout is positive
    Active,
    /// Registered, timer disarmed by user interaction
    Paused,
    /// Terminal
    Destroyed,
}

impl MessageState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Destroyed => "destroyed",
        }
    }

    /// Whether the message has been emitted and not yet destroyed.
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

struct Lifecycle {
    options: MessageOptions,
    state: MessageState,
    timer: Option<TimerHandle>,
    /// Bumped on every arm/disarm so stale timers recognise themselves
    generation: u64,
}

struct Inner {
    id: MessageId,
    content: MessageContent,
    kind: MessageKind,
    created_at: DateTime<Utc>,
    store: Weak<Store>,
    scheduler: Arc<dyn Scheduler>,
    lifecycle: Mutex<Lifecycle>,
}

/// One transient notification.
#[derive(Clone)]
pub struct FlashMessage {
    inner: Arc<Inner>,
}

impl FlashMessage {
    /// Create a message bound to `bus`.
    ///
    /// Options resolve as built-in defaults, then `global`, then `local`.
    /// With `auto_emit` the message is registered and its timer armed before
    /// this returns.
    pub fn new(
        bus: &MessageBus,
        content: impl Into<MessageContent>,
        kind: impl Into<MessageKind>,
        local: &OptionsPatch,
        global: &OptionsPatch,
    ) -> Result<Self> {
        let options = MessageOptions::resolve(global, local);
        let auto_emit = options.auto_emit;

        let message = Self {
            inner: Arc::new(Inner {
                id: bus.next_id(),
                content: content.into(),
                kind: kind.into(),
                created_at: Utc::now(),
                store: bus.downgrade(),
                scheduler: bus.scheduler(),
                lifecycle: Mutex::new(Lifecycle {
                    options,
                    state: MessageState::Draft,
                    timer: None,
                    generation: 0,
                }),
            }),
        };

        tracing::debug!(
            id = %message.inner.id,
            kind = %message.inner.kind,
            auto_emit,
            "Flash message created"
        );

        if auto_emit {
            message.emit()?;
        }
        Ok(message)
    }

    pub fn id(&self) -> &MessageId {
        &self.inner.id
    }

    pub fn content(&self) -> &MessageContent {
        &self.inner.content
    }

    pub fn kind(&self) -> &MessageKind {
        &self.inner.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Snapshot of the resolved options.
    pub fn options(&self) -> MessageOptions {
        self.inner.lifecycle.lock().options.clone()
    }

    pub fn timeout(&self) -> i64 {
        self.inner.lifecycle.lock().options.timeout
    }

    pub fn is_important(&self) -> bool {
        self.inner.lifecycle.lock().options.important
    }

    pub fn state(&self) -> MessageState {
        self.inner.lifecycle.lock().state
    }

    /// Whether a self-destruct timer is currently armed.
    pub fn has_timer(&self) -> bool {
        self.inner.lifecycle.lock().timer.is_some()
    }

    /// Whether both handles refer to the same message.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register the message in its store, then arm the self-destruct timer.
    ///
    /// A message can be emitted once. If the timer cannot be armed the
    /// registration is rolled back.
    pub fn emit(&self) -> Result<()> {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                MessageState::Draft => lifecycle.state = MessageState::Active,
                MessageState::Destroyed => return Err(Error::Destroyed(self.inner.id.clone())),
                MessageState::Active | MessageState::Paused => {
                    return Err(Error::AlreadyEmitted(self.inner.id.clone()))
                }
            }
        }

        if let Some(store) = self.inner.store.upgrade() {
            store.push(self.inner.id.clone(), self.clone());
        }

        if let Err(e) = self.start_self_destruct_timer() {
            tracing::warn!(id = %self.inner.id, "Failed to arm self-destruct timer: {}", e);
            self.inner.lifecycle.lock().state = MessageState::Draft;
            if let Some(store) = self.inner.store.upgrade() {
                store.remove(&self.inner.id);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Disarm the timer, run `before_destroy`, then leave the store.
    ///
    /// Only the first call has any effect.
    pub fn destroy(&self) {
        let (timer, before_destroy) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Destroyed {
                return;
            }
            lifecycle.state = MessageState::Destroyed;
            lifecycle.generation += 1;
            (lifecycle.timer.take(), lifecycle.options.before_destroy.clone())
        };

        if let Some(timer) = timer {
            timer.cancel();
        }
        self.invoke(before_destroy);

        if let Some(store) = self.inner.store.upgrade() {
            store.remove(&self.inner.id);
        }
        tracing::debug!(id = %self.inner.id, "Flash message destroyed");
    }

    /// Change the timeout used by future arm operations.
    ///
    /// A running timer keeps its original deadline.
    pub fn set_self_destruct_timeout(&self, millis: i64) {
        self.inner.lifecycle.lock().options.timeout = millis;
    }

    /// Arm a one-shot timer of the configured timeout that destroys the message.
    ///
    /// Any previously armed timer is cancelled first. Returns `false` when the
    /// timeout is not positive (a permanent message) or the message is destroyed.
    pub fn start_self_destruct_timer(&self) -> Result<bool> {
        let (delay, generation, previous) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Destroyed {
                return Ok(false);
            }
            lifecycle.generation += 1;
            (
                lifecycle.options.self_destruct_after(),
                lifecycle.generation,
                lifecycle.timer.take(),
            )
        };

        if let Some(previous) = previous {
            previous.cancel();
        }
        let Some(delay) = delay else {
            return Ok(false);
        };

        let message = self.clone();
        let handle = self
            .inner
            .scheduler
            .schedule(delay, Box::new(move || message.expire(generation)))?;

        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.generation == generation && lifecycle.state != MessageState::Destroyed {
            lifecycle.timer = Some(handle);
            if lifecycle.state == MessageState::Paused {
                lifecycle.state = MessageState::Active;
            }
            tracing::debug!(id = %self.inner.id, delay_ms = delay.as_millis() as u64, "Self-destruct timer armed");
            Ok(true)
        } else {
            drop(lifecycle);
            handle.cancel();
            Ok(false)
        }
    }

    /// Cancel the live timer, if any. The message stays in the store.
    pub fn kill_self_destruct_timer(&self) -> bool {
        let timer = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.generation += 1;
            lifecycle.timer.take()
        };

        match timer {
            Some(timer) => {
                timer.cancel();
                tracing::debug!(id = %self.inner.id, "Self-destruct timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Signal that the user started interacting with the message.
    pub fn on_start_interact(&self) {
        let (pause, callback) = {
            let lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Destroyed {
                return;
            }
            (
                lifecycle.options.pause_on_interact,
                lifecycle.options.on_start_interact.clone(),
            )
        };

        if pause {
            self.kill_self_destruct_timer();
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Active {
                lifecycle.state = MessageState::Paused;
            }
        }
        self.invoke(callback);
    }

    /// Signal that the interaction ended.
    ///
    /// With `pause_on_interact` a registered message gets a fresh timer of the
    /// full timeout; the elapsed part of the previous one is not credited.
    pub fn on_complete_interact(&self) -> Result<()> {
        let (pause, registered, callback) = {
            let lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Destroyed {
                return Ok(());
            }
            (
                lifecycle.options.pause_on_interact,
                lifecycle.state.is_registered(),
                lifecycle.options.on_complete_interact.clone(),
            )
        };

        if pause && registered {
            self.start_self_destruct_timer()?;
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state == MessageState::Paused {
                lifecycle.state = MessageState::Active;
            }
        }
        self.invoke(callback);
        Ok(())
    }

    /// The store dropped this message without destroying it. Hooks do not run
    /// and a live timer stays armed; the message may be emitted again.
    pub(crate) fn detach(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state.is_registered() {
            lifecycle.state = MessageState::Draft;
        }
    }

    fn expire(&self, generation: u64) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.generation != generation || lifecycle.state == MessageState::Destroyed {
                return;
            }
            lifecycle.timer = None;
        }
        tracing::debug!(id = %self.inner.id, "Self-destruct timer expired");
        self.destroy();
    }

    fn invoke(&self, callback: Option<Callback>) {
        if let Some(callback) = callback {
            callback(self);
        }
    }
}

impl std::fmt::Debug for FlashMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.inner.lifecycle.lock();
        f.debug_struct("FlashMessage")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("content", &self.inner.content)
            .field("state", &lifecycle.state)
            .field("options", &lifecycle.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn draft(bus: &MessageBus, patch: OptionsPatch) -> FlashMessage {
        FlashMessage::new(bus, "hello", "info", &patch.auto_emit(false), &OptionsPatch::new())
            .unwrap()
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_content_conversions() {
        assert_eq!(MessageContent::from("saved").as_text(), Some("saved"));

        let structured = MessageContent::from(serde_json::json!({"title": "Saved"}));
        assert!(structured.as_text().is_none());

        let text = MessageContent::from(serde_json::json!("plain"));
        assert_eq!(text, MessageContent::Text("plain".to_string()));
    }

    #[test]
    fn test_draft_message_is_not_registered() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new());

        assert_eq!(message.state(), MessageState::Draft);
        assert!(!bus.contains(message.id()));
        assert!(!message.has_timer());
    }

    #[test]
    fn test_emit_permanent_message_needs_no_runtime() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new());

        message.emit().unwrap();
        assert_eq!(message.state(), MessageState::Active);
        assert!(bus.contains(message.id()));
    }

    #[test]
    fn test_double_emit_is_rejected() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new());

        message.emit().unwrap();
        assert!(matches!(message.emit(), Err(Error::AlreadyEmitted(_))));
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_emit_after_destroy_is_rejected() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new());

        message.destroy();
        assert!(matches!(message.emit(), Err(Error::Destroyed(_))));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_emit_without_runtime_rolls_back() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new().timeout(1000));

        assert!(matches!(message.emit(), Err(Error::NoRuntime)));
        assert_eq!(message.state(), MessageState::Draft);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_destroy_runs_hook_once_before_removal() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_in_store = Arc::new(AtomicUsize::new(0));

        let patch = {
            let calls = calls.clone();
            let seen_in_store = seen_in_store.clone();
            let bus = bus.clone();
            OptionsPatch::new().before_destroy(move |message| {
                calls.fetch_add(1, Ordering::SeqCst);
                if bus.contains(message.id()) {
                    seen_in_store.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        let message = FlashMessage::new(&bus, "bye", "info", &patch, &OptionsPatch::new()).unwrap();

        message.destroy();
        message.destroy();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen_in_store.load(Ordering::SeqCst), 1);
        assert_eq!(message.state(), MessageState::Destroyed);
        assert!(!bus.contains(message.id()));
    }

    #[test]
    fn test_set_timeout_only_changes_config() {
        let bus = MessageBus::new();
        let message = draft(&bus, OptionsPatch::new());

        message.set_self_destruct_timeout(2500);
        assert_eq!(message.timeout(), 2500);
        assert!(!message.has_timer());
    }

    #[test]
    fn test_interact_callbacks_fire_without_pause() {
        let bus = MessageBus::new();
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let patch = {
            let started = started.clone();
            let completed = completed.clone();
            OptionsPatch::new()
                .on_start_interact(move |_| {
                    started.fetch_add(1, Ordering::SeqCst);
                })
                .on_complete_interact(move |_| {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
        };
        let message = FlashMessage::new(&bus, "hi", "info", &patch, &OptionsPatch::new()).unwrap();

        message.on_start_interact();
        message.on_complete_interact().unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(message.state(), MessageState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_destroys_message() {
        let bus = MessageBus::new();
        let patch = OptionsPatch::new().timeout(1000);
        let message = FlashMessage::new(&bus, "saved", "success", &patch, &OptionsPatch::new()).unwrap();

        assert!(message.has_timer());
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(bus.contains(message.id()));

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(message.state(), MessageState::Destroyed);
        assert!(!bus.contains(message.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_cancels_previous_timer() {
        let bus = MessageBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let patch = {
            let calls = calls.clone();
            OptionsPatch::new()
                .timeout(100)
                .before_destroy(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                })
        };
        let message = FlashMessage::new(&bus, "x", "info", &patch, &OptionsPatch::new()).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        message.set_self_destruct_timeout(300);
        assert!(message.start_self_destruct_timer().unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(bus.contains(message.id()));

        tokio::time::sleep(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert!(!bus.contains(message.id()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_timer_keeps_message() {
        let bus = MessageBus::new();
        let patch = OptionsPatch::new().timeout(100);
        let message = FlashMessage::new(&bus, "x", "info", &patch, &OptionsPatch::new()).unwrap();

        assert!(message.kill_self_destruct_timer());
        assert!(!message.kill_self_destruct_timer());

        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(bus.contains(message.id()));
        assert_eq!(message.state(), MessageState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_timeout_leaves_running_timer() {
        let bus = MessageBus::new();
        let patch = OptionsPatch::new().timeout(100);
        let message = FlashMessage::new(&bus, "x", "info", &patch, &OptionsPatch::new()).unwrap();

        message.set_self_destruct_timeout(300);
        assert!(message.has_timer());

        tokio::time::sleep(Duration::from_millis(101)).await;
        tokio::task::yield_now().await;
        assert!(!bus.contains(message.id()));
        assert_eq!(message.state(), MessageState::Destroyed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arming_paused_message_resumes_it() {
        let bus = MessageBus::new();
        let patch = OptionsPatch::new().timeout(100).pause_on_interact(true);
        let message = FlashMessage::new(&bus, "x", "info", &patch, &OptionsPatch::new()).unwrap();

        message.on_start_interact();
        assert_eq!(message.state(), MessageState::Paused);

        assert!(message.start_self_destruct_timer().unwrap());
        assert_eq!(message.state(), MessageState::Active);
        assert!(message.has_timer());
    }
}
