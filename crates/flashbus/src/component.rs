//! View-model of the flash message rendering component.
//!
//! Markup and styling belong to the host; this is the part that reads the
//! store and forwards pointer interaction back to the messages.

use serde::Serialize;

use crate::bus::MessageBus;
use crate::error::Result;
use crate::kind::MessageKind;
use crate::message::{FlashMessage, MessageContent, MessageId};

/// CSS class shared by every rendered message.
pub const BASE_CLASS: &str = "flash__message";

/// One message as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub id: MessageId,
    pub kind: MessageKind,
    pub content: MessageContent,
    pub important: bool,
    pub css_class: String,
}

impl RenderedMessage {
    fn from_message(message: &FlashMessage) -> Self {
        let important = message.is_important();
        let mut css_class = format!("{} {}", BASE_CLASS, message.kind());
        if important {
            css_class.push_str(" important");
        }
        Self {
            id: message.id().clone(),
            kind: message.kind().clone(),
            content: message.content().clone(),
            important,
            css_class,
        }
    }
}

/// The registered rendering component, bound to one bus.
#[derive(Debug, Clone)]
pub struct FlashComponent {
    name: String,
    bus: MessageBus,
}

impl FlashComponent {
    pub fn new(name: impl Into<String>, bus: MessageBus) -> Self {
        Self {
            name: name.into(),
            bus,
        }
    }

    /// Tag name the component is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Messages to render, in insertion order.
    pub fn entries(&self) -> Vec<RenderedMessage> {
        self.bus
            .messages()
            .iter()
            .map(RenderedMessage::from_message)
            .collect()
    }

    /// Pointer entered the message.
    pub fn start_interact(&self, id: &MessageId) -> bool {
        match self.bus.get(id) {
            Some(message) => {
                message.on_start_interact();
                true
            }
            None => false,
        }
    }

    /// Pointer left the message.
    pub fn complete_interact(&self, id: &MessageId) -> Result<bool> {
        match self.bus.get(id) {
            Some(message) => {
                message.on_complete_interact()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close button: destroys the message, hooks included.
    pub fn dismiss(&self, id: &MessageId) -> bool {
        match self.bus.get(id) {
            Some(message) => {
                message.destroy();
                true
            }
            None => false,
        }
    }
}
