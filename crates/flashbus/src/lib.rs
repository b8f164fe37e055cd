//! Flash messages for reactive UIs.
//!
//! Flash messages are short-lived notifications that dismiss themselves
//! after a timeout, optionally pause while the user interacts with them,
//! and live in a shared store that rendering reads from.
//!
//! ## Overview
//!
//! - **Messages**: content, kind tag, resolved options and a self-destruct timer
//! - **Bus**: the installation-wide store of live messages, with change events
//! - **Plugin**: installation config, host registration and the `flash` capability
//! - **Component**: view-model of the rendering component
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashbus::{install, ContextRegistry, FlashConfig, OptionsPatch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut host = ContextRegistry::new();
//!     let flash = install(&mut host, FlashConfig::default())?;
//!
//!     // Dismissed automatically after one second
//!     let message = flash.flash("Saved", "success", OptionsPatch::new().timeout(1000))?;
//!     assert!(flash.bus().contains(message.id()));
//!
//!     if let Some(shortcuts) = flash.shortcuts() {
//!         shortcuts.error("Upload failed", OptionsPatch::new().pause_on_interact(true))?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod component;
pub mod error;
pub mod id;
pub mod kind;
pub mod message;
pub mod options;
pub mod plugin;
pub mod timer;

pub use bus::{MessageBus, MessageBusBuilder, StoreEvent, StoreReceiver};
pub use component::{FlashComponent, RenderedMessage};
pub use error::{Error, Result};
pub use id::{IdGenerator, UuidGenerator};
pub use kind::MessageKind;
pub use message::{FlashMessage, MessageContent, MessageId, MessageState};
pub use options::{Callback, MessageOptions, OptionsPatch};
pub use plugin::{install, ContextRegistry, FlashConfig, FlashContext, PluginHost, Shortcuts};
pub use timer::{Scheduler, TimerHandle, TokioScheduler};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
