//! Plugin installation.
//!
//! Installing creates the one [`MessageBus`] of the installation and hands
//! the host three things: a [`FlashContext`] capability for components, the
//! bus itself, and the rendering component.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bus::MessageBus;
use crate::component::FlashComponent;
use crate::error::{Error, Result};
use crate::kind::MessageKind;
use crate::message::{FlashMessage, MessageContent};
use crate::options::OptionsPatch;

/// Default installation names.
pub mod defaults {
    pub const METHOD: &str = "flash";
    pub const STORAGE: &str = "$flashStorage";
    pub const COMPONENT_NAME: &str = "flash-message";
}

/// Environment variable names.
pub mod env_vars {
    pub const METHOD: &str = "FLASH_METHOD";
    pub const STORAGE: &str = "FLASH_STORAGE";
    pub const CREATE_SHORTCUTS: &str = "FLASH_CREATE_SHORTCUTS";
    pub const COMPONENT_NAME: &str = "FLASH_COMPONENT_NAME";
    /// Default message timeout in milliseconds
    pub const DEFAULT_TIMEOUT: &str = "FLASH_DEFAULT_TIMEOUT";
}

/// Installation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlashConfig {
    /// Name of the flash capability exposed to components
    pub method: String,
    /// Name the bus is exposed under
    pub storage: String,
    /// Expose `info`/`error`/`warning`/`success` shortcuts
    pub create_shortcuts: bool,
    /// Tag name of the rendering component
    pub name: String,
    /// Defaults for every message of this installation
    pub message_options: OptionsPatch,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            method: defaults::METHOD.to_string(),
            storage: defaults::STORAGE.to_string(),
            create_shortcuts: true,
            name: defaults::COMPONENT_NAME.to_string(),
            message_options: OptionsPatch::default(),
        }
    }
}

impl FlashConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(method) = lookup(env_vars::METHOD) {
            self.method = method;
        }
        if let Some(storage) = lookup(env_vars::STORAGE) {
            self.storage = storage;
        }
        if let Some(shortcuts) = lookup(env_vars::CREATE_SHORTCUTS).and_then(|s| s.parse().ok()) {
            self.create_shortcuts = shortcuts;
        }
        if let Some(name) = lookup(env_vars::COMPONENT_NAME) {
            self.name = name;
        }
        if let Some(timeout) = lookup(env_vars::DEFAULT_TIMEOUT).and_then(|s| s.parse().ok()) {
            self.message_options.timeout = Some(timeout);
        }
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = storage.into();
        self
    }

    pub fn with_shortcuts(mut self, enabled: bool) -> Self {
        self.create_shortcuts = enabled;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_message_options(mut self, options: OptionsPatch) -> Self {
        self.message_options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("method", &self.method),
            ("storage", &self.storage),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }
        if self.method == self.storage {
            return Err(Error::InvalidConfiguration(format!(
                "method and storage share the name '{}'",
                self.method
            )));
        }
        Ok(())
    }
}

/// Registration surface of the host UI framework.
pub trait PluginHost {
    /// Make the flash capability available to components under `name`.
    fn expose_method(&mut self, name: &str, context: FlashContext) -> anyhow::Result<()>;

    /// Make the bus available under `name`.
    fn expose_storage(&mut self, name: &str, bus: MessageBus) -> anyhow::Result<()>;

    /// Register the rendering component under tag `tag`.
    fn register_component(&mut self, tag: &str, component: FlashComponent) -> anyhow::Result<()>;
}

/// Install the plugin into `host`.
///
/// Creates the installation's bus with `config.message_options` as message
/// defaults and returns the capability that was exposed.
pub fn install<H>(host: &mut H, config: FlashConfig) -> Result<FlashContext>
where
    H: PluginHost + ?Sized,
{
    config.validate()?;

    let bus = MessageBus::with_defaults(config.message_options.clone());
    let context = FlashContext {
        bus: bus.clone(),
        method: config.method.clone(),
        shortcuts: config.create_shortcuts,
    };

    host.expose_method(&config.method, context.clone())?;
    host.expose_storage(&config.storage, bus.clone())?;
    host.register_component(&config.name, FlashComponent::new(config.name.clone(), bus))?;

    tracing::info!(
        method = %config.method,
        storage = %config.storage,
        component = %config.name,
        shortcuts = config.create_shortcuts,
        "Flash plugin installed"
    );
    Ok(context)
}

/// In-memory [`PluginHost`] keyed by name.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    methods: HashMap<String, FlashContext>,
    storages: HashMap<String, MessageBus>,
    components: HashMap<String, FlashComponent>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self, name: &str) -> Option<&FlashContext> {
        self.methods.get(name)
    }

    pub fn storage(&self, name: &str) -> Option<&MessageBus> {
        self.storages.get(name)
    }

    pub fn component(&self, tag: &str) -> Option<&FlashComponent> {
        self.components.get(tag)
    }
}

impl PluginHost for ContextRegistry {
    fn expose_method(&mut self, name: &str, context: FlashContext) -> anyhow::Result<()> {
        if self.methods.contains_key(name) {
            anyhow::bail!("method '{}' is already exposed", name);
        }
        self.methods.insert(name.to_string(), context);
        Ok(())
    }

    fn expose_storage(&mut self, name: &str, bus: MessageBus) -> anyhow::Result<()> {
        if self.storages.contains_key(name) {
            anyhow::bail!("storage '{}' is already exposed", name);
        }
        self.storages.insert(name.to_string(), bus);
        Ok(())
    }

    fn register_component(&mut self, tag: &str, component: FlashComponent) -> anyhow::Result<()> {
        if self.components.contains_key(tag) {
            anyhow::bail!("component '{}' is already registered", tag);
        }
        self.components.insert(tag.to_string(), component);
        Ok(())
    }
}

/// Flash capability handed to UI components.
#[derive(Debug, Clone)]
pub struct FlashContext {
    bus: MessageBus,
    method: String,
    shortcuts: bool,
}

impl FlashContext {
    /// The installation's bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Name the capability was exposed under.
    pub fn method_name(&self) -> &str {
        &self.method
    }

    /// Create a message on the installation's bus.
    pub fn flash(
        &self,
        content: impl Into<MessageContent>,
        kind: impl Into<MessageKind>,
        options: OptionsPatch,
    ) -> Result<FlashMessage> {
        self.bus.flash(content, kind, options)
    }

    /// Kind-specific shortcuts, if the installation enabled them.
    pub fn shortcuts(&self) -> Option<Shortcuts<'_>> {
        self.shortcuts.then_some(Shortcuts { context: self })
    }
}

/// `info`/`error`/`warning`/`success` helpers over [`FlashContext::flash`].
#[derive(Debug, Clone, Copy)]
pub struct Shortcuts<'a> {
    context: &'a FlashContext,
}

impl Shortcuts<'_> {
    pub fn info(&self, content: impl Into<MessageContent>, options: OptionsPatch) -> Result<FlashMessage> {
        self.context.flash(content, MessageKind::Info, options)
    }

    pub fn error(&self, content: impl Into<MessageContent>, options: OptionsPatch) -> Result<FlashMessage> {
        self.context.flash(content, MessageKind::Error, options)
    }

    pub fn warning(&self, content: impl Into<MessageContent>, options: OptionsPatch) -> Result<FlashMessage> {
        self.context.flash(content, MessageKind::Warning, options)
    }

    pub fn success(&self, content: impl Into<MessageContent>, options: OptionsPatch) -> Result<FlashMessage> {
        self.context.flash(content, MessageKind::Success, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlashConfig::default();
        assert_eq!(config.method, "flash");
        assert_eq!(config.storage, "$flashStorage");
        assert!(config.create_shortcuts);
        assert_eq!(config.name, "flash-message");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config = FlashConfig::from_json(
            r#"{"method": "notify", "createShortcuts": false, "messageOptions": {"timeout": 4000}}"#,
        )
        .unwrap();

        assert_eq!(config.method, "notify");
        assert_eq!(config.storage, "$flashStorage");
        assert!(!config.create_shortcuts);
        assert_eq!(config.message_options.timeout, Some(4000));
    }

    #[test]
    fn test_config_from_invalid_json() {
        let result = FlashConfig::from_json("{not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_config_overrides() {
        let config = FlashConfig::default().with_overrides(|key| match key {
            env_vars::METHOD => Some("toast".to_string()),
            env_vars::CREATE_SHORTCUTS => Some("false".to_string()),
            env_vars::DEFAULT_TIMEOUT => Some("2500".to_string()),
            env_vars::COMPONENT_NAME => Some("not-a-bool-but-fine".to_string()),
            _ => None,
        });

        assert_eq!(config.method, "toast");
        assert!(!config.create_shortcuts);
        assert_eq!(config.name, "not-a-bool-but-fine");
        assert_eq!(config.message_options.timeout, Some(2500));
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let config = FlashConfig::default().with_overrides(|key| match key {
            env_vars::CREATE_SHORTCUTS => Some("maybe".to_string()),
            _ => None,
        });
        assert!(config.create_shortcuts);
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(FlashConfig::default().with_method("").validate().is_err());
        assert!(FlashConfig::default().with_name("  ").validate().is_err());
        assert!(FlashConfig::default()
            .with_method("flash")
            .with_storage("flash")
            .validate()
            .is_err());
    }

    #[test]
    fn test_install_registers_everything() {
        let mut registry = ContextRegistry::new();
        let context = install(&mut registry, FlashConfig::default()).unwrap();

        assert_eq!(context.method_name(), "flash");
        let exposed = registry.method("flash").unwrap();
        let storage = registry.storage("$flashStorage").unwrap();
        let component = registry.component("flash-message").unwrap();

        assert!(exposed.bus().ptr_eq(context.bus()));
        assert!(storage.ptr_eq(context.bus()));
        assert!(component.bus().ptr_eq(context.bus()));
        assert_eq!(component.name(), "flash-message");
    }

    #[test]
    fn test_install_twice_into_same_host_fails() {
        let mut registry = ContextRegistry::new();
        install(&mut registry, FlashConfig::default()).unwrap();

        let result = install(&mut registry, FlashConfig::default());
        assert!(matches!(result, Err(Error::Host(_))));
    }

    #[test]
    fn test_install_rejects_invalid_config() {
        let mut registry = ContextRegistry::new();
        let result = install(&mut registry, FlashConfig::default().with_storage(""));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert!(registry.method("flash").is_none());
    }

    #[test]
    fn test_shortcuts_fix_kind() {
        let mut registry = ContextRegistry::new();
        let context = install(&mut registry, FlashConfig::default()).unwrap();
        let shortcuts = context.shortcuts().unwrap();

        assert_eq!(shortcuts.info("a", OptionsPatch::new()).unwrap().kind(), &MessageKind::Info);
        assert_eq!(shortcuts.error("b", OptionsPatch::new()).unwrap().kind(), &MessageKind::Error);
        assert_eq!(shortcuts.warning("c", OptionsPatch::new()).unwrap().kind(), &MessageKind::Warning);
        assert_eq!(shortcuts.success("d", OptionsPatch::new()).unwrap().kind(), &MessageKind::Success);
        assert_eq!(context.bus().len(), 4);
    }

    #[test]
    fn test_shortcuts_disabled() {
        let mut registry = ContextRegistry::new();
        let context = install(&mut registry, FlashConfig::default().with_shortcuts(false)).unwrap();
        assert!(context.shortcuts().is_none());
    }

    #[test]
    fn test_global_message_options_apply() {
        let mut registry = ContextRegistry::new();
        let config = FlashConfig::default()
            .with_message_options(OptionsPatch::new().important(true).pause_on_interact(true));
        let context = install(&mut registry, config).unwrap();

        let message = context.flash("x", "info", OptionsPatch::new().important(false)).unwrap();
        let options = message.options();
        assert!(!options.important);
        assert!(options.pause_on_interact);
    }
}
