//! Per-message options and their resolution.
//!
//! Options are resolved once at construction: built-in defaults, then the
//! installation-wide defaults, then the per-message overrides.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::FlashMessage;

/// Lifecycle callback attached to a message.
pub type Callback = Arc<dyn Fn(&FlashMessage) + Send + Sync>;

/// Fully resolved options of one message.
#[derive(Clone)]
pub struct MessageOptions {
    /// Register into the store and arm the timer on construction
    pub auto_emit: bool,
    /// Advisory flag for renderers
    pub important: bool,
    /// Disarm the timer while the user interacts with the message
    pub pause_on_interact: bool,
    /// Self-destruct delay in milliseconds; `<= 0` never expires
    pub timeout: i64,
    /// Runs right before the message leaves the store
    pub before_destroy: Option<Callback>,
    /// Runs when interaction starts
    pub on_start_interact: Option<Callback>,
    /// Runs when interaction completes
    pub on_complete_interact: Option<Callback>,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            auto_emit: true,
            important: false,
            pause_on_interact: false,
            timeout: 0,
            before_destroy: None,
            on_start_interact: None,
            on_complete_interact: None,
        }
    }
}

impl std::fmt::Debug for MessageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageOptions")
            .field("auto_emit", &self.auto_emit)
            .field("important", &self.important)
            .field("pause_on_interact", &self.pause_on_interact)
            .field("timeout", &self.timeout)
            .field("before_destroy", &self.before_destroy.is_some())
            .field("on_start_interact", &self.on_start_interact.is_some())
            .field("on_complete_interact", &self.on_complete_interact.is_some())
            .finish()
    }
}

impl MessageOptions {
    /// Resolve options: defaults, then `global`, then `local`.
    pub fn resolve(global: &OptionsPatch, local: &OptionsPatch) -> Self {
        let mut options = Self::default();
        options.apply(global);
        options.apply(local);
        options
    }

    /// Overlay every field that is set in `patch`.
    pub fn apply(&mut self, patch: &OptionsPatch) {
        if let Some(auto_emit) = patch.auto_emit {
            self.auto_emit = auto_emit;
        }
        if let Some(important) = patch.important {
            self.important = important;
        }
        if let Some(pause) = patch.pause_on_interact {
            self.pause_on_interact = pause;
        }
        if let Some(timeout) = patch.timeout {
            self.timeout = timeout;
        }
        if patch.before_destroy.is_some() {
            self.before_destroy = patch.before_destroy.clone();
        }
        if patch.on_start_interact.is_some() {
            self.on_start_interact = patch.on_start_interact.clone();
        }
        if patch.on_complete_interact.is_some() {
            self.on_complete_interact = patch.on_complete_interact.clone();
        }
    }

    /// Delay after which the message destroys itself, if it expires at all.
    pub fn self_destruct_after(&self) -> Option<Duration> {
        if self.timeout > 0 {
            Some(Duration::from_millis(self.timeout as u64))
        } else {
            None
        }
    }
}

/// Partial options, used both for installation-wide defaults and
/// per-message overrides.
///
/// Only the plain fields are (de)serialized; callbacks are attached with the
/// builder methods.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_emit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_on_interact: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(skip)]
    pub before_destroy: Option<Callback>,
    #[serde(skip)]
    pub on_start_interact: Option<Callback>,
    #[serde(skip)]
    pub on_complete_interact: Option<Callback>,
}

impl std::fmt::Debug for OptionsPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsPatch")
            .field("auto_emit", &self.auto_emit)
            .field("important", &self.important)
            .field("pause_on_interact", &self.pause_on_interact)
            .field("timeout", &self.timeout)
            .field("before_destroy", &self.before_destroy.is_some())
            .field("on_start_interact", &self.on_start_interact.is_some())
            .field("on_complete_interact", &self.on_complete_interact.is_some())
            .finish()
    }
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_emit(mut self, auto_emit: bool) -> Self {
        self.auto_emit = Some(auto_emit);
        self
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = Some(important);
        self
    }

    pub fn pause_on_interact(mut self, pause: bool) -> Self {
        self.pause_on_interact = Some(pause);
        self
    }

    /// Self-destruct delay in milliseconds.
    pub fn timeout(mut self, millis: i64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub fn before_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlashMessage) + Send + Sync + 'static,
    {
        self.before_destroy = Some(Arc::new(f));
        self
    }

    pub fn on_start_interact<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlashMessage) + Send + Sync + 'static,
    {
        self.on_start_interact = Some(Arc::new(f));
        self
    }

    pub fn on_complete_interact<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlashMessage) + Send + Sync + 'static,
    {
        self.on_complete_interact = Some(Arc::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let options = MessageOptions::default();
        assert!(options.auto_emit);
        assert!(!options.important);
        assert!(!options.pause_on_interact);
        assert_eq!(options.timeout, 0);
        assert!(options.before_destroy.is_none());
        assert!(options.self_destruct_after().is_none());
    }

    #[test]
    fn test_resolution_order() {
        let global = OptionsPatch::new().timeout(5000).important(true);
        let local = OptionsPatch::new().timeout(1000);

        let options = MessageOptions::resolve(&global, &local);
        assert_eq!(options.timeout, 1000);
        assert!(options.important);
        assert!(options.auto_emit);
    }

    #[test]
    fn test_callbacks_survive_unset_overrides() {
        let global = OptionsPatch::new().before_destroy(|_| {});
        let local = OptionsPatch::new().pause_on_interact(true);

        let options = MessageOptions::resolve(&global, &local);
        assert!(options.before_destroy.is_some());
        assert!(options.pause_on_interact);
    }

    #[test]
    fn test_non_positive_timeout_never_expires() {
        let mut options = MessageOptions::default();
        options.timeout = -250;
        assert!(options.self_destruct_after().is_none());

        options.timeout = 1500;
        assert_eq!(
            options.self_destruct_after(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_patch_from_json() {
        let patch: OptionsPatch =
            serde_json::from_str(r#"{"pauseOnInteract": true, "timeout": 3000}"#).unwrap();
        assert_eq!(patch.pause_on_interact, Some(true));
        assert_eq!(patch.timeout, Some(3000));
        assert_eq!(patch.auto_emit, None);
    }
}
