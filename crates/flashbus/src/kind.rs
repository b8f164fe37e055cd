//! Message kind.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category tag of a flash message.
///
/// The four conventional kinds get their own variants; anything else is kept
/// verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MessageKind {
    /// Neutral information
    #[default]
    Info,
    /// Something failed
    Error,
    /// Something needs attention
    Warning,
    /// An operation completed
    Success,
    /// Free-form tag
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Custom(tag) => tag,
        }
    }

    /// Conventional tags match exactly; any other spelling is kept as `Custom`.
    pub fn from_string(s: &str) -> Self {
        match s {
            "info" => Self::Info,
            "error" => Self::Error,
            "warning" => Self::Warning,
            "success" => Self::Success,
            _ => Self::Custom(s.to_string()),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for MessageKind {
    fn from(s: String) -> Self {
        Self::from_string(&s)
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_string(&s))
    }
}
