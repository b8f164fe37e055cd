//! Message identifier generation.

use uuid::Uuid;

use crate::message::MessageId;

/// Source of globally unique message identifiers.
///
/// The store never generates keys itself; every message asks the generator
/// of its bus once, at construction.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> MessageId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> MessageId {
        MessageId::from(Uuid::new_v4().to_string())
    }
}
