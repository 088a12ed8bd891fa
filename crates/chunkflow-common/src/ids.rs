//! Typed ID wrappers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a sample buffer instance.
///
/// Writer tokens carry the id of the buffer that issued them, so a token can
/// never be replayed against a different buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(Uuid);

impl BufferId {
    /// Generate a new random buffer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for BufferId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<BufferId> for Uuid {
    fn from(id: BufferId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_ids_are_unique() {
        assert_ne!(BufferId::new(), BufferId::new());
    }

    #[test]
    fn test_buffer_id_uuid_round_trip() {
        let uuid = Uuid::new_v4();
        let id = BufferId::from(uuid);
        assert_eq!(Uuid::from(id), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
