//! Actor identity attributed to stock movements.

use serde::{Deserialize, Serialize};

/// Sentinel actor recorded when no authenticated principal is available.
const SYSTEM_ACTOR: &str = "system";

/// Identity of whoever caused a movement.
///
/// The surrounding auth layer resolves the caller and passes it in
/// explicitly; the core never reads ambient authentication state. Movements
/// are always attributed: absent an actor, [`ActorId::system`] is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The fallback actor for unauthenticated callers.
    pub fn system() -> Self {
        Self(SYSTEM_ACTOR.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_ACTOR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ActorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
