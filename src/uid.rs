use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a referenced document object.
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UID(Uuid);

impl Default for UID {
    fn default() -> Self {
        Self::new()
    }
}

impl UID {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero id used by hosts for "no reference".
    pub fn blank() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_nil()
    }
}

impl std::fmt::Display for UID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
