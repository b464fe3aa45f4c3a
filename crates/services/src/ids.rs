use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a logged-in user. It keys the per-user room, the
/// `client:<user-id>` channel, and the persisted session row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSessionId(String);

impl UserSessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserSessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserSessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
