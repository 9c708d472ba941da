use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination for a notification (a Discord channel id).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Channel references configured as `0` mean "disabled".
    pub fn from_config(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
