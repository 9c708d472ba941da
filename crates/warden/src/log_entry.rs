//! Game server log entries and the streams they arrive on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GameId;

/// What happened in a single log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Join,
    Leave,
    Kill,
}

/// The two independently polled, independently deduplicated log streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    JoinLeave,
    Kill,
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinLeave => write!(f, "join_leave"),
            Self::Kill => write!(f, "kill"),
        }
    }
}

/// One immutable entry fetched from a log stream.
///
/// For kills the actor is the killer and the victim fields are populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Epoch seconds. Missing timestamps are carried as `0`.
    pub timestamp: i64,
    pub kind: LogKind,
    pub actor_id: GameId,
    pub actor_name: String,
    pub victim_id: Option<GameId>,
    pub victim_name: Option<String>,
}

impl LogEntry {
    pub fn join(timestamp: i64, actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Self::presence(LogKind::Join, timestamp, actor_id, actor_name)
    }

    pub fn leave(timestamp: i64, actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        Self::presence(LogKind::Leave, timestamp, actor_id, actor_name)
    }

    pub fn kill(
        timestamp: i64,
        killer_name: impl Into<String>,
        victim_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: LogKind::Kill,
            actor_id: GameId::new(""),
            actor_name: killer_name.into(),
            victim_id: None,
            victim_name: Some(victim_name.into()),
        }
    }

    fn presence(
        kind: LogKind,
        timestamp: i64,
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            actor_id: GameId::new(actor_id),
            actor_name: actor_name.into(),
            victim_id: None,
            victim_name: None,
        }
    }

    /// Timestamp rendered as ISO-8601 for notification text.
    pub fn occurred_at(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.timestamp.to_string())
    }

    /// Human readable notification text for this entry.
    pub fn notification_text(&self) -> String {
        match self.kind {
            LogKind::Join => format!(
                "**{}** (ID {}) joined the server at {}.",
                self.actor_name,
                self.actor_id,
                self.occurred_at()
            ),
            LogKind::Leave => format!(
                "**{}** (ID {}) left the server at {}.",
                self.actor_name,
                self.actor_id,
                self.occurred_at()
            ),
            LogKind::Kill => format!(
                "**{}** eliminated **{}** at {}.",
                self.actor_name,
                self.victim_name.as_deref().unwrap_or("unknown"),
                self.occurred_at()
            ),
        }
    }
}
