//! Notification sinks and per-category channel routing.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::WardenError;
use crate::log_entry::LogKind;
use crate::types::ChannelId;

/// Delivers text to a channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<(), WardenError>;
}

/// Optional destination per notification category. `None` disables the category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelRoutes {
    pub join: Option<ChannelId>,
    pub leave: Option<ChannelId>,
    pub kill: Option<ChannelId>,
    pub moderation: Option<ChannelId>,
}

impl ChannelRoutes {
    pub fn for_kind(&self, kind: LogKind) -> Option<ChannelId> {
        match kind {
            LogKind::Join => self.join,
            LogKind::Leave => self.leave,
            LogKind::Kill => self.kill,
        }
    }
}

/// Best-effort notifier: routes by category and never propagates failures.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    routes: ChannelRoutes,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, routes: ChannelRoutes) -> Self {
        Self { sink, routes }
    }

    pub fn routes(&self) -> &ChannelRoutes {
        &self.routes
    }

    /// Send a log event notification. Returns whether a send was attempted.
    pub async fn log_event(&self, kind: LogKind, text: &str) -> bool {
        self.deliver(self.routes.for_kind(kind), text).await
    }

    /// Send a moderation alert. Returns whether a send was attempted.
    pub async fn moderation(&self, text: &str) -> bool {
        self.deliver(self.routes.moderation, text).await
    }

    async fn deliver(&self, channel: Option<ChannelId>, text: &str) -> bool {
        let Some(channel) = channel else {
            return false;
        };
        if let Err(e) = self.sink.send(channel, text).await {
            tracing::warn!(channel = %channel, error = %e, "notification delivery failed");
        }
        true
    }
}
