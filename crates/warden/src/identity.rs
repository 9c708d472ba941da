//! Member resolution against the external identity service.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::WardenError;
use crate::types::ExternalId;

/// An active member of the operating guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub external_id: ExternalId,
    pub display_name: String,
    /// Role names held by the member.
    pub credentials: HashSet<String>,
}

impl Member {
    /// Exact, case-sensitive credential check.
    pub fn holds(&self, credential: &str) -> bool {
        self.credentials.contains(credential)
    }
}

/// Resolves external identities to guild members.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// `Ok(None)` when the identity is not an active member of the guild.
    async fn resolve_member(&self, external_id: &ExternalId)
        -> Result<Option<Member>, WardenError>;
}
