//! Association between external identities and game identities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::types::{ExternalId, GameId};

/// A member's linked game account. Unique on `external_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub external_id: ExternalId,
    pub game_id: GameId,
    pub game_display_name: String,
}

/// Storage backend for linked accounts.
#[async_trait]
pub trait AccountLinkStore: Send + Sync {
    /// Find the account linked to a game identity.
    async fn lookup_by_game_id(&self, game_id: &GameId)
        -> Result<Option<LinkedAccount>, WardenError>;

    /// Find the account linked to an external identity.
    async fn lookup_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<LinkedAccount>, WardenError>;

    /// Insert or replace the link for `external_id`.
    async fn upsert(
        &self,
        external_id: &ExternalId,
        game_id: &GameId,
        display_name: &str,
    ) -> Result<(), WardenError>;
}
