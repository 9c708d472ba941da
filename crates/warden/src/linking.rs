//! Linking guild members to their Roblox accounts.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::account_link::{AccountLinkStore, LinkedAccount};
use crate::error::WardenError;
use crate::roblox::{GroupMembership, RobloxClient};
use crate::types::ExternalId;

/// Result of a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub account: LinkedAccount,
    /// Membership in the configured group. `None` when no group is
    /// configured, the user is not a member, or the lookup failed.
    pub group: Option<GroupMembership>,
}

impl LinkReport {
    /// Human-readable confirmation for the member.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Linked to Roblox account **{}** (ID {}).",
            self.account.game_display_name, self.account.game_id
        );
        if let Some(group) = &self.group {
            text.push_str(&format!(
                " Group **{}**: role **{}**.",
                group.group_name, group.role_name
            ));
        }
        text
    }
}

/// Resolves usernames and records links.
pub struct AccountLinker {
    roblox: RobloxClient,
    links: Arc<dyn AccountLinkStore>,
    group_id: Option<u64>,
}

impl AccountLinker {
    pub fn new(roblox: RobloxClient, links: Arc<dyn AccountLinkStore>, group_id: Option<u64>) -> Self {
        Self {
            roblox,
            links,
            group_id,
        }
    }

    /// Link `external_id` to the Roblox account named `username`, replacing
    /// any previous link for that member.
    #[instrument(skip_all, fields(external_id = %external_id, username = %username))]
    pub async fn link(&self, external_id: &ExternalId, username: &str) -> Result<LinkReport, WardenError> {
        let user = self
            .roblox
            .lookup_user(username)
            .await?
            .ok_or_else(|| WardenError::NotFound {
                what: "roblox user",
                name: username.to_string(),
            })?;

        self.links.upsert(external_id, &user.id, &user.name).await?;
        info!(game_id = %user.id, name = %user.name, "account linked");

        let group = match self.group_id {
            Some(group_id) => match self.roblox.group_membership(&user.id, group_id).await {
                Ok(membership) => membership,
                Err(e) => {
                    warn!(group_id, error = %e, "group role lookup failed");
                    None
                }
            },
            None => None,
        };

        Ok(LinkReport {
            account: LinkedAccount {
                external_id: external_id.clone(),
                game_id: user.id,
                game_display_name: user.name,
            },
            group,
        })
    }

    /// The account currently linked to `external_id`.
    pub async fn linked_account(&self, external_id: &ExternalId) -> Result<LinkedAccount, WardenError> {
        self.links
            .lookup_by_external_id(external_id)
            .await?
            .ok_or_else(|| WardenError::NotFound {
                what: "linked account",
                name: external_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GameId;

    #[test]
    fn summary_includes_group_when_present() {
        let mut report = LinkReport {
            account: LinkedAccount {
                external_id: ExternalId::new("10"),
                game_id: GameId::new("77"),
                game_display_name: "Builderman".into(),
            },
            group: None,
        };
        assert_eq!(report.summary(), "Linked to Roblox account **Builderman** (ID 77).");

        report.group = Some(GroupMembership {
            group_name: "State Police".into(),
            role_name: "Trooper".into(),
            rank: 5,
        });
        assert!(report.summary().ends_with("Group **State Police**: role **Trooper**."));
    }
}
