//! Team policy enforcement for newly joined players.
//!
//! Each evaluation walks a fixed chain of lookups and stops silently at the
//! first missing piece: unlinked players, departed guild members and players
//! no longer on the roster are expected steady-state conditions.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::account_link::AccountLinkStore;
use crate::game_server::GameServerClient;
use crate::identity::MemberDirectory;
use crate::metrics::WardenMetrics;
use crate::notify::Notifier;
use crate::policy::{PolicyRule, TeamPolicy};
use crate::types::GameId;

/// Result of one evaluation that got as far as knowing the player's team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementOutcome {
    pub actor: String,
    pub current_team: String,
    pub violated: bool,
    /// The first rule governing `current_team`, if any.
    pub matched_rule: Option<PolicyRule>,
}

/// Evaluates players' teams against the role policy and corrects violations.
pub struct TeamEnforcementEngine {
    links: Arc<dyn AccountLinkStore>,
    directory: Arc<dyn MemberDirectory>,
    game: Arc<dyn GameServerClient>,
    notifier: Notifier,
    policy: TeamPolicy,
    fallback_team: String,
    metrics: Arc<WardenMetrics>,
}

impl TeamEnforcementEngine {
    pub fn new(
        links: Arc<dyn AccountLinkStore>,
        directory: Arc<dyn MemberDirectory>,
        game: Arc<dyn GameServerClient>,
        notifier: Notifier,
        policy: TeamPolicy,
        fallback_team: impl Into<String>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            links,
            directory,
            game,
            notifier,
            policy,
            fallback_team: fallback_team.into(),
            metrics,
        }
    }

    pub fn policy(&self) -> &TeamPolicy {
        &self.policy
    }

    /// Check a newly joined player and correct them if they hold a team
    /// their linked member is not entitled to.
    ///
    /// Returns `None` when evaluation short-circuited before the player's
    /// current team was known.
    #[instrument(skip_all, fields(actor = %actor_name, game_id = %game_id))]
    pub async fn enforce(&self, actor_name: &str, game_id: &GameId) -> Option<EnforcementOutcome> {
        let account = match self.links.lookup_by_game_id(game_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!("player has no linked account, not policed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "linked account lookup failed, skipping enforcement");
                return None;
            }
        };

        let member = match self.directory.resolve_member(&account.external_id).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                debug!(external_id = %account.external_id, "linked member not in guild");
                return None;
            }
            Err(e) => {
                warn!(external_id = %account.external_id, error = %e, "member resolution failed");
                return None;
            }
        };

        let roster = match self.game.fetch_roster().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(error = %e, "roster fetch failed, skipping enforcement");
                return None;
            }
        };
        let current_team = roster
            .into_iter()
            .find(|entry| &entry.id == game_id)
            .and_then(|entry| entry.team)?;

        let Some(rule) = self.policy.rule_for_team(&current_team) else {
            return Some(EnforcementOutcome {
                actor: actor_name.to_string(),
                current_team,
                violated: false,
                matched_rule: None,
            });
        };

        let violated = !member.holds(&rule.required_credential);
        if violated {
            self.metrics.violations.inc();
            info!(
                team = %current_team,
                required = %rule.required_credential,
                "player on governed team without required role"
            );
            let alert = format!(
                "⚠️ **{}** (in game: **{}**) attempted to join team **{}** without possessing the required Discord role **{}**.",
                member.display_name, actor_name, current_team, rule.required_credential
            );
            self.notifier.moderation(&alert).await;

            let command = format!("team {} {}", actor_name, self.fallback_team);
            if let Err(e) = self.game.run_command(&command).await {
                self.metrics.command_failures.inc();
                warn!(command = %command, error = %e, "corrective command failed");
            }
        }

        Some(EnforcementOutcome {
            actor: actor_name.to_string(),
            current_team,
            violated,
            matched_rule: Some(rule.clone()),
        })
    }
}
