use crate::error::WardenError;
use crate::notify::ChannelRoutes;
use crate::policy::TeamPolicy;
use std::time::Duration;

/// Default ER:LC API endpoint.
pub const DEFAULT_ERLC_BASE_URL: &str = "https://api.policeroleplay.community";
/// Default Discord REST endpoint.
pub const DEFAULT_DISCORD_BASE_URL: &str = "https://discord.com/api/v10";
/// Default Roblox users endpoint.
pub const DEFAULT_ROBLOX_USERS_URL: &str = "https://users.roblox.com";
/// Default Roblox groups endpoint.
pub const DEFAULT_ROBLOX_GROUPS_URL: &str = "https://groups.roblox.com";

/// Configuration for the relay and enforcement service.
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Discord bot token. Required.
    pub discord_token: String,
    /// Guild whose members and roles are consulted. Required.
    pub guild_id: u64,
    /// ER:LC server identifier. Required.
    pub erlc_server_id: String,
    /// ER:LC server key sent as `Server-Key`. Required.
    pub erlc_server_key: String,
    /// Roblox group used when reporting a member's rank on link. 0/None = disabled.
    pub roblox_group_id: Option<u64>,
    /// Ordered role -> team policy. Default: empty (nothing is policed).
    pub policy: TeamPolicy,
    /// Team violators are moved to. Default: "civilian".
    pub fallback_team: String,
    /// Notification channels per category. Default: all disabled.
    pub channels: ChannelRoutes,
    /// SQLite database file. Default: "erlc_bot.db".
    pub database_path: String,
    /// Reporting API listen address. Default: "0.0.0.0:8000".
    pub listen_addr: String,
    /// Period between poll cycles. Default: 30s.
    pub poll_interval: Duration,
    /// Timeout applied to every outbound HTTP call. Default: 10s.
    pub request_timeout: Duration,
    /// Delay before the single retry of a transiently failed command. Default: 1s.
    pub command_retry_delay: Duration,
    /// How long shutdown waits for an in-flight poll cycle. Default: 10s.
    pub shutdown_grace: Duration,
    pub erlc_base_url: String,
    pub discord_base_url: String,
    pub roblox_users_url: String,
    pub roblox_groups_url: String,
}

impl WardenConfig {
    /// Validate configuration values.
    ///
    /// Missing credentials are fatal: the service must not start without them.
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.discord_token.trim().is_empty() {
            return Err(WardenError::InvalidConfig {
                reason: "discord_token must be set (DISCORD_TOKEN)".to_string(),
            });
        }
        if self.guild_id == 0 {
            return Err(WardenError::InvalidConfig {
                reason: "guild_id must be set (DISCORD_GUILD_ID)".to_string(),
            });
        }
        if self.erlc_server_id.trim().is_empty() {
            return Err(WardenError::InvalidConfig {
                reason: "erlc_server_id must be set (ERLC_SERVER_ID)".to_string(),
            });
        }
        if self.erlc_server_key.trim().is_empty() {
            return Err(WardenError::InvalidConfig {
                reason: "erlc_server_key must be set (ERLC_SERVER_KEY)".to_string(),
            });
        }
        if self.fallback_team.trim().is_empty() {
            return Err(WardenError::InvalidConfig {
                reason: "fallback_team must not be empty".to_string(),
            });
        }
        if let Some(rule) = self.policy.rule_for_team(&self.fallback_team) {
            return Err(WardenError::InvalidConfig {
                reason: format!(
                    "fallback_team '{}' is itself governed by role '{}'",
                    self.fallback_team, rule.required_credential
                ),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(WardenError::InvalidConfig {
                reason: "poll_interval must be > 0".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(WardenError::InvalidConfig {
                reason: "request_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: 0,
            erlc_server_id: String::new(),
            erlc_server_key: String::new(),
            roblox_group_id: None,
            policy: TeamPolicy::default(),
            fallback_team: "civilian".to_string(),
            channels: ChannelRoutes::default(),
            database_path: "erlc_bot.db".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            command_retry_delay: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(10),
            erlc_base_url: DEFAULT_ERLC_BASE_URL.to_string(),
            discord_base_url: DEFAULT_DISCORD_BASE_URL.to_string(),
            roblox_users_url: DEFAULT_ROBLOX_USERS_URL.to_string(),
            roblox_groups_url: DEFAULT_ROBLOX_GROUPS_URL.to_string(),
        }
    }
}
