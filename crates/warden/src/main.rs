//! Warden - ER:LC log relay and team enforcement service.
//!
//! Polls the private server's join/leave and kill logs, relays new entries to
//! Discord channels, moves players off teams their Discord roles do not allow,
//! and exposes a small reporting API.
//!
//! ## Required Environment Variables
//!
//! ```bash
//! DISCORD_TOKEN=... \
//! DISCORD_GUILD_ID=123456789 \
//! ERLC_SERVER_ID=... \
//! ERLC_SERVER_KEY=... \
//! ROLE_TEAM_MAP='{"Police Officer": "Police", "Sheriff Deputy": "Sheriff"}' \
//! cargo run --package warden
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warden::api::{create_router, AppState};
use warden::config::{
    WardenConfig, DEFAULT_DISCORD_BASE_URL, DEFAULT_ERLC_BASE_URL, DEFAULT_ROBLOX_GROUPS_URL,
    DEFAULT_ROBLOX_USERS_URL,
};
use warden::discord::DiscordRest;
use warden::dispatcher::EventDispatcher;
use warden::enforcement::TeamEnforcementEngine;
use warden::game_server::ErlcClient;
use warden::linking::AccountLinker;
use warden::metrics::WardenMetrics;
use warden::notify::{ChannelRoutes, Notifier};
use warden::policy::TeamPolicy;
use warden::poller::{LogPoller, SessionGate};
use warden::roblox::RobloxClient;
use warden::storage::{sql, SqlAccountLinkStore, SqlShiftLedger};
use warden::types::ChannelId;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "ER:LC log relay and Discord role team enforcement")]
struct Args {
    /// Discord bot token (required).
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// Discord guild whose roles are enforced (required).
    #[arg(long, env = "DISCORD_GUILD_ID")]
    discord_guild_id: u64,

    /// ER:LC private server id (required).
    #[arg(long, env = "ERLC_SERVER_ID")]
    erlc_server_id: String,

    /// ER:LC private server key (required).
    #[arg(long, env = "ERLC_SERVER_KEY", hide_env_values = true)]
    erlc_server_key: String,

    /// JSON object mapping Discord role name to the team it authorizes.
    #[arg(long, env = "ROLE_TEAM_MAP")]
    role_team_map: Option<String>,

    /// Team violators are moved to.
    #[arg(long, env = "FALLBACK_TEAM", default_value = "civilian")]
    fallback_team: String,

    /// Roblox group reported when a member links their account (0 = disabled).
    #[arg(long, env = "ROBLOX_GROUP_ID", default_value_t = 0)]
    roblox_group_id: u64,

    /// Channel for join notifications (0 = disabled).
    #[arg(long, env = "JOIN_LOG_CHANNEL_ID", default_value_t = 0)]
    join_log_channel_id: u64,

    /// Channel for leave notifications (0 = disabled).
    #[arg(long, env = "LEAVE_LOG_CHANNEL_ID", default_value_t = 0)]
    leave_log_channel_id: u64,

    /// Channel for kill notifications (0 = disabled).
    #[arg(long, env = "KILL_LOG_CHANNEL_ID", default_value_t = 0)]
    kill_log_channel_id: u64,

    /// Channel for moderation alerts (0 = disabled).
    #[arg(long, env = "MOD_LOG_CHANNEL_ID", default_value_t = 0)]
    mod_log_channel_id: u64,

    /// SQLite database file.
    #[arg(long, env = "ERLC_BOT_DB", default_value = "erlc_bot.db")]
    database: String,

    /// HTTP API listen address.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    listen_addr: String,

    /// Seconds between log poll cycles.
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 30)]
    poll_interval_secs: u64,

    /// Timeout in seconds for every outbound HTTP request.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,

    /// Seconds shutdown waits for an in-flight poll cycle.
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    shutdown_grace_secs: u64,

    #[arg(long, env = "ERLC_BASE_URL", default_value = DEFAULT_ERLC_BASE_URL)]
    erlc_base_url: String,

    #[arg(long, env = "DISCORD_BASE_URL", default_value = DEFAULT_DISCORD_BASE_URL)]
    discord_base_url: String,

    #[arg(long, env = "ROBLOX_USERS_URL", default_value = DEFAULT_ROBLOX_USERS_URL)]
    roblox_users_url: String,

    #[arg(long, env = "ROBLOX_GROUPS_URL", default_value = DEFAULT_ROBLOX_GROUPS_URL)]
    roblox_groups_url: String,
}

impl Args {
    fn into_config(self) -> Result<WardenConfig> {
        let policy = match self.role_team_map.as_deref() {
            Some(raw) if !raw.trim().is_empty() => TeamPolicy::from_json(raw)?,
            _ => TeamPolicy::default(),
        };
        Ok(WardenConfig {
            discord_token: self.discord_token,
            guild_id: self.discord_guild_id,
            erlc_server_id: self.erlc_server_id,
            erlc_server_key: self.erlc_server_key,
            roblox_group_id: (self.roblox_group_id != 0).then_some(self.roblox_group_id),
            policy,
            fallback_team: self.fallback_team,
            channels: ChannelRoutes {
                join: ChannelId::from_config(self.join_log_channel_id),
                leave: ChannelId::from_config(self.leave_log_channel_id),
                kill: ChannelId::from_config(self.kill_log_channel_id),
                moderation: ChannelId::from_config(self.mod_log_channel_id),
            },
            database_path: self.database,
            listen_addr: self.listen_addr,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            erlc_base_url: self.erlc_base_url,
            discord_base_url: self.discord_base_url,
            roblox_users_url: self.roblox_users_url,
            roblox_groups_url: self.roblox_groups_url,
            ..Default::default()
        })
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
        }
        _ = cancel.cancelled() => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("warden=info".parse()?))
        .init();

    let config = Args::parse().into_config()?;
    config.validate()?;
    tracing::info!(
        rules = config.policy.rules().len(),
        fallback_team = %config.fallback_team,
        poll_interval = ?config.poll_interval,
        "warden starting"
    );

    let pool = sql::connect(&config.database_path).await?;
    sql::migrate(&pool).await?;
    let links = Arc::new(SqlAccountLinkStore::new(pool.clone()));
    let shifts = Arc::new(SqlShiftLedger::new(pool));

    let http = warden::http::build_client(config.request_timeout)?;
    let game = Arc::new(ErlcClient::new(
        http.clone(),
        &config.erlc_base_url,
        &config.erlc_server_id,
        &config.erlc_server_key,
        config.command_retry_delay,
    )?);
    let discord = Arc::new(DiscordRest::new(
        http.clone(),
        &config.discord_base_url,
        &config.discord_token,
        config.guild_id,
    )?);
    let roblox = RobloxClient::new(http, &config.roblox_users_url, &config.roblox_groups_url);

    let registry = Registry::new();
    let metrics = Arc::new(WardenMetrics::new(&registry)?);
    let notifier = Notifier::new(discord.clone(), config.channels);

    let enforcement = if config.policy.is_empty() {
        tracing::warn!("ROLE_TEAM_MAP is empty, team enforcement disabled");
        None
    } else {
        Some(Arc::new(TeamEnforcementEngine::new(
            links.clone(),
            discord.clone(),
            game.clone(),
            notifier.clone(),
            config.policy.clone(),
            config.fallback_team.clone(),
            metrics.clone(),
        )))
    };
    let dispatcher = EventDispatcher::new(notifier, enforcement, metrics.clone());

    let gate = SessionGate::new();
    let cancel = CancellationToken::new();
    let poller = LogPoller::new(
        game,
        dispatcher,
        config.poll_interval,
        gate.clone(),
        cancel.clone(),
        metrics,
    )
    .spawn();

    let bot = match discord.verify_session().await {
        Ok(bot) => bot,
        Err(e) => {
            poller.shutdown(config.shutdown_grace).await;
            return Err(e).context("discord session check failed");
        }
    };
    tracing::info!(bot = %bot.username, guild = config.guild_id, "discord session ready");
    gate.open();

    let linker = Arc::new(AccountLinker::new(roblox, links, config.roblox_group_id));
    let app = create_router(Arc::new(AppState {
        shifts,
        linker,
        registry,
    }));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("HTTP API listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    if !poller.shutdown(config.shutdown_grace).await {
        tracing::warn!("poller did not stop within the shutdown grace period");
    }
    tracing::info!("warden shutdown");
    Ok(())
}
