//! Discord REST client: session check, member resolution and channel messages.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::WardenError;
use crate::http;
use crate::identity::{Member, MemberDirectory};
use crate::notify::NotificationSink;
use crate::types::{ChannelId, ExternalId};

/// Identity of the bot user, returned by the session check.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: String,
    pub username: String,
}

/// How long the guild role id to name map is reused before it is refetched.
pub const ROLE_CACHE_TTL: Duration = Duration::from_secs(300);

type RoleNames = Arc<HashMap<String, String>>;

/// Discord REST v10 client scoped to one guild.
pub struct DiscordRest {
    http: Client,
    base_url: String,
    guild_id: u64,
    headers: HeaderMap,
    role_ttl: Duration,
    roles: Mutex<Option<(Instant, RoleNames)>>,
}

impl DiscordRest {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        token: &str,
        guild_id: u64,
    ) -> Result<Self, WardenError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bot {token}")).map_err(|e| {
            WardenError::InvalidConfig {
                reason: format!("discord token is not a valid header value: {e}"),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            guild_id,
            headers,
            role_ttl: ROLE_CACHE_TTL,
            roles: Mutex::new(None),
        })
    }

    /// Override how long fetched role names are reused.
    pub fn with_role_cache_ttl(mut self, ttl: Duration) -> Self {
        self.role_ttl = ttl;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Confirm the token is valid and the bot can see the operating guild.
    ///
    /// The log poller is held back until this succeeds.
    pub async fn verify_session(&self) -> Result<BotUser, WardenError> {
        let user: BotUser = http::send_json(
            "/users/@me",
            self.http.get(self.url("/users/@me")).headers(self.headers.clone()),
        )
        .await?;
        let guild_path = format!("/guilds/{}", self.guild_id);
        http::send(
            &guild_path,
            self.http.get(self.url(&guild_path)).headers(self.headers.clone()),
        )
        .await?;
        Ok(user)
    }

    /// Role id to name map for the guild, fetched at most once per TTL.
    ///
    /// Roles created since the last fetch are unknown until the entry expires.
    async fn guild_role_names(&self) -> Result<RoleNames, WardenError> {
        let cached = self
            .roles
            .lock()
            .as_ref()
            .filter(|(fetched_at, _)| fetched_at.elapsed() < self.role_ttl)
            .map(|(_, names)| Arc::clone(names));
        if let Some(names) = cached {
            return Ok(names);
        }

        let path = format!("/guilds/{}/roles", self.guild_id);
        let roles: Vec<GuildRole> =
            http::send_json(&path, self.http.get(self.url(&path)).headers(self.headers.clone()))
                .await?;
        let names: RoleNames = Arc::new(roles.into_iter().map(|r| (r.id, r.name)).collect());
        *self.roles.lock() = Some((Instant::now(), Arc::clone(&names)));
        Ok(names)
    }
}

#[derive(Debug, Deserialize)]
struct GuildRole {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    user: GuildMemberUser,
}

#[derive(Debug, Deserialize)]
struct GuildMemberUser {
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[async_trait]
impl MemberDirectory for DiscordRest {
    async fn resolve_member(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<Member>, WardenError> {
        let path = format!("/guilds/{}/members/{}", self.guild_id, external_id);
        let response = self
            .http
            .get(self.url(&path))
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| http::transport_error(&path, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WardenError::UnexpectedStatus {
                endpoint: path,
                status: response.status().as_u16(),
            });
        }
        let member: GuildMember =
            response
                .json()
                .await
                .map_err(|e| WardenError::MalformedPayload {
                    endpoint: path.clone(),
                    reason: e.to_string(),
                    source: Some(Box::new(e)),
                })?;

        let role_names = self.guild_role_names().await?;
        let credentials: HashSet<String> = member
            .roles
            .iter()
            .filter_map(|id| role_names.get(id).cloned())
            .collect();
        let display_name = member
            .nick
            .or(member.user.global_name)
            .unwrap_or(member.user.username);

        Ok(Some(Member {
            external_id: external_id.clone(),
            display_name,
            credentials,
        }))
    }
}

#[async_trait]
impl NotificationSink for DiscordRest {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<(), WardenError> {
        let path = format!("/channels/{channel}/messages");
        let request = self
            .http
            .post(self.url(&path))
            .headers(self.headers.clone())
            .json(&serde_json::json!({ "content": text }));
        http::send(&path, request).await.map(|_| ())
    }
}
