//! Roblox public web API client.

use reqwest::Client;
use serde::Deserialize;

use crate::error::WardenError;
use crate::http;
use crate::types::GameId;

/// A resolved Roblox user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobloxUser {
    pub id: GameId,
    pub name: String,
}

/// A user's membership in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    pub group_name: String,
    pub role_name: String,
    pub rank: u32,
}

/// Unauthenticated client for the Roblox users and groups APIs.
///
/// Both endpoints are rate limited; a 429 surfaces as a transient
/// [`WardenError::UnexpectedStatus`].
pub struct RobloxClient {
    http: Client,
    users_url: String,
    groups_url: String,
}

impl RobloxClient {
    pub fn new(http: Client, users_url: impl Into<String>, groups_url: impl Into<String>) -> Self {
        Self {
            http,
            users_url: users_url.into().trim_end_matches('/').to_string(),
            groups_url: groups_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a username to a user. `None` if no such user exists.
    pub async fn lookup_user(&self, username: &str) -> Result<Option<RobloxUser>, WardenError> {
        let endpoint = "/v1/usernames/users";
        let request = self
            .http
            .post(format!("{}{endpoint}", self.users_url))
            .json(&serde_json::json!({
                "usernames": [username],
                "excludeBannedUsers": true,
            }));
        let response: DataEnvelope<UsernameMatch> = http::send_json(endpoint, request).await?;
        Ok(response.data.into_iter().next().map(|m| RobloxUser {
            id: GameId::new(m.id.to_string()),
            name: m.name,
        }))
    }

    /// The user's role in `group_id`. `None` if they are not a member.
    pub async fn group_membership(
        &self,
        user_id: &GameId,
        group_id: u64,
    ) -> Result<Option<GroupMembership>, WardenError> {
        let endpoint = format!("/v1/users/{user_id}/groups/roles");
        let request = self.http.get(format!("{}{endpoint}", self.groups_url));
        let response: DataEnvelope<GroupRole> = http::send_json(&endpoint, request).await?;
        Ok(response
            .data
            .into_iter()
            .find(|entry| entry.group.id == group_id)
            .map(|entry| GroupMembership {
                group_name: entry.group.name,
                role_name: entry.role.name,
                rank: entry.role.rank,
            }))
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UsernameMatch {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct GroupRole {
    group: GroupRef,
    role: RoleRef,
}

#[derive(Debug, Deserialize)]
struct GroupRef {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RoleRef {
    #[serde(default)]
    name: String,
    #[serde(default)]
    rank: u32,
}
