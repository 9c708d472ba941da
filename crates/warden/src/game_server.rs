//! Game server (ER:LC private server API) client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::error::WardenError;
use crate::http;
use crate::log_entry::{LogEntry, LogKind, LogStream};
use crate::types::GameId;

/// A player currently on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: GameId,
    pub name: String,
    pub team: Option<String>,
}

/// Operations the core needs from the game server.
#[async_trait]
pub trait GameServerClient: Send + Sync {
    /// Players currently connected.
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, WardenError>;

    /// Recent join/leave entries, in whatever order the server returns them.
    async fn fetch_join_leave_log(&self) -> Result<Vec<LogEntry>, WardenError>;

    /// Recent kill entries, in whatever order the server returns them.
    async fn fetch_kill_log(&self) -> Result<Vec<LogEntry>, WardenError>;

    /// Execute an administrative command on the server.
    async fn run_command(&self, command: &str) -> Result<(), WardenError>;

    async fn fetch_log(&self, stream: LogStream) -> Result<Vec<LogEntry>, WardenError> {
        match stream {
            LogStream::JoinLeave => self.fetch_join_leave_log().await,
            LogStream::Kill => self.fetch_kill_log().await,
        }
    }
}

/// HTTP client for the ER:LC private server API.
pub struct ErlcClient {
    http: Client,
    base_url: String,
    server_id: String,
    headers: HeaderMap,
    command_retry_delay: Duration,
}

impl ErlcClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        server_id: impl Into<String>,
        server_key: &str,
        command_retry_delay: Duration,
    ) -> Result<Self, WardenError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(server_key).map_err(|e| WardenError::InvalidConfig {
            reason: format!("server key is not a valid header value: {e}"),
        })?;
        headers.insert("Server-Key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            server_id: server_id.into(),
            headers,
            command_retry_delay,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/servers/{}{}", self.base_url, self.server_id, endpoint)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T, WardenError> {
        let request = self.http.get(self.url(endpoint)).headers(self.headers.clone());
        http::send_json(endpoint, request).await
    }

    async fn post_command(&self, command: &str) -> Result<(), WardenError> {
        let request = self
            .http
            .post(self.url("/command"))
            .headers(self.headers.clone())
            .json(&serde_json::json!({ "command": command }));
        http::send("/command", request).await.map(|_| ())
    }
}

#[async_trait]
impl GameServerClient for ErlcClient {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, WardenError> {
        let envelope: PlayersEnvelope = self.get("/players").await?;
        Ok(envelope
            .players
            .into_iter()
            .filter_map(PlayerRecord::into_roster_entry)
            .collect())
    }

    async fn fetch_join_leave_log(&self) -> Result<Vec<LogEntry>, WardenError> {
        let envelope: LogsEnvelope<JoinLogRecord> = self.get("/joinlogs").await?;
        Ok(envelope
            .logs
            .into_iter()
            .filter_map(JoinLogRecord::into_entry)
            .collect())
    }

    async fn fetch_kill_log(&self) -> Result<Vec<LogEntry>, WardenError> {
        let envelope: LogsEnvelope<KillLogRecord> = self.get("/killlogs").await?;
        Ok(envelope.logs.into_iter().map(KillLogRecord::into_entry).collect())
    }

    async fn run_command(&self, command: &str) -> Result<(), WardenError> {
        match self.post_command(command).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    command,
                    error = %e,
                    retry_in = ?self.command_retry_delay,
                    "server command failed transiently, retrying once"
                );
                tokio::time::sleep(self.command_retry_delay).await;
                self.post_command(command).await
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayersEnvelope {
    #[serde(default)]
    players: Vec<PlayerRecord>,
}

#[derive(Debug, Deserialize)]
struct LogsEnvelope<T> {
    #[serde(default = "Vec::new")]
    logs: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PlayerRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    id: Option<String>,
    #[serde(default, alias = "username")]
    name: Option<String>,
    #[serde(default, alias = "Team")]
    team: Option<String>,
}

impl PlayerRecord {
    fn into_roster_entry(self) -> Option<RosterEntry> {
        let id = self.id?;
        Some(RosterEntry {
            id: GameId::new(id),
            name: self.name.unwrap_or_default(),
            team: self.team.filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct JoinLogRecord {
    #[serde(default, alias = "Timestamp", deserialize_with = "flexible_timestamp")]
    timestamp: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "Join")]
    join: Option<bool>,
}

impl JoinLogRecord {
    fn into_entry(self) -> Option<LogEntry> {
        let kind = match (self.kind.as_deref(), self.join) {
            (Some("join"), _) | (None, Some(true)) => LogKind::Join,
            (Some("leave"), _) | (None, Some(false)) => LogKind::Leave,
            (other, _) => {
                tracing::debug!(kind = ?other, "skipping join log record with unknown type");
                return None;
            }
        };
        Some(LogEntry {
            timestamp: self.timestamp,
            kind,
            actor_id: GameId::new(self.id.unwrap_or_default()),
            actor_name: self.username.unwrap_or_default(),
            victim_id: None,
            victim_name: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct KillLogRecord {
    #[serde(default, alias = "Timestamp", deserialize_with = "flexible_timestamp")]
    timestamp: i64,
    #[serde(default)]
    killer_username: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    killer_id: Option<String>,
    #[serde(default)]
    killed_username: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    killed_id: Option<String>,
}

impl KillLogRecord {
    fn into_entry(self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp,
            kind: LogKind::Kill,
            actor_id: GameId::new(self.killer_id.unwrap_or_default()),
            actor_name: self.killer_username.unwrap_or_default(),
            victim_id: self.killed_id.map(GameId::new),
            victim_name: self.killed_username,
        }
    }
}

/// Ids arrive as JSON numbers or strings depending on the endpoint.
fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            return Err(serde::de::Error::custom(format!("unexpected id value {other}")));
        }
    })
}

/// Missing or null timestamps are carried as 0.
fn flexible_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {n} out of range"))),
        Some(serde_json::Value::Null) | None => Ok(0),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unexpected timestamp value {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_records_accept_numeric_ids_and_flags() {
        let envelope: LogsEnvelope<JoinLogRecord> = serde_json::from_str(
            r#"{"logs": [
                {"timestamp": 10, "username": "Alice", "id": 123, "type": "join"},
                {"Timestamp": 11.9, "username": "Bob", "id": "456", "Join": false},
                {"username": "Carol", "id": 789, "type": "teleport"}
            ]}"#,
        )
        .unwrap();
        let entries: Vec<_> = envelope
            .logs
            .into_iter()
            .filter_map(JoinLogRecord::into_entry)
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], LogEntry::join(10, "123", "Alice"));
        assert_eq!(entries[1], LogEntry::leave(11, "456", "Bob"));
    }

    #[test]
    fn empty_envelopes_decode_to_no_records() {
        let joins: LogsEnvelope<JoinLogRecord> = serde_json::from_str("{}").unwrap();
        assert!(joins.logs.is_empty());
        let kills: LogsEnvelope<KillLogRecord> = serde_json::from_str(r#"{"logs": []}"#).unwrap();
        assert!(kills.logs.is_empty());
    }

    #[test]
    fn missing_timestamp_is_zero() {
        let record: JoinLogRecord =
            serde_json::from_str(r#"{"username": "A", "id": 1, "type": "join"}"#).unwrap();
        assert_eq!(record.timestamp, 0);
    }

    #[test]
    fn kill_records_carry_victim() {
        let record: KillLogRecord = serde_json::from_str(
            r#"{"timestamp": 5, "killer_username": "Bob", "killer_id": 2, "killed_username": "Carol"}"#,
        )
        .unwrap();
        let entry = record.into_entry();
        assert_eq!(entry.kind, LogKind::Kill);
        assert_eq!(entry.actor_id, GameId::new("2"));
        assert_eq!(entry.victim_name.as_deref(), Some("Carol"));
        assert_eq!(entry.victim_id, None);
    }

    #[test]
    fn players_without_team_are_kept_without_team() {
        let envelope: PlayersEnvelope = serde_json::from_str(
            r#"{"players": [{"id": 1, "name": "A", "team": "Police"}, {"id": 2, "team": ""}, {"name": "no-id"}]}"#,
        )
        .unwrap();
        let roster: Vec<_> = envelope
            .players
            .into_iter()
            .filter_map(PlayerRecord::into_roster_entry)
            .collect();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].team.as_deref(), Some("Police"));
        assert_eq!(roster[1].team, None);
    }

    #[test]
    fn rejects_structured_ids() {
        let result: Result<PlayerRecord, _> = serde_json::from_str(r#"{"id": {"nested": true}}"#);
        assert!(result.is_err());
    }
}
