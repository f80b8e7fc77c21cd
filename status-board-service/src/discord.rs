// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lobby_common::Embed;
use reqwest::{Method, StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::platform::{
    Channel, ChannelId, ChatPlatformClient, Guild, GuildId, LogLevel, Message, MessageId,
    RemoteOperationError, RemoteResult, SessionEvent, UserId,
};

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

const USER_AGENT: &str = concat!(
    "DiscordBot (status-board-service, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const MAX_RETRIES: u32 = 3;
const GUILD_PAGE_LIMIT: usize = 200;
const MESSAGE_PAGE_LIMIT: usize = 100;
const BULK_DELETE_LIMIT: usize = 100;
const BULK_DELETE_MAX_AGE_DAYS: i64 = 14;
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;
const TEXT_CHANNEL_TYPE: u8 = 0;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
struct Identity {
    token: String,
    user_id: UserId,
}

/// Chat platform client speaking the Discord HTTP API.
///
/// A successful `login` remembers the bot identity; every other call uses it
/// and a 401 from any of them ends the session.
pub struct DiscordRestClient {
    client: reqwest::Client,
    base_url: String,
    identity: RwLock<Option<Identity>>,
    events: broadcast::Sender<SessionEvent>,
}

impl DiscordRestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build discord http client")?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity: RwLock::new(None),
            events,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn current_identity(&self) -> RemoteResult<Identity> {
        self.identity
            .read()
            .await
            .clone()
            .ok_or_else(RemoteOperationError::not_logged_in)
    }

    async fn end_session(&self, reason: &str) {
        if self.identity.write().await.take().is_some() {
            self.emit(SessionEvent::Log {
                level: LogLevel::Warn,
                message: format!("session ended: {reason}"),
            });
            self.emit(SessionEvent::LoggedOut);
        }
    }

    /// One request with the given token, retrying when rate limited.
    async fn execute(
        &self,
        token: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> RemoteResult<reqwest::Response> {
        let url = self.endpoint(path);
        let mut attempt = 0;

        loop {
            debug!(%method, path, attempt, "discord request");
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bot {token}"));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|error| {
                let kind = if error.is_timeout() { "timed out" } else { "failed" };
                RemoteOperationError::transport(format!("{method} {path} {kind}: {error}"))
            })?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let raw = response.text().await.unwrap_or_default();
            let error_body: DiscordErrorBody = serde_json::from_str(&raw).unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES {
                let delay = Duration::from_secs_f64(error_body.retry_after.unwrap_or(1.0).max(0.0));
                self.emit(SessionEvent::Log {
                    level: LogLevel::Warn,
                    message: format!(
                        "rate limited on {method} {path}; retrying in {:.3}s",
                        delay.as_secs_f64()
                    ),
                });
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(api_error(status, error_body, &raw));
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> RemoteResult<reqwest::Response> {
        let identity = self.current_identity().await?;
        let result = self.execute(&identity.token, method, path, body).await;
        if let Err(error) = &result {
            if error.status == Some(StatusCode::UNAUTHORIZED.as_u16()) {
                self.end_session("credential rejected").await;
            }
        }
        result
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> RemoteResult<T> {
        let response = self.call(method, path, body).await?;
        decode(response, path).await
    }

    async fn delete_one(&self, channel_id: ChannelId, message_id: MessageId) -> RemoteResult<()> {
        self.call(
            Method::DELETE,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            None,
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl ChatPlatformClient for DiscordRestClient {
    async fn list_guilds(&self) -> RemoteResult<Vec<Guild>> {
        let mut guilds = Vec::new();
        let mut after: Option<u64> = None;

        loop {
            let mut path = format!("/users/@me/guilds?limit={GUILD_PAGE_LIMIT}");
            if let Some(after) = after {
                path.push_str(&format!("&after={after}"));
            }
            let page: Vec<RawGuild> = self.call_json(Method::GET, &path, None).await?;
            let full_page = page.len() >= GUILD_PAGE_LIMIT;
            after = page.iter().map(|guild| guild.id).max();
            guilds.extend(page.into_iter().map(|guild| Guild {
                id: GuildId(guild.id),
                name: guild.name,
            }));
            if !full_page {
                return Ok(guilds);
            }
        }
    }

    async fn list_text_channels(&self, guild_id: GuildId) -> RemoteResult<Vec<Channel>> {
        let channels: Vec<RawChannel> = self
            .call_json(Method::GET, &format!("/guilds/{guild_id}/channels"), None)
            .await?;
        Ok(channels
            .into_iter()
            .filter(|channel| channel.kind == TEXT_CHANNEL_TYPE)
            .map(RawChannel::into_channel)
            .collect())
    }

    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> RemoteResult<Channel> {
        let body = json!({ "name": name, "type": TEXT_CHANNEL_TYPE });
        let channel: RawChannel = self
            .call_json(
                Method::POST,
                &format!("/guilds/{guild_id}/channels"),
                Some(&body),
            )
            .await?;
        Ok(channel.into_channel())
    }

    async fn list_messages_authored_by_self(
        &self,
        channel_id: ChannelId,
    ) -> RemoteResult<Vec<Message>> {
        let self_id = self.current_identity().await?.user_id;
        let mut messages = Vec::new();
        let mut before: Option<u64> = None;

        loop {
            let mut path = format!("/channels/{channel_id}/messages?limit={MESSAGE_PAGE_LIMIT}");
            if let Some(before) = before {
                path.push_str(&format!("&before={before}"));
            }
            let page: Vec<RawMessage> = self.call_json(Method::GET, &path, None).await?;
            let full_page = page.len() >= MESSAGE_PAGE_LIMIT;
            before = page.iter().map(|message| message.id).min();
            messages.extend(
                page.into_iter()
                    .map(RawMessage::into_message)
                    .filter(|message| message.author_id == self_id),
            );
            if !full_page {
                return Ok(messages);
            }
        }
    }

    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: &[MessageId],
    ) -> RemoteResult<()> {
        let (recent, old) = partition_for_deletion(message_ids, Utc::now());

        for chunk in recent.chunks(BULK_DELETE_LIMIT) {
            if let [single] = chunk {
                self.delete_one(channel_id, *single).await?;
                continue;
            }
            let ids: Vec<String> = chunk.iter().map(ToString::to_string).collect();
            self.call(
                Method::POST,
                &format!("/channels/{channel_id}/messages/bulk-delete"),
                Some(&json!({ "messages": ids })),
            )
            .await?;
        }

        for message_id in old {
            self.delete_one(channel_id, message_id).await?;
        }

        Ok(())
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> RemoteResult<()> {
        self.call(
            Method::PATCH,
            &format!("/channels/{channel_id}"),
            Some(&json!({ "name": name })),
        )
        .await
        .map(|_| ())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<Message> {
        let message: RawMessage = self
            .call_json(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(&message_body(text, embed)),
            )
            .await?;
        Ok(message.into_message())
    }

    async fn edit_message(
        &self,
        message: &Message,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<()> {
        self.call(
            Method::PATCH,
            &format!("/channels/{}/messages/{}", message.channel_id, message.id),
            Some(&message_body(text, embed)),
        )
        .await
        .map(|_| ())
    }

    async fn login(&self, credential: &str) -> RemoteResult<()> {
        let response = self
            .execute(credential, Method::GET, "/users/@me", None)
            .await?;
        let user: RawUser = decode(response, "/users/@me").await?;

        *self.identity.write().await = Some(Identity {
            token: credential.to_string(),
            user_id: UserId(user.id),
        });
        self.emit(SessionEvent::Log {
            level: LogLevel::Info,
            message: format!("authenticated as user {}", user.id),
        });
        self.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    async fn logout(&self) -> RemoteResult<()> {
        self.end_session("logged out").await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Default, Deserialize)]
struct DiscordErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawGuild {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
}

impl RawChannel {
    fn into_channel(self) -> Channel {
        Channel {
            id: ChannelId(self.id),
            name: self.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(deserialize_with = "snowflake")]
    id: u64,
    #[serde(deserialize_with = "snowflake")]
    channel_id: u64,
    author: RawUser,
    timestamp: DateTime<Utc>,
}

impl RawMessage {
    fn into_message(self) -> Message {
        Message {
            id: MessageId(self.id),
            channel_id: ChannelId(self.channel_id),
            author_id: UserId(self.author.id),
            created_at: self.timestamp,
        }
    }
}

fn snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        Raw::Number(number) => Ok(number),
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> RemoteResult<T> {
    response.json::<T>().await.map_err(|error| {
        RemoteOperationError::transport(format!("invalid response from {path}: {error}"))
    })
}

fn api_error(status: StatusCode, body: DiscordErrorBody, raw: &str) -> RemoteOperationError {
    let message = match body.message {
        Some(message) => format!("{status}: {message}"),
        None if raw.is_empty() => status.to_string(),
        None => format!("{status}: {raw}"),
    };
    RemoteOperationError::api(body.code, status.as_u16(), message)
}

fn message_body(text: &str, embed: Option<&Embed>) -> Value {
    // An empty embed list clears whatever embed the message had.
    let embeds: Vec<&Embed> = embed.into_iter().collect();
    json!({ "content": text, "embeds": embeds })
}

fn snowflake_created_at(id: MessageId) -> Option<DateTime<Utc>> {
    let millis = (id.0 >> 22) + DISCORD_EPOCH_MS;
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?)
}

/// Split ids into those young enough for bulk deletion and the rest.
fn partition_for_deletion(
    message_ids: &[MessageId],
    now: DateTime<Utc>,
) -> (Vec<MessageId>, Vec<MessageId>) {
    let max_age = chrono::Duration::days(BULK_DELETE_MAX_AGE_DAYS);
    message_ids.iter().copied().partition(|id| {
        snowflake_created_at(*id).is_some_and(|created_at| now - created_at < max_age)
    })
}
