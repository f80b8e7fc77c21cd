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

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lobby_common::Embed;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

macro_rules! snowflake_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake_id!(GuildId);
snowflake_id!(ChannelId);
snowflake_id!(MessageId);
snowflake_id!(UserId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

/// Handle to a message that exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListGuilds,
    ListTextChannels,
    CreateTextChannel,
    ListMessages,
    DeleteMessages,
    RenameChannel,
    SendMessage,
    EditMessage,
    Login,
    Logout,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListGuilds => "list_guilds",
            Self::ListTextChannels => "list_text_channels",
            Self::CreateTextChannel => "create_text_channel",
            Self::ListMessages => "list_messages",
            Self::DeleteMessages => "delete_messages",
            Self::RenameChannel => "rename_channel",
            Self::SendMessage => "send_message",
            Self::EditMessage => "edit_message",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform call that did not succeed.
///
/// `code` is the platform's JSON error code when the platform answered with
/// one; transport failures and timeouts have none.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RemoteOperationError {
    pub code: Option<u32>,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteOperationError {
    pub fn api(code: Option<u32>, status: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn not_logged_in() -> Self {
        Self::transport("not logged in")
    }
}

pub type RemoteResult<T> = Result<T, RemoteOperationError>;

/// A remote failure tagged with the operation that produced it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed: {source}")]
pub struct StepFailure {
    pub operation: Operation,
    #[source]
    pub source: RemoteOperationError,
}

pub trait RemoteResultExt<T> {
    fn during(self, operation: Operation) -> Result<T, StepFailure>;
}

impl<T> RemoteResultExt<T> for RemoteResult<T> {
    fn during(self, operation: Operation) -> Result<T, StepFailure> {
        self.map_err(|source| StepFailure { operation, source })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    Log { level: LogLevel, message: String },
}

#[async_trait]
pub trait ChatPlatformClient: Send + Sync {
    async fn list_guilds(&self) -> RemoteResult<Vec<Guild>>;

    async fn list_text_channels(&self, guild_id: GuildId) -> RemoteResult<Vec<Channel>>;

    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> RemoteResult<Channel>;

    /// Every message in the channel whose author is the logged-in identity,
    /// in no particular order.
    async fn list_messages_authored_by_self(
        &self,
        channel_id: ChannelId,
    ) -> RemoteResult<Vec<Message>>;

    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: &[MessageId],
    ) -> RemoteResult<()>;

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> RemoteResult<()>;

    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<Message>;

    /// Replace both body and embed; `None` clears any embed.
    async fn edit_message(
        &self,
        message: &Message,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<()>;

    async fn login(&self, credential: &str) -> RemoteResult<()>;

    async fn logout(&self) -> RemoteResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
