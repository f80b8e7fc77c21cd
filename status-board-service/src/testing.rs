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

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use lobby_common::Embed;
use tokio::sync::broadcast;

use crate::platform::{
    Channel, ChannelId, ChatPlatformClient, Guild, GuildId, Message, MessageId, Operation,
    RemoteOperationError, RemoteResult, SessionEvent, UserId,
};

pub const BOT_USER: UserId = UserId(1);
pub const OTHER_USER: UserId = UserId(2);

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub handle: Message,
    pub text: String,
    pub embed: Option<Embed>,
}

struct FakeChannel {
    guild_id: GuildId,
    channel: Channel,
}

struct InjectedFailure {
    operation: Operation,
    guild_id: Option<GuildId>,
    error: RemoteOperationError,
    remaining: Option<usize>,
}

struct FakeState {
    guilds: Vec<Guild>,
    channels: Vec<FakeChannel>,
    messages: HashMap<ChannelId, Vec<StoredMessage>>,
    next_id: u64,
    clock: DateTime<Utc>,
    failures: Vec<InjectedFailure>,
    calls: Vec<(Operation, Option<GuildId>)>,
    login_failures: usize,
}

/// In-memory chat platform that records every call and can be told to fail
/// specific operations.
pub struct FakePlatform {
    state: Mutex<FakeState>,
    events: broadcast::Sender<SessionEvent>,
}

fn unknown_channel() -> RemoteOperationError {
    RemoteOperationError::api(Some(10003), 404, "Unknown Channel")
}

impl FakePlatform {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(FakeState {
                guilds: Vec::new(),
                channels: Vec::new(),
                messages: HashMap::new(),
                next_id: 1000,
                clock: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
                failures: Vec::new(),
                calls: Vec::new(),
                login_failures: 0,
            }),
            events,
        }
    }

    pub fn add_guild(&self, id: u64, name: &str) -> GuildId {
        let guild_id = GuildId(id);
        self.state.lock().unwrap().guilds.push(Guild {
            id: guild_id,
            name: name.to_string(),
        });
        guild_id
    }

    pub fn add_channel(&self, guild_id: GuildId, name: &str) -> ChannelId {
        let mut state = self.state.lock().unwrap();
        Self::insert_channel(&mut state, guild_id, name).id
    }

    pub fn delete_channel(&self, channel_id: ChannelId) {
        let mut state = self.state.lock().unwrap();
        state.channels.retain(|entry| entry.channel.id != channel_id);
        state.messages.remove(&channel_id);
    }

    /// Rename a channel behind the bot's back, without recording a call.
    pub fn rename(&self, channel_id: ChannelId, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state
            .channels
            .iter_mut()
            .find(|entry| entry.channel.id == channel_id)
        {
            entry.channel.name = name.to_string();
        }
    }

    pub fn add_message(&self, channel_id: ChannelId, author_id: UserId, text: &str) -> MessageId {
        let mut state = self.state.lock().unwrap();
        let created_at = state.clock;
        Self::insert_message(&mut state, channel_id, author_id, created_at, text, None).id
    }

    pub fn add_message_at(
        &self,
        channel_id: ChannelId,
        author_id: UserId,
        created_at: DateTime<Utc>,
        text: &str,
    ) -> MessageId {
        let mut state = self.state.lock().unwrap();
        Self::insert_message(&mut state, channel_id, author_id, created_at, text, None).id
    }

    pub fn fail(
        &self,
        operation: Operation,
        guild_id: Option<GuildId>,
        code: Option<u32>,
        times: Option<usize>,
    ) {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            operation,
            guild_id,
            error: RemoteOperationError::api(code, 400, format!("injected {operation} failure")),
            remaining: times,
        });
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn fail_logins(&self, count: usize) {
        self.state.lock().unwrap().login_failures = count;
    }

    pub fn channels(&self, guild_id: GuildId) -> Vec<Channel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|entry| entry.guild_id == guild_id)
            .map(|entry| entry.channel.clone())
            .collect()
    }

    /// Messages in the channel, oldest first.
    pub fn board(&self, channel_id: ChannelId) -> Vec<StoredMessage> {
        let state = self.state.lock().unwrap();
        let mut messages = state.messages.get(&channel_id).cloned().unwrap_or_default();
        messages.sort_by_key(|message| (message.handle.created_at, message.handle.id));
        messages
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(called, _)| *called == operation)
            .count()
    }

    pub fn calls_for(&self, operation: Operation, guild_id: GuildId) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(called, guild)| *called == operation && *guild == Some(guild_id))
            .count()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn insert_channel(state: &mut FakeState, guild_id: GuildId, name: &str) -> Channel {
        state.next_id += 1;
        let channel = Channel {
            id: ChannelId(state.next_id),
            name: name.to_string(),
        };
        state.channels.push(FakeChannel {
            guild_id,
            channel: channel.clone(),
        });
        state.messages.insert(channel.id, Vec::new());
        channel
    }

    fn insert_message(
        state: &mut FakeState,
        channel_id: ChannelId,
        author_id: UserId,
        created_at: DateTime<Utc>,
        text: &str,
        embed: Option<&Embed>,
    ) -> Message {
        state.next_id += 1;
        state.clock = state.clock.max(created_at) + Duration::seconds(1);
        let handle = Message {
            id: MessageId(state.next_id),
            channel_id,
            author_id,
            created_at,
        };
        state
            .messages
            .entry(channel_id)
            .or_default()
            .push(StoredMessage {
                handle: handle.clone(),
                text: text.to_string(),
                embed: embed.cloned(),
            });
        handle
    }

    fn guild_of(state: &FakeState, channel_id: ChannelId) -> Option<GuildId> {
        state
            .channels
            .iter()
            .find(|entry| entry.channel.id == channel_id)
            .map(|entry| entry.guild_id)
    }

    fn record(
        state: &mut FakeState,
        operation: Operation,
        guild_id: Option<GuildId>,
    ) -> RemoteResult<()> {
        state.calls.push((operation, guild_id));
        let position = state.failures.iter().position(|failure| {
            failure.operation == operation
                && (failure.guild_id.is_none() || failure.guild_id == guild_id)
        });
        let Some(position) = position else {
            return Ok(());
        };
        let failure = &mut state.failures[position];
        let error = failure.error.clone();
        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                state.failures.remove(position);
            }
        }
        Err(error)
    }

    fn existing_channel(state: &FakeState, channel_id: ChannelId) -> RemoteResult<()> {
        if state.messages.contains_key(&channel_id) {
            Ok(())
        } else {
            Err(unknown_channel())
        }
    }
}

#[async_trait]
impl ChatPlatformClient for FakePlatform {
    async fn list_guilds(&self) -> RemoteResult<Vec<Guild>> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Operation::ListGuilds, None)?;
        Ok(state.guilds.clone())
    }

    async fn list_text_channels(&self, guild_id: GuildId) -> RemoteResult<Vec<Channel>> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Operation::ListTextChannels, Some(guild_id))?;
        Ok(state
            .channels
            .iter()
            .filter(|entry| entry.guild_id == guild_id)
            .map(|entry| entry.channel.clone())
            .collect())
    }

    async fn create_text_channel(&self, guild_id: GuildId, name: &str) -> RemoteResult<Channel> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, Operation::CreateTextChannel, Some(guild_id))?;
        Ok(Self::insert_channel(&mut state, guild_id, name))
    }

    async fn list_messages_authored_by_self(
        &self,
        channel_id: ChannelId,
    ) -> RemoteResult<Vec<Message>> {
        let mut state = self.state.lock().unwrap();
        let guild_id = Self::guild_of(&state, channel_id);
        Self::record(&mut state, Operation::ListMessages, guild_id)?;
        Self::existing_channel(&state, channel_id)?;
        // Newest first, like the real API.
        Ok(state.messages[&channel_id]
            .iter()
            .rev()
            .filter(|message| message.handle.author_id == BOT_USER)
            .map(|message| message.handle.clone())
            .collect())
    }

    async fn delete_messages(
        &self,
        channel_id: ChannelId,
        message_ids: &[MessageId],
    ) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let guild_id = Self::guild_of(&state, channel_id);
        Self::record(&mut state, Operation::DeleteMessages, guild_id)?;
        Self::existing_channel(&state, channel_id)?;
        if let Some(messages) = state.messages.get_mut(&channel_id) {
            messages.retain(|message| !message_ids.contains(&message.handle.id));
        }
        Ok(())
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let guild_id = Self::guild_of(&state, channel_id);
        Self::record(&mut state, Operation::RenameChannel, guild_id)?;
        let entry = state
            .channels
            .iter_mut()
            .find(|entry| entry.channel.id == channel_id)
            .ok_or_else(unknown_channel)?;
        entry.channel.name = name.to_string();
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<Message> {
        let mut state = self.state.lock().unwrap();
        let guild_id = Self::guild_of(&state, channel_id);
        Self::record(&mut state, Operation::SendMessage, guild_id)?;
        Self::existing_channel(&state, channel_id)?;
        let created_at = state.clock;
        Ok(Self::insert_message(
            &mut state, channel_id, BOT_USER, created_at, text, embed,
        ))
    }

    async fn edit_message(
        &self,
        message: &Message,
        text: &str,
        embed: Option<&Embed>,
    ) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        let guild_id = Self::guild_of(&state, message.channel_id);
        Self::record(&mut state, Operation::EditMessage, guild_id)?;
        Self::existing_channel(&state, message.channel_id)?;
        let stored = state
            .messages
            .get_mut(&message.channel_id)
            .and_then(|messages| {
                messages
                    .iter_mut()
                    .find(|stored| stored.handle.id == message.id)
            })
            .ok_or_else(|| RemoteOperationError::api(Some(10008), 404, "Unknown Message"))?;
        stored.text = text.to_string();
        stored.embed = embed.cloned();
        Ok(())
    }

    async fn login(&self, _credential: &str) -> RemoteResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            Self::record(&mut state, Operation::Login, None)?;
            if state.login_failures > 0 {
                state.login_failures -= 1;
                return Err(RemoteOperationError::api(None, 401, "401: Unauthorized"));
            }
        }
        self.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    async fn logout(&self) -> RemoteResult<()> {
        {
            let mut state = self.state.lock().unwrap();
            Self::record(&mut state, Operation::Logout, None)?;
        }
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
