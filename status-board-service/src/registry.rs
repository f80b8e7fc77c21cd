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

use std::collections::HashMap;

use crate::platform::{Channel, GuildId, Message};

pub const POOL_CAPACITY: usize = 10;

/// A guild's status channel and the bot messages that make up its board,
/// ordered by slot index.
#[derive(Debug, Clone)]
pub struct GuildStatusEntry {
    pub guild_id: GuildId,
    pub channel: Channel,
    pub messages: Vec<Message>,
    pub capacity: usize,
}

#[derive(Debug, Default)]
pub struct GuildRegistry {
    entries: HashMap<GuildId, GuildStatusEntry>,
}

impl GuildRegistry {
    #[cfg(test)]
    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.entries.contains_key(&guild_id)
    }

    pub fn insert(&mut self, entry: GuildStatusEntry) {
        self.entries.insert(entry.guild_id, entry);
    }

    pub fn remove(&mut self, guild_id: GuildId) -> Option<GuildStatusEntry> {
        self.entries.remove(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Everything a reconciliation pass carries over to the next one.
#[derive(Debug, Default)]
pub struct ReconciliationState {
    pub registry: GuildRegistry,
    /// Highest slot count any guild may still be showing. A fully synced
    /// pass resets it to that pass's count; any other pass only raises it.
    pub last_desired_slot_count: usize,
}
