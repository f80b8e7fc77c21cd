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

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{DEFAULT_LOBBY_CAPACITY, Embed, LobbyInfo, LobbySnapshot, LobbyState, Slot};

pub const LOBBY_COLOUR: u32 = 0xF1C40F;
const CLOCK_FORMAT: &str = "%d/%m/%y %H:%M";
const UNKNOWN_FIELD: &str = "Unknown";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    pub game_name: String,
    pub steam_app_id: u32,
    /// Seats per lobby, shown as the denominator of the player field.
    pub lobby_capacity: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            game_name: "S&ASRT".to_string(),
            steam_app_id: 212480,
            lobby_capacity: DEFAULT_LOBBY_CAPACITY,
        }
    }
}

/// Render a snapshot into ordered status-board slots.
///
/// Slot 0 is always the overview. Every other slot is one lobby, in snapshot
/// order, with private custom games left out (they still count in slot 0).
pub fn render_slots(snapshot: &LobbySnapshot, config: &RenderConfig, now: DateTime<Utc>) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(snapshot.lobbies.len() + 1);
    slots.push(overview_slot(snapshot, config, now));
    slots.extend(
        snapshot
            .lobbies
            .iter()
            .filter(|lobby| !lobby.lobby_type.is_private())
            .map(|lobby| Slot::with_embed(lobby_embed(lobby, config))),
    );
    slots
}

fn overview_slot(snapshot: &LobbySnapshot, config: &RenderConfig, now: DateTime<Utc>) -> Slot {
    let Some(player_count) = snapshot.player_count else {
        return Slot::text(format!(
            "**{} lobby data is unavailable!** The board refreshes once the stats source is back.",
            config.game_name
        ));
    };

    let mut text = format!(
        "**__{} lobby status - {} GMT__**",
        config.game_name,
        now.format(CLOCK_FORMAT)
    );
    if player_count == 1 {
        text.push_str(&format!("\n\n**1** person is playing {}.", config.game_name));
    } else {
        text.push_str(&format!(
            "\n\n**{player_count}** people are playing {}.",
            config.game_name
        ));
    }
    if let Some(counts) = snapshot.lobby_counts {
        text.push('\n');
        text.push_str(&lobby_count_message(
            counts.matchmaking_lobbies,
            counts.matchmaking_players,
            "matchmaking",
        ));
        text.push('\n');
        text.push_str(&lobby_count_message(
            counts.custom_game_lobbies,
            counts.custom_game_players,
            "custom game",
        ));
    }
    Slot::text(text)
}

pub fn lobby_count_message(lobby_count: u32, player_count: u32, lobby_kind: &str) -> String {
    match player_count {
        0 => format!("**There are no {lobby_kind} lobbies!**"),
        1 => format!("**1** player is in a {lobby_kind} lobby."),
        _ => format!(
            "**{player_count}** players are in **{lobby_count}** {lobby_kind} {}.",
            if lobby_count > 1 { "lobbies" } else { "lobby" }
        ),
    }
}

fn lobby_embed(lobby: &LobbyInfo, config: &RenderConfig) -> Embed {
    let mut embed = Embed {
        title: Some(lobby.name.clone()),
        color: Some(LOBBY_COLOUR),
        ..Embed::default()
    }
    .field(
        "Players",
        format!("{}/{}", lobby.player_count, config.lobby_capacity),
        true,
    )
    .field("Type", lobby.lobby_type.label(), true);

    embed.description = Some(if lobby.lobby_type.is_private() {
        "Private lobby".to_string()
    } else {
        format!("steam://joinlobby/{}/{}", config.steam_app_id, lobby.id)
    });

    let Some(state) = lobby.state else {
        embed.description = Some("Lobby initialising...".to_string());
        return embed;
    };

    let (event, map) = match &lobby.match_mode {
        Some(mode) => (mode.event.as_str(), mode.map.as_str()),
        None => (UNKNOWN_FIELD, UNKNOWN_FIELD),
    };
    embed
        .field("Activity", activity(state, lobby.race_progress, lobby.countdown), true)
        .field("Event", event, true)
        .field("Map", map, true)
        .field(
            "Difficulty",
            lobby
                .difficulty
                .map(|difficulty| difficulty.label())
                .unwrap_or(UNKNOWN_FIELD),
            true,
        )
}

fn activity(state: LobbyState, race_progress: u32, countdown: u32) -> String {
    match state {
        LobbyState::Lobby if countdown > 0 => format!("Starting in {countdown}s"),
        LobbyState::Lobby => "In lobby".to_string(),
        LobbyState::Racing => format!("Racing ({}% complete)", race_progress.min(100)),
        LobbyState::Results => "Viewing results".to_string(),
    }
}
