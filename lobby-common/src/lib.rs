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

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

pub mod render;

pub use render::{RenderConfig, lobby_count_message, render_slots};

/// Body used for slots that have nothing to say; the platform rejects empty
/// message bodies.
pub const BLANK_SLOT_TEXT: &str = "** **";
pub const DEFAULT_LOBBY_CAPACITY: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyType {
    Matchmaking,
    CustomGame,
    PrivateCustomGame,
}

impl LobbyType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Matchmaking => "Matchmaking",
            Self::CustomGame => "Custom game",
            Self::PrivateCustomGame => "Private custom game",
        }
    }

    pub fn is_private(self) -> bool {
        matches!(self, Self::PrivateCustomGame)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyState {
    Lobby,
    Racing,
    Results,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Expert => "Expert",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchMode {
    pub event: String,
    pub map: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbyCounts {
    pub matchmaking_lobbies: u32,
    pub matchmaking_players: u32,
    pub custom_game_lobbies: u32,
    pub custom_game_players: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbyInfo {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub lobby_type: LobbyType,
    pub player_count: u32,
    /// `None` until the lobby has published its first state.
    #[serde(default)]
    pub state: Option<LobbyState>,
    /// Race completion in percent.
    #[serde(default)]
    pub race_progress: u32,
    /// Seconds left on the pre-race countdown, zero when none is running.
    #[serde(default)]
    pub countdown: u32,
    #[serde(default)]
    pub match_mode: Option<MatchMode>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

/// One lobby-activity reading from the game-stats source.
///
/// Counts the source could not determine are `None`. On the wire a missing
/// value, `null`, or any negative number means "unknown".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbySnapshot {
    #[serde(default, deserialize_with = "known_count")]
    pub player_count: Option<u32>,
    #[serde(default, deserialize_with = "known_lobby_counts")]
    pub lobby_counts: Option<LobbyCounts>,
    #[serde(default)]
    pub lobbies: Vec<LobbyInfo>,
}

impl LobbySnapshot {
    /// Snapshot used when the source could not be reached at all.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn matchmaking_players(&self) -> Option<u32> {
        self.lobby_counts
            .as_ref()
            .map(|counts| counts.matchmaking_players)
    }
}

fn known_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| u32::try_from(value).ok()))
}

#[derive(Deserialize)]
struct RawLobbyCounts {
    matchmaking_lobbies: i64,
    matchmaking_players: i64,
    custom_game_lobbies: i64,
    custom_game_players: i64,
}

fn known_lobby_counts<'de, D>(deserializer: D) -> Result<Option<LobbyCounts>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<RawLobbyCounts>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let field = |value: i64| u32::try_from(value).ok();
    let counts = || {
        Some(LobbyCounts {
            matchmaking_lobbies: field(raw.matchmaking_lobbies)?,
            matchmaking_players: field(raw.matchmaking_players)?,
            custom_game_lobbies: field(raw.custom_game_lobbies)?,
            custom_game_players: field(raw.custom_game_players)?,
        })
    };
    Ok(counts())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich embed in the shape the chat platform accepts on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

/// One unit of status-board content at a stable index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub text: String,
    pub embed: Option<Embed>,
}

impl Slot {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embed: None,
        }
    }

    pub fn with_embed(embed: Embed) -> Self {
        Self {
            text: BLANK_SLOT_TEXT.to_string(),
            embed: Some(embed),
        }
    }
}

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is a valid regex")
});

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}
