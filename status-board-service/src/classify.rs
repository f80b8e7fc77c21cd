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

use serde::Serialize;

use crate::platform::RemoteOperationError;

const UNKNOWN_CHANNEL: u32 = 10003;
const UNKNOWN_GUILD: u32 = 10004;
const UNKNOWN_MESSAGE: u32 = 10008;
const MISSING_ACCESS: u32 = 50001;
const MISSING_PERMISSIONS: u32 = 50013;

/// Recovery action for a failed platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    /// The status channel, guild, or one of its messages no longer exists.
    Gone,
    Forbidden,
    Transient,
}

impl FailureClass {
    /// Whether the guild's registry entry must be dropped so the next pass
    /// rediscovers and rebuilds it.
    pub fn drops_entry(self) -> bool {
        matches!(self, Self::Gone | Self::Forbidden)
    }
}

pub fn classify(error: &RemoteOperationError) -> FailureClass {
    match error.code {
        Some(UNKNOWN_CHANNEL | UNKNOWN_GUILD | UNKNOWN_MESSAGE) => FailureClass::Gone,
        Some(MISSING_ACCESS | MISSING_PERMISSIONS) => FailureClass::Forbidden,
        _ => FailureClass::Transient,
    }
}
