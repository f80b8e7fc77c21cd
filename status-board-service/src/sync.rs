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

use lobby_common::{BLANK_SLOT_TEXT, Slot};
use tracing::debug;

use crate::{
    platform::{ChatPlatformClient, Operation, RemoteResultExt, StepFailure},
    registry::GuildStatusEntry,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub edited: usize,
    pub sent: usize,
}

/// Number of board positions a pass writes.
///
/// A freshly provisioned pool is filled to exactly capacity so the board has
/// its full shape from the first pass on. Otherwise positions that held
/// content last pass are rewritten (blank) even if the board shrank.
pub fn sync_count(
    desired: usize,
    last_desired: usize,
    capacity: usize,
    fresh_pool: bool,
) -> usize {
    if fresh_pool {
        capacity
    } else {
        desired.max(last_desired)
    }
}

/// Bring the board in line with `slots`, then rename the channel.
///
/// The rename is sent every pass so a channel renamed by hand is put back.
///
/// Stops at the first failed call. Edits and sends already applied stay in
/// place and newly sent messages are already appended to the entry's pool,
/// so the next pass picks up where this one stopped.
pub async fn sync_slots(
    client: &dyn ChatPlatformClient,
    entry: &mut GuildStatusEntry,
    slots: &[Slot],
    last_desired: usize,
    fresh_pool: bool,
    channel_name: &str,
) -> Result<SyncSummary, StepFailure> {
    let mut summary = SyncSummary::default();
    let count = sync_count(slots.len(), last_desired, entry.capacity, fresh_pool);

    for index in 0..count {
        let (text, embed) = match slots.get(index) {
            Some(slot) => (slot.text.as_str(), slot.embed.as_ref()),
            None => (BLANK_SLOT_TEXT, None),
        };

        if let Some(message) = entry.messages.get(index) {
            client
                .edit_message(message, text, embed)
                .await
                .during(Operation::EditMessage)?;
            summary.edited += 1;
        } else {
            let message = client
                .send_message(entry.channel.id, text, embed)
                .await
                .during(Operation::SendMessage)?;
            entry.messages.push(message);
            summary.sent += 1;
        }
    }

    client
        .rename_channel(entry.channel.id, channel_name)
        .await
        .during(Operation::RenameChannel)?;
    entry.channel.name = channel_name.to_string();

    debug!(
        guild_id = %entry.guild_id,
        channel_id = %entry.channel.id,
        count,
        edited = summary.edited,
        sent = summary.sent,
        "status board synced"
    );
    Ok(summary)
}
