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

use std::cmp::Ordering;

use tracing::info;

use crate::platform::{
    ChannelId, ChatPlatformClient, Message, MessageId, Operation, RemoteResultExt, StepFailure,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionPlan {
    pub keep: Vec<Message>,
    pub delete: Vec<MessageId>,
}

/// Decide which of the bot's messages survive as the board's pool.
///
/// More than `capacity` keeps the oldest `capacity`; fewer than `capacity`
/// keeps nothing so the board is rebuilt in a known order; exactly
/// `capacity` keeps everything.
pub fn plan_compaction(mut messages: Vec<Message>, capacity: usize) -> CompactionPlan {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    match messages.len().cmp(&capacity) {
        Ordering::Greater => {
            let excess = messages.split_off(capacity);
            CompactionPlan {
                keep: messages,
                delete: excess.iter().map(|message| message.id).collect(),
            }
        }
        Ordering::Less => CompactionPlan {
            keep: Vec::new(),
            delete: messages.iter().map(|message| message.id).collect(),
        },
        Ordering::Equal => CompactionPlan {
            keep: messages,
            delete: Vec::new(),
        },
    }
}

pub async fn compact_pool(
    client: &dyn ChatPlatformClient,
    channel_id: ChannelId,
    capacity: usize,
) -> Result<Vec<Message>, StepFailure> {
    let messages = client
        .list_messages_authored_by_self(channel_id)
        .await
        .during(Operation::ListMessages)?;
    let found = messages.len();
    let plan = plan_compaction(messages, capacity);
    if !plan.delete.is_empty() {
        client
            .delete_messages(channel_id, &plan.delete)
            .await
            .during(Operation::DeleteMessages)?;
    }
    info!(
        channel_id = %channel_id,
        found,
        kept = plan.keep.len(),
        deleted = plan.delete.len(),
        "compacted status message pool"
    );
    Ok(plan.keep)
}
