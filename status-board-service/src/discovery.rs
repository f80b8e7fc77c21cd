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

use tracing::info;

use crate::platform::{
    Channel, ChatPlatformClient, GuildId, Operation, RemoteResultExt, StepFailure,
};

pub const STATUS_CHANNEL_SUFFIX: &str = "-in-matchmaking";
const UNKNOWN_COUNT: &str = "xx";

pub fn status_channel_name(matchmaking_players: Option<u32>) -> String {
    match matchmaking_players {
        Some(players) => format!("{players}{STATUS_CHANNEL_SUFFIX}"),
        None => format!("{UNKNOWN_COUNT}{STATUS_CHANNEL_SUFFIX}"),
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredChannel {
    pub channel: Channel,
    /// Set when no status channel existed and one was created.
    pub created: bool,
}

/// Find the guild's status channel, creating one if it has none.
///
/// The first text channel whose name ends with the status suffix wins, in
/// whatever order the platform lists them.
pub async fn discover_status_channel(
    client: &dyn ChatPlatformClient,
    guild_id: GuildId,
) -> Result<DiscoveredChannel, StepFailure> {
    let channels = client
        .list_text_channels(guild_id)
        .await
        .during(Operation::ListTextChannels)?;
    if let Some(channel) = channels
        .into_iter()
        .find(|channel| channel.name.ends_with(STATUS_CHANNEL_SUFFIX))
    {
        info!(guild_id = %guild_id, channel_id = %channel.id, channel_name = %channel.name, "found existing status channel");
        return Ok(DiscoveredChannel {
            channel,
            created: false,
        });
    }

    let channel = client
        .create_text_channel(guild_id, &status_channel_name(None))
        .await
        .during(Operation::CreateTextChannel)?;
    info!(guild_id = %guild_id, channel_id = %channel.id, "created status channel");
    Ok(DiscoveredChannel {
        channel,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;

    #[test]
    fn channel_name_encodes_matchmaking_players() {
        assert_eq!(status_channel_name(Some(12)), "12-in-matchmaking");
        assert_eq!(status_channel_name(Some(0)), "0-in-matchmaking");
        assert_eq!(status_channel_name(None), "xx-in-matchmaking");
    }

    #[tokio::test]
    async fn first_matching_channel_wins() {
        let platform = FakePlatform::new();
        let guild = platform.add_guild(1, "Racers");
        platform.add_channel(guild, "general");
        let first = platform.add_channel(guild, "4-in-matchmaking");
        platform.add_channel(guild, "xx-in-matchmaking");

        let discovered = discover_status_channel(&platform, guild).await.unwrap();

        assert!(!discovered.created);
        assert_eq!(discovered.channel.id, first);
        assert_eq!(platform.calls(Operation::CreateTextChannel), 0);
    }

    #[tokio::test]
    async fn suffix_match_is_case_sensitive() {
        let platform = FakePlatform::new();
        let guild = platform.add_guild(1, "Racers");
        platform.add_channel(guild, "4-IN-MATCHMAKING");

        let discovered = discover_status_channel(&platform, guild).await.unwrap();

        assert!(discovered.created);
        assert_eq!(discovered.channel.name, "xx-in-matchmaking");
        assert_eq!(platform.channels(guild).len(), 2);
    }

    #[tokio::test]
    async fn listing_failure_creates_nothing() {
        let platform = FakePlatform::new();
        let guild = platform.add_guild(1, "Racers");
        platform.fail(Operation::ListTextChannels, Some(guild), Some(50001), None);

        let failure = discover_status_channel(&platform, guild).await.unwrap_err();

        assert_eq!(failure.operation, Operation::ListTextChannels);
        assert_eq!(failure.source.code, Some(50001));
        assert_eq!(platform.calls(Operation::CreateTextChannel), 0);
        assert!(platform.channels(guild).is_empty());
    }
}
