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
use lobby_common::LobbySnapshot;
use tracing::{debug, warn};

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The latest snapshot, or `LobbySnapshot::unavailable()` when it could
    /// not be obtained.
    async fn fetch(&self) -> LobbySnapshot;
}

pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build snapshot http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn try_fetch(&self) -> anyhow::Result<LobbySnapshot> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("failed to call lobby snapshot endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("lobby snapshot endpoint returned {status}: {body}");
        }

        response
            .json::<LobbySnapshot>()
            .await
            .context("invalid lobby snapshot response")
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> LobbySnapshot {
        match self.try_fetch().await {
            Ok(snapshot) => {
                debug!(
                    url = %self.url,
                    player_count = ?snapshot.player_count,
                    lobbies = snapshot.lobbies.len(),
                    "fetched lobby snapshot"
                );
                snapshot
            }
            Err(error) => {
                warn!(url = %self.url, error = %format!("{error:#}"), "lobby snapshot unavailable");
                LobbySnapshot::unavailable()
            }
        }
    }
}
