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

use std::sync::Arc;

use chrono::Utc;
use lobby_common::{LobbySnapshot, RenderConfig, Slot, render_slots};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    classify::{FailureClass, classify},
    compactor::compact_pool,
    discovery::{discover_status_channel, status_channel_name},
    platform::{ChannelId, ChatPlatformClient, Guild, GuildId, Operation, StepFailure},
    registry::{GuildStatusEntry, ReconciliationState},
    sync::sync_slots,
};

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub slot_count: usize,
    /// Set when the guild list itself could not be fetched.
    pub guild_listing_error: Option<String>,
    pub guilds: Vec<GuildReport>,
}

impl PassReport {
    pub fn fully_synced(&self) -> bool {
        self.guild_listing_error.is_none()
            && self
                .guilds
                .iter()
                .all(|guild| matches!(guild.outcome, GuildOutcome::Synced { .. }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildReport {
    pub guild_id: GuildId,
    pub guild_name: String,
    pub outcome: GuildOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuildOutcome {
    Synced {
        channel_id: ChannelId,
        provisioned: bool,
        edited: usize,
        sent: usize,
    },
    Failed {
        operation: Operation,
        class: FailureClass,
        code: Option<u32>,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass held the state; nothing was done.
    Skipped,
}

pub struct ReconciliationEngine {
    client: Arc<dyn ChatPlatformClient>,
    render_config: RenderConfig,
    capacity: usize,
    state: Mutex<ReconciliationState>,
}

impl ReconciliationEngine {
    pub fn new(client: Arc<dyn ChatPlatformClient>, render_config: RenderConfig, capacity: usize) -> Self {
        Self {
            client,
            render_config,
            capacity,
            state: Mutex::new(ReconciliationState::default()),
        }
    }

    /// Run one pass for `snapshot` unless a pass is already running.
    pub async fn reconcile(&self, snapshot: &LobbySnapshot) -> PassOutcome {
        let Ok(mut state) = self.state.try_lock() else {
            info!("reconciliation pass already in flight; skipping trigger");
            return PassOutcome::Skipped;
        };

        let slots = render_slots(snapshot, &self.render_config, Utc::now());
        let channel_name = status_channel_name(snapshot.matchmaking_players());
        PassOutcome::Completed(self.run_pass(&mut state, &slots, &channel_name).await)
    }

    async fn run_pass(
        &self,
        state: &mut ReconciliationState,
        slots: &[Slot],
        channel_name: &str,
    ) -> PassReport {
        let pass_id = Uuid::new_v4();
        info!(%pass_id, slot_count = slots.len(), "updating status boards");

        let mut report = PassReport {
            pass_id,
            slot_count: slots.len(),
            guild_listing_error: None,
            guilds: Vec::new(),
        };

        let guilds = match self.client.list_guilds().await {
            Ok(guilds) => guilds,
            Err(error) => {
                warn!(%pass_id, code = ?error.code, error = %error, "failed to list guilds");
                report.guild_listing_error = Some(error.to_string());
                return report;
            }
        };

        for guild in guilds {
            let outcome = self.reconcile_guild(state, &guild, slots, channel_name).await;
            report.guilds.push(GuildReport {
                guild_id: guild.id,
                guild_name: guild.name,
                outcome,
            });
        }

        state.last_desired_slot_count = if report.fully_synced() {
            slots.len()
        } else {
            state.last_desired_slot_count.max(slots.len())
        };
        info!(
            %pass_id,
            guilds = report.guilds.len(),
            tracked = state.registry.len(),
            fully_synced = report.fully_synced(),
            "updated status boards"
        );
        report
    }

    async fn reconcile_guild(
        &self,
        state: &mut ReconciliationState,
        guild: &Guild,
        slots: &[Slot],
        channel_name: &str,
    ) -> GuildOutcome {
        let (mut entry, provisioned) = match state.registry.remove(guild.id) {
            Some(entry) => (entry, false),
            None => {
                info!(guild_id = %guild.id, guild_name = %guild.name, "setting up status channel");
                match self.provision(guild.id).await {
                    Ok(entry) => (entry, true),
                    Err(failure) => return Self::failed(guild, failure, "status channel setup failed"),
                }
            }
        };

        let result = sync_slots(
            self.client.as_ref(),
            &mut entry,
            slots,
            state.last_desired_slot_count,
            provisioned,
            channel_name,
        )
        .await;

        match result {
            Ok(summary) => {
                let channel_id = entry.channel.id;
                state.registry.insert(entry);
                GuildOutcome::Synced {
                    channel_id,
                    provisioned,
                    edited: summary.edited,
                    sent: summary.sent,
                }
            }
            Err(failure) => {
                if !classify(&failure.source).drops_entry() {
                    state.registry.insert(entry);
                }
                Self::failed(guild, failure, "status board update failed")
            }
        }
    }

    async fn provision(&self, guild_id: GuildId) -> Result<GuildStatusEntry, StepFailure> {
        let client = self.client.as_ref();
        let discovered = discover_status_channel(client, guild_id).await?;
        let messages = if discovered.created {
            Vec::new()
        } else {
            compact_pool(client, discovered.channel.id, self.capacity).await?
        };
        Ok(GuildStatusEntry {
            guild_id,
            channel: discovered.channel,
            messages,
            capacity: self.capacity,
        })
    }

    fn failed(guild: &Guild, failure: StepFailure, context: &str) -> GuildOutcome {
        let class = classify(&failure.source);
        match class {
            FailureClass::Gone => warn!(
                guild_id = %guild.id,
                guild_name = %guild.name,
                operation = %failure.operation,
                code = ?failure.source.code,
                error = %failure.source,
                "{context}: status channel is gone; it will be rebuilt next pass"
            ),
            FailureClass::Forbidden => warn!(
                guild_id = %guild.id,
                guild_name = %guild.name,
                operation = %failure.operation,
                code = ?failure.source.code,
                error = %failure.source,
                "{context}: missing permission; it will be rebuilt next pass"
            ),
            FailureClass::Transient => warn!(
                guild_id = %guild.id,
                guild_name = %guild.name,
                operation = %failure.operation,
                code = ?failure.source.code,
                status = ?failure.source.status,
                error = %failure.source,
                "{context}; retrying next pass"
            ),
        }
        GuildOutcome::Failed {
            operation: failure.operation,
            class,
            code: failure.source.code,
            message: failure.source.message,
        }
    }
}
