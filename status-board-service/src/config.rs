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

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use lobby_common::{RenderConfig, expand_env_vars};
use tracing::{info, warn};

use crate::{
    discord::DEFAULT_API_BASE_URL,
    session::{DEFAULT_RECONNECT_DELAY, TokenFile},
};

const MIN_REFRESH_SECONDS: u64 = 5;

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: Option<String>,
    pub token_path: PathBuf,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub snapshot_url: Option<String>,
    pub refresh_interval: Duration,
    pub reconnect_delay: Duration,
    pub bind_addr: SocketAddr,
    pub render_config_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let refresh_seconds = parse_u64(value("STATUS_REFRESH_SECONDS"), "STATUS_REFRESH_SECONDS", 60)?;
        if refresh_seconds < MIN_REFRESH_SECONDS {
            warn!(
                requested = refresh_seconds,
                minimum = MIN_REFRESH_SECONDS,
                "STATUS_REFRESH_SECONDS below minimum; clamping"
            );
        }

        Ok(Self {
            discord_token: value("DISCORD_TOKEN"),
            token_path: PathBuf::from(
                value("DISCORD_TOKEN_PATH").unwrap_or_else(|| "token.txt".to_string()),
            ),
            api_base_url: value("DISCORD_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            request_timeout: Duration::from_millis(parse_u64(
                value("DISCORD_REQUEST_TIMEOUT_MS"),
                "DISCORD_REQUEST_TIMEOUT_MS",
                10_000,
            )?),
            snapshot_url: value("LOBBY_SNAPSHOT_URL"),
            refresh_interval: Duration::from_secs(refresh_seconds.max(MIN_REFRESH_SECONDS)),
            reconnect_delay: Duration::from_secs(parse_u64(
                value("SESSION_RECONNECT_DELAY_SECONDS"),
                "SESSION_RECONNECT_DELAY_SECONDS",
                DEFAULT_RECONNECT_DELAY.as_secs(),
            )?),
            bind_addr: parse_bind_addr(value("STATUS_BOARD_BIND"), "STATUS_BOARD_BIND", "0.0.0.0:8095")?,
            render_config_path: value("STATUS_BOARD_RENDER_CONFIG_PATH"),
        })
    }

    pub fn token_file(&self) -> TokenFile {
        TokenFile::new(self.token_path.clone())
    }

    /// The stored credential if there is one, otherwise `DISCORD_TOKEN`.
    pub fn resolve_credential(&self) -> anyhow::Result<String> {
        let token_file = self.token_file();
        if let Some(token) = token_file.load()? {
            info!(path = %token_file.path().display(), "using credential from token file");
            return Ok(token);
        }

        self.discord_token.clone().with_context(|| {
            format!(
                "no credential available: {} is missing or empty and DISCORD_TOKEN is not set",
                token_file.path().display()
            )
        })
    }
}

fn parse_u64(value: Option<String>, var_name: &str, default: u64) -> anyhow::Result<u64> {
    match value {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid {var_name}: {value}")),
        None => Ok(default),
    }
}

fn parse_bind_addr(value: Option<String>, var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = value.unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

pub fn parse_render_config(raw: &str) -> anyhow::Result<RenderConfig> {
    let expanded = expand_env_vars(raw);
    serde_yaml::from_str(&expanded).context("failed to parse render config yaml")
}

/// Render config from the optional YAML file; any problem falls back to
/// defaults.
pub fn load_render_config(path: Option<&str>) -> RenderConfig {
    let Some(path) = path else {
        return RenderConfig::default();
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read render config path");
            return RenderConfig::default();
        }
    };

    match parse_render_config(&raw) {
        Ok(config) => {
            info!(
                path = %path,
                game_name = %config.game_name,
                steam_app_id = config.steam_app_id,
                "loaded render config"
            );
            config
        }
        Err(error) => {
            warn!(path = %path, error = %format!("{error:#}"), "ignoring render config");
            RenderConfig::default()
        }
    }
}
