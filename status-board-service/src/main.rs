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

mod classify;
mod compactor;
mod config;
mod discord;
mod discovery;
mod engine;
mod platform;
mod registry;
mod session;
mod source;
mod sync;
#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lobby_common::LobbySnapshot;
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    config::{Settings, load_render_config},
    discord::DiscordRestClient,
    engine::{PassOutcome, PassReport, ReconciliationEngine},
    platform::ChatPlatformClient,
    registry::POOL_CAPACITY,
    session::SessionManager,
    source::{HttpSnapshotSource, SnapshotSource},
};

#[derive(Clone)]
struct AppState {
    engine: Arc<ReconciliationEngine>,
    connected: watch::Receiver<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "status_board_service=debug,tower_http=info".to_string()),
        )
        .init();

    let settings = Settings::from_env()?;
    let credential = settings.resolve_credential()?;
    let render_config = load_render_config(settings.render_config_path.as_deref());

    let client: Arc<dyn ChatPlatformClient> = Arc::new(DiscordRestClient::new(
        settings.api_base_url.clone(),
        settings.request_timeout,
    )?);
    let engine = Arc::new(ReconciliationEngine::new(
        client.clone(),
        render_config,
        POOL_CAPACITY,
    ));

    let session = SessionManager::new(
        client,
        credential,
        settings.token_file(),
        settings.reconnect_delay,
    );
    let connected = session.connected();
    let (session_shutdown_tx, session_shutdown_rx) = watch::channel(false);
    let (refresh_shutdown_tx, refresh_shutdown_rx) = watch::channel(false);
    let session_task = tokio::spawn(session.run(session_shutdown_rx));

    let refresh_task = match &settings.snapshot_url {
        Some(url) => {
            let source = Arc::new(HttpSnapshotSource::new(url.clone(), settings.request_timeout)?);
            info!(
                url = %url,
                refresh_seconds = settings.refresh_interval.as_secs(),
                "polling lobby snapshots"
            );
            Some(tokio::spawn(run_refresh_loop(
                engine.clone(),
                source,
                settings.refresh_interval,
                connected.clone(),
                refresh_shutdown_rx,
            )))
        }
        None => {
            info!("LOBBY_SNAPSHOT_URL not set; status boards update only via POST /v1/snapshots");
            None
        }
    };

    let app = build_router(AppState { engine, connected });
    info!(bind_addr = %settings.bind_addr, "status-board-service listening");
    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("status-board-service shutting down");
    let _ = refresh_shutdown_tx.send(true);
    if let Some(task) = refresh_task {
        if let Err(error) = task.await {
            warn!(error = %error, "refresh loop ended abnormally");
        }
    }
    let _ = session_shutdown_tx.send(true);
    if let Err(error) = session_task.await {
        warn!(error = %error, "session manager ended abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
    }
}

/// Poll `source` every `period` and reconcile with what it returns.
///
/// Ticks are skipped while the session is down; a pass runs as soon as it
/// comes back.
async fn run_refresh_loop(
    engine: Arc<ReconciliationEngine>,
    source: Arc<dyn SnapshotSource>,
    period: Duration,
    mut connected: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut session_alive = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = connected.changed(), if session_alive => {
                if changed.is_err() {
                    session_alive = false;
                    continue;
                }
                if !*connected.borrow_and_update() {
                    continue;
                }
                info!("session connected; refreshing status boards");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
                continue;
            }
        }

        if !*connected.borrow() {
            debug!("session not connected; skipping status refresh");
            continue;
        }

        let snapshot = source.fetch().await;
        match engine.reconcile(&snapshot).await {
            PassOutcome::Completed(report) => debug!(
                pass_id = %report.pass_id,
                guilds = report.guilds.len(),
                fully_synced = report.fully_synced(),
                "status refresh finished"
            ),
            PassOutcome::Skipped => debug!("status refresh skipped"),
        }
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/snapshots", post(snapshot_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let connected = *state.connected.borrow();
    Json(serde_json::json!({
        "ok": true,
        "service": "status-board-service",
        "connected": connected,
    }))
}

async fn snapshot_handler(
    State(state): State<AppState>,
    Json(snapshot): Json<LobbySnapshot>,
) -> Result<Json<PassReport>, ApiError> {
    pass_response(state.engine.reconcile(&snapshot).await)
}

fn pass_response(outcome: PassOutcome) -> Result<Json<PassReport>, ApiError> {
    match outcome {
        PassOutcome::Completed(report) => Ok(Json(report)),
        PassOutcome::Skipped => Err(ApiError::conflict(
            "a reconciliation pass is already in flight",
        )),
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
