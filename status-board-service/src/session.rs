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

use std::{
    collections::VecDeque,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::platform::{ChatPlatformClient, LogLevel, SessionEvent};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    Start,
    LoggedIn,
    LoggedOut,
    LoginFailed,
    ReconnectDue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    Login,
    PersistCredential,
    ScheduleReconnect,
}

/// Session lifecycle as a pure function of phase and input.
///
/// A failed login ends that attempt without scheduling another one; only a
/// session lost after a successful login is retried.
pub fn transition(phase: SessionPhase, input: SessionInput) -> (SessionPhase, Option<SessionEffect>) {
    use SessionEffect::*;
    use SessionInput::*;
    use SessionPhase::*;

    match (phase, input) {
        (Disconnected, Start | ReconnectDue) => (Connecting, Some(Login)),
        (Connecting | Disconnected, LoggedIn) => (Connected, Some(PersistCredential)),
        (Connecting, LoginFailed) => (Disconnected, None),
        (Connected, LoggedOut) => (Disconnected, Some(ScheduleReconnect)),
        (phase, _) => (phase, None),
    }
}

/// The raw credential string, persisted once a login has been confirmed.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error)
                .with_context(|| format!("failed to read token file {}", self.path.display())),
        }
    }

    pub fn save(&self, token: &str) -> anyhow::Result<()> {
        std::fs::write(&self.path, token)
            .with_context(|| format!("failed to write token file {}", self.path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub connected: bool,
    pub token: String,
}

pub struct SessionManager {
    client: Arc<dyn ChatPlatformClient>,
    token_file: TokenFile,
    reconnect_delay: Duration,
    state: SessionState,
    connected_tx: watch::Sender<bool>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn ChatPlatformClient>,
        token: String,
        token_file: TokenFile,
        reconnect_delay: Duration,
    ) -> Self {
        let (connected_tx, _) = watch::channel(false);
        Self {
            client,
            token_file,
            reconnect_delay,
            state: SessionState {
                connected: false,
                token,
            },
            connected_tx,
        }
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    /// Log in and keep the session alive until `shutdown` flips to true.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.client.subscribe();
        let mut phase = SessionPhase::Disconnected;
        let mut pending = VecDeque::from([SessionInput::Start]);
        let mut reconnect_at: Option<Instant> = None;

        loop {
            while let Some(input) = pending.pop_front() {
                let (next, effect) = transition(phase, input);
                if next != phase {
                    debug!(from = ?phase, to = ?next, ?input, "session phase changed");
                    phase = next;
                    self.state.connected = phase == SessionPhase::Connected;
                    self.connected_tx.send_replace(self.state.connected);
                }
                match effect {
                    Some(SessionEffect::Login) => {
                        if let Some(input) = self.login().await {
                            pending.push_back(input);
                        }
                    }
                    Some(SessionEffect::PersistCredential) => self.persist_credential(),
                    Some(SessionEffect::ScheduleReconnect) => {
                        warn!(
                            delay_seconds = self.reconnect_delay.as_secs_f64(),
                            "logged out of chat platform; logging back in after delay"
                        );
                        reconnect_at = Some(Instant::now() + self.reconnect_delay);
                    }
                    None => {}
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.shutdown().await;
                        return;
                    }
                }
                event = events.recv() => match event {
                    Ok(SessionEvent::LoggedIn) => pending.push_back(SessionInput::LoggedIn),
                    Ok(SessionEvent::LoggedOut) => pending.push_back(SessionInput::LoggedOut),
                    Ok(SessionEvent::Log { level, message }) => log_platform_message(level, &message),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session event stream lagged");
                    }
                    Err(RecvError::Closed) => {
                        warn!("session event stream closed; stopping session manager");
                        return;
                    }
                },
                _ = sleep_until(reconnect_at), if reconnect_at.is_some() => {
                    reconnect_at = None;
                    pending.push_back(SessionInput::ReconnectDue);
                }
            }
        }
    }

    async fn login(&self) -> Option<SessionInput> {
        info!("logging into chat platform");
        match self.client.login(&self.state.token).await {
            // Confirmation arrives as a LoggedIn session event.
            Ok(()) => None,
            Err(error) => {
                error!(
                    code = ?error.code,
                    status = ?error.status,
                    error = %error,
                    "failed to log into chat platform"
                );
                Some(SessionInput::LoginFailed)
            }
        }
    }

    fn persist_credential(&self) {
        info!("logged into chat platform");
        match self.token_file.save(&self.state.token) {
            Ok(()) => info!(path = %self.token_file.path().display(), "saved token file"),
            Err(error) => warn!(error = %error, "failed to save token file"),
        }
    }

    async fn shutdown(&mut self) {
        info!("session manager shutting down");
        self.state.connected = false;
        self.connected_tx.send_replace(false);
        if let Err(error) = self.client.logout().await {
            warn!(error = %error, "logout failed during shutdown");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn log_platform_message(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!(target: "chat_platform", "{message}"),
        LogLevel::Info => info!(target: "chat_platform", "{message}"),
        LogLevel::Warn => warn!(target: "chat_platform", "{message}"),
        LogLevel::Error => error!(target: "chat_platform", "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Operation;
    use crate::testing::FakePlatform;
    use uuid::Uuid;

    fn temp_token_file() -> TokenFile {
        TokenFile::new(std::env::temp_dir().join(format!("status-board-token-{}.txt", Uuid::new_v4())))
    }

    #[test]
    fn start_and_reconnect_trigger_login() {
        assert_eq!(
            transition(SessionPhase::Disconnected, SessionInput::Start),
            (SessionPhase::Connecting, Some(SessionEffect::Login))
        );
        assert_eq!(
            transition(SessionPhase::Disconnected, SessionInput::ReconnectDue),
            (SessionPhase::Connecting, Some(SessionEffect::Login))
        );
    }

    #[test]
    fn login_confirmation_persists_credential() {
        assert_eq!(
            transition(SessionPhase::Connecting, SessionInput::LoggedIn),
            (SessionPhase::Connected, Some(SessionEffect::PersistCredential))
        );
    }

    #[test]
    fn login_failure_is_not_retried() {
        assert_eq!(
            transition(SessionPhase::Connecting, SessionInput::LoginFailed),
            (SessionPhase::Disconnected, None)
        );
    }

    #[test]
    fn session_loss_schedules_reconnect() {
        assert_eq!(
            transition(SessionPhase::Connected, SessionInput::LoggedOut),
            (SessionPhase::Disconnected, Some(SessionEffect::ScheduleReconnect))
        );
    }

    #[test]
    fn irrelevant_inputs_do_nothing() {
        assert_eq!(
            transition(SessionPhase::Disconnected, SessionInput::LoggedOut),
            (SessionPhase::Disconnected, None)
        );
        assert_eq!(
            transition(SessionPhase::Connected, SessionInput::Start),
            (SessionPhase::Connected, None)
        );
        assert_eq!(
            transition(SessionPhase::Connecting, SessionInput::ReconnectDue),
            (SessionPhase::Connecting, None)
        );
    }

    #[test]
    fn token_file_round_trips_raw_string() {
        let file = temp_token_file();
        assert_eq!(file.load().unwrap(), None);

        file.save("abc.def.ghi").unwrap();

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "abc.def.ghi");
        assert_eq!(file.load().unwrap(), Some("abc.def.ghi".to_string()));
        std::fs::remove_file(file.path()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_each_session_loss() {
        let platform = Arc::new(FakePlatform::new());
        let token_file = temp_token_file();
        let manager = SessionManager::new(
            platform.clone(),
            "secret".to_string(),
            token_file.clone(),
            DEFAULT_RECONNECT_DELAY,
        );
        let connected = manager.connected();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(manager.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(*connected.borrow());
        assert_eq!(platform.calls(Operation::Login), 1);
        assert_eq!(token_file.load().unwrap(), Some("secret".to_string()));

        for expected_logins in 2..=3 {
            platform.emit(SessionEvent::LoggedOut);
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(!*connected.borrow());
            assert_eq!(platform.calls(Operation::Login), expected_logins - 1);

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(*connected.borrow());
            assert_eq!(platform.calls(Operation::Login), expected_logins);
        }

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(platform.calls(Operation::Logout), 1);
        std::fs::remove_file(token_file.path()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_stays_disconnected() {
        let platform = Arc::new(FakePlatform::new());
        platform.fail_logins(1);
        let token_file = temp_token_file();
        let manager = SessionManager::new(
            platform.clone(),
            "bad".to_string(),
            token_file.clone(),
            DEFAULT_RECONNECT_DELAY,
        );
        let connected = manager.connected();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(manager.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!*connected.borrow());
        assert_eq!(platform.calls(Operation::Login), 1);
        assert_eq!(token_file.load().unwrap(), None);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
