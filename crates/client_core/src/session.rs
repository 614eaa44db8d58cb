//! Session lifecycle: credential storage, login/logout and the reaction to
//! expired sessions announced on the [`SessionEvents`] bus.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use shared::protocol::TokenAcquireRequest;
use thiserror::Error;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{api::ApiClient, transport::TransportFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server rejected the stored credential.
    AuthExpired { context: Option<String> },
    LoggedIn,
    LoggedOut,
}

#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("session event dropped; no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("credential storage at '{path}' failed: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportFailure),
    #[error("server returned an empty token")]
    EmptyToken,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>, SessionError>;
    async fn save(&self, token: &str) -> Result<(), SessionError>;
    async fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.token.lock().await.clone())
    }

    async fn save(&self, token: &str) -> Result<(), SessionError> {
        *self.token.lock().await = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.token.lock().await.take();
        Ok(())
    }
}

#[cfg(unix)]
const CREDENTIAL_FILE_MODE: u32 = 0o600;

/// Keeps the bearer token in a single file, readable by the owner only on unix.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: io::Error) -> SessionError {
        SessionError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.storage_error(error)),
        }
    }

    async fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| self.storage_error(error))?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(CREDENTIAL_FILE_MODE);
        let mut file = options
            .open(&self.path)
            .await
            .map_err(|error| self.storage_error(error))?;

        // The open mode only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let owner_only = std::fs::Permissions::from_mode(CREDENTIAL_FILE_MODE);
            file.set_permissions(owner_only)
                .await
                .map_err(|error| self.storage_error(error))?;
        }

        file.write_all(token.as_bytes())
            .await
            .map_err(|error| self.storage_error(error))?;
        file.flush().await.map_err(|error| self.storage_error(error))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.storage_error(error)),
        }
    }
}

/// Moves the UI to its login screen.
pub trait Navigator: Send + Sync {
    fn navigate_to_login(&self);
}

pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate_to_login(&self) {
        info!("session expired; login required");
    }
}

pub struct SessionManager {
    api: ApiClient,
    credentials: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    events: SessionEvents,
    device_name: String,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        events: SessionEvents,
        device_name: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            credentials,
            navigator,
            events,
            device_name: device_name.into(),
        })
    }

    /// Acquires a fresh token (wiping older ones server-side) and stores it.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, SessionError> {
        let request = TokenAcquireRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_name: self.device_name.clone(),
            wipe_tokens: true,
        };
        let acquired = self.api.acquire_token(&request).await?;
        if acquired.token.is_empty() {
            return Err(SessionError::EmptyToken);
        }

        self.credentials.save(&acquired.token).await?;
        info!(
            device = %self.device_name,
            active_tokens = ?acquired.active_tokens,
            "authentication successful"
        );
        self.events.publish(SessionEvent::LoggedIn);
        Ok(acquired.token)
    }

    /// Revokes server-side tokens. The local credential is cleared even when
    /// the server call fails.
    pub async fn logout(&self) -> Result<(), SessionError> {
        if let Err(error) = self.api.wipe_tokens().await {
            error!(%error, "logout request failed");
        }
        self.credentials.clear().await?;
        self.events.publish(SessionEvent::LoggedOut);
        Ok(())
    }

    pub async fn token(&self) -> Result<Option<String>, SessionError> {
        self.credentials.load().await
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.credentials.load().await, Ok(Some(_)))
    }

    pub async fn handle_auth_expired(&self, context: Option<&str>) {
        warn!(context = context.unwrap_or("-"), "authentication expired");
        if let Err(error) = self.credentials.clear().await {
            error!(%error, "failed to clear stored credential");
        }
        self.navigator.navigate_to_login();
    }

    /// Reacts to [`SessionEvent::AuthExpired`] until the returned task is aborted.
    pub fn spawn_expiry_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.events.subscribe();
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::AuthExpired { context }) => {
                        session.handle_auth_expired(context.as_deref()).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session listener lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
