use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

pub mod api;
pub mod api_status;
pub mod config;
pub mod confirmation;
pub mod error_handler;
pub mod notifications;
pub mod overlay;
pub mod pagination;
pub mod session;
pub mod transport;

pub use api::ApiClient;
pub use api_status::{ApiStatus, ApiStatusMonitor};
pub use config::{load_settings, ClientSettings, SettingsError};
pub use confirmation::{
    ConfirmationError, ConfirmationRequest, DeleteChoice, DeleteConfirmation, LeaveChoice,
    PendingConfirmation, UnsavedChangesConfirmation,
};
pub use error_handler::{classify, classify_validation, Connectivity, ErrorHandler, ErrorState};
pub use notifications::NotificationStore;
pub use overlay::{LoadingOverlay, LoadingTicket};
pub use pagination::{Pagination, PaginationEvent};
pub use session::{
    CredentialStore, FileCredentialStore, LoggingNavigator, MemoryCredentialStore, Navigator,
    SessionError, SessionEvent, SessionEvents, SessionManager,
};
pub use transport::TransportFailure;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] TransportFailure),
}

/// Every UI-wide service, built once at startup and wired together: the error
/// handler feeds the notification store and the session bus, and the session
/// manager reacts to expired credentials reported on that bus.
pub struct ConsoleServices {
    pub settings: ClientSettings,
    pub notifications: NotificationStore,
    pub errors: ErrorHandler,
    pub delete_confirmation: Arc<DeleteConfirmation>,
    pub unsaved_changes: Arc<UnsavedChangesConfirmation>,
    pub overlay: LoadingOverlay,
    pub session_events: SessionEvents,
    pub session: Arc<SessionManager>,
    pub api: ApiClient,
    pub api_status: ApiStatusMonitor,
    expiry_listener: Option<JoinHandle<()>>,
}

impl ConsoleServices {
    /// Uses the credential file from `settings` and a logging navigator.
    /// Must be called from within a Tokio runtime.
    pub fn start(settings: ClientSettings) -> Result<Self, ServicesError> {
        let credentials = Arc::new(FileCredentialStore::new(settings.credential_path.clone()));
        Self::start_with(settings, credentials, Arc::new(LoggingNavigator))
    }

    pub fn start_with(
        settings: ClientSettings,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ServicesError> {
        let base_url = settings.base_url()?;
        let notifications = NotificationStore::new(settings.notification_ttl);
        let session_events = SessionEvents::default();
        let errors = ErrorHandler::new(
            notifications.clone(),
            session_events.clone(),
            settings.error_auto_hide,
        );

        let probe_api =
            ApiClient::new(base_url, Arc::clone(&credentials), settings.request_timeout)?;
        let api = probe_api.clone().with_error_reporting(errors.clone());
        let session = SessionManager::new(
            api.clone(),
            credentials,
            navigator,
            session_events.clone(),
            settings.device_name.clone(),
        );
        let expiry_listener = session.spawn_expiry_listener();

        info!(base_url = %api.base_url(), "console services started");
        Ok(Self {
            notifications,
            errors,
            delete_confirmation: Arc::new(DeleteConfirmation::for_delete()),
            unsaved_changes: Arc::new(UnsavedChangesConfirmation::new()),
            overlay: LoadingOverlay::new(),
            session_events,
            session,
            api,
            api_status: ApiStatusMonitor::new(probe_api),
            expiry_listener: Some(expiry_listener),
            settings,
        })
    }

    /// Stops background tasks and abandons pending confirmations. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(listener) = self.expiry_listener.take() else {
            return;
        };
        listener.abort();
        self.delete_confirmation.shutdown();
        self.unsaved_changes.shutdown();
        self.overlay.disable();
        self.errors.clear_errors();
        self.notifications.clear();
        info!("console services stopped");
    }
}

impl Drop for ConsoleServices {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
