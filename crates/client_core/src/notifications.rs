//! Ordered store of transient user-facing messages.
//!
//! Warning and info messages expire after the store's TTL; each expiry is a
//! task owned by the store and aborted when the message goes away earlier.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use shared::domain::{NotificationId, NotificationMessage, Severity};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NotificationStore {
    shared: Arc<StoreShared>,
}

struct StoreShared {
    ttl: Duration,
    state: Mutex<StoreState>,
    feed: watch::Sender<Vec<NotificationMessage>>,
}

#[derive(Default)]
struct StoreState {
    messages: Vec<NotificationMessage>,
    expiries: HashMap<NotificationId, JoinHandle<()>>,
}

impl NotificationStore {
    pub fn new(ttl: Duration) -> Self {
        let (feed, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(StoreShared {
                ttl,
                state: Mutex::new(StoreState::default()),
                feed,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    pub fn add(&self, severity: Severity, text: impl Into<String>) -> NotificationId {
        let message = NotificationMessage::new(severity, text);
        let id = message.id;

        match severity {
            Severity::Error => error!(%id, text = %message.text, "notification"),
            Severity::Warning => warn!(%id, text = %message.text, "notification"),
            Severity::Info => info!(%id, text = %message.text, "notification"),
        }

        let mut state = self.shared.lock();
        state.messages.push(message);
        if severity.auto_dismisses() {
            if let Some(handle) = self.schedule_expiry(id) {
                state.expiries.insert(id, handle);
            }
        }
        self.shared.publish(&state);
        id
    }

    pub fn error(&self, text: impl Into<String>) -> NotificationId {
        self.add(Severity::Error, text)
    }

    pub fn warning(&self, text: impl Into<String>) -> NotificationId {
        self.add(Severity::Warning, text)
    }

    pub fn info(&self, text: impl Into<String>) -> NotificationId {
        self.add(Severity::Info, text)
    }

    /// Removing an id that is not held is a no-op.
    pub fn remove(&self, id: NotificationId) {
        let mut state = self.shared.lock();
        if let Some(handle) = state.expiries.remove(&id) {
            handle.abort();
        }
        if self.shared.remove_message(&mut state, id) {
            self.shared.publish(&state);
        }
    }

    pub fn clear(&self) {
        let mut state = self.shared.lock();
        for (_, handle) in state.expiries.drain() {
            handle.abort();
        }
        state.messages.clear();
        self.shared.publish(&state);
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.shared.lock().messages.clone()
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.shared.lock().messages.iter().any(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change feed for banner renderers; always holds the current list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<NotificationMessage>> {
        self.shared.feed.subscribe()
    }

    fn schedule_expiry(&self, id: NotificationId) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%id, "no async runtime available; notification will not expire");
            return None;
        };
        let ttl = self.shared.ttl;
        let store: Weak<StoreShared> = Arc::downgrade(&self.shared);
        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(store) = store.upgrade() {
                store.expire(id);
            }
        }))
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl StoreShared {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &StoreState) {
        self.feed.send_replace(state.messages.clone());
    }

    fn remove_message(&self, state: &mut StoreState, id: NotificationId) -> bool {
        match state.messages.iter().position(|m| m.id == id) {
            Some(index) => {
                state.messages.remove(index);
                true
            }
            None => false,
        }
    }

    // Runs on the expiry task itself, so its handle is dropped rather than aborted.
    fn expire(&self, id: NotificationId) {
        let mut state = self.lock();
        state.expiries.remove(&id);
        if self.remove_message(&mut state, id) {
            tracing::debug!(%id, "notification expired");
            self.publish(&state);
        }
    }
}

impl Drop for StoreShared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in state.expiries.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
