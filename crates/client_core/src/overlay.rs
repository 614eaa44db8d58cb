//! Full-screen blocking loading indicator.
//!
//! Plain [`LoadingOverlay::show`]/[`LoadingOverlay::hide`] are not nested: the
//! last hide wins. Overlapping operations that need nesting take a
//! [`LoadingTicket`] with [`LoadingOverlay::hold`] instead; the overlay stays up
//! while any ticket is alive.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

pub const DEFAULT_LOADING_TEXT: &str = "Loading...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub visible: bool,
    pub message: String,
    pub disabled: bool,
    pub active_holds: usize,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            visible: false,
            message: DEFAULT_LOADING_TEXT.to_string(),
            disabled: false,
            active_holds: 0,
        }
    }
}

#[derive(Clone)]
pub struct LoadingOverlay {
    shared: Arc<OverlayShared>,
}

struct OverlayShared {
    state: Mutex<OverlayInner>,
    feed: watch::Sender<OverlayState>,
}

#[derive(Default)]
struct OverlayInner {
    view: OverlayState,
    shown: bool,
}

impl LoadingOverlay {
    pub fn new() -> Self {
        let (feed, _) = watch::channel(OverlayState::default());
        Self {
            shared: Arc::new(OverlayShared {
                state: Mutex::new(OverlayInner::default()),
                feed,
            }),
        }
    }

    /// Ignored while disabled.
    pub fn show(&self, text: impl Into<String>) {
        let mut inner = self.shared.lock();
        if inner.view.disabled {
            tracing::trace!("loading overlay disabled; show ignored");
            return;
        }
        inner.view.message = text.into();
        inner.shown = true;
        self.shared.publish(&mut inner);
    }

    pub fn show_default(&self) {
        self.show(DEFAULT_LOADING_TEXT);
    }

    /// Keeps the message for the next show.
    pub fn hide(&self) {
        let mut inner = self.shared.lock();
        inner.shown = false;
        self.shared.publish(&mut inner);
    }

    /// Suppresses every later show until [`LoadingOverlay::enable`], and hides now.
    pub fn disable(&self) {
        let mut inner = self.shared.lock();
        inner.view.disabled = true;
        inner.shown = false;
        self.shared.publish(&mut inner);
    }

    pub fn enable(&self) {
        let mut inner = self.shared.lock();
        inner.view.disabled = false;
        self.shared.publish(&mut inner);
    }

    pub fn hold(&self, text: impl Into<String>) -> LoadingTicket {
        let mut inner = self.shared.lock();
        inner.view.active_holds += 1;
        if !inner.view.disabled {
            inner.view.message = text.into();
        }
        self.shared.publish(&mut inner);
        LoadingTicket {
            overlay: Arc::downgrade(&self.shared),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.shared.lock().view.visible
    }

    pub fn snapshot(&self) -> OverlayState {
        self.shared.lock().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.shared.feed.subscribe()
    }
}

impl Default for LoadingOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayShared {
    fn lock(&self) -> MutexGuard<'_, OverlayInner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &mut OverlayInner) {
        inner.view.visible = !inner.view.disabled && (inner.shown || inner.view.active_holds > 0);
        self.feed.send_replace(inner.view.clone());
    }
}

/// Keeps the overlay visible until dropped.
#[must_use = "the overlay hides again as soon as the ticket is dropped"]
pub struct LoadingTicket {
    overlay: Weak<OverlayShared>,
}

impl Drop for LoadingTicket {
    fn drop(&mut self) {
        if let Some(overlay) = self.overlay.upgrade() {
            let mut inner = overlay.lock();
            inner.view.active_holds = inner.view.active_holds.saturating_sub(1);
            overlay.publish(&mut inner);
        }
    }
}
