//! Failure classification and the shared error-display state.
//!
//! [`classify`] and [`classify_validation`] are pure. [`ErrorHandler`] records
//! their output, feeds the notification store and announces expired sessions
//! on the session bus instead of touching credentials itself.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use serde_json::{json, Value};
use shared::error::{ApiErrorDescriptor, ErrorCode, ValidationErrorEntry};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::{
    notifications::NotificationStore,
    session::{SessionEvent, SessionEvents},
    transport::TransportFailure,
};

pub const DEFAULT_ERROR_AUTO_HIDE: Duration = Duration::from_secs(10);

const UNEXPECTED_FAILURE: &str = "An unexpected error occurred";
const NETWORK_FAILURE: &str = "Network connection error. Please check your internet connection.";
const BODY_MESSAGE_FIELDS: [&str; 3] = ["message", "error", "detail"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

pub fn classify(failure: &TransportFailure, context: Option<&str>) -> ApiErrorDescriptor {
    classify_with_connectivity(failure, context, Connectivity::Online)
}

/// Same as [`classify`], with the platform's online/offline report as an input.
pub fn classify_with_connectivity(
    failure: &TransportFailure,
    context: Option<&str>,
    connectivity: Connectivity,
) -> ApiErrorDescriptor {
    if let TransportFailure::Response { status, body } = failure {
        return classify_response(*status, body.as_ref(), context);
    }

    if failure.is_network() || connectivity == Connectivity::Offline {
        return ApiErrorDescriptor::new(ErrorCode::NetworkError, NETWORK_FAILURE)
            .with_status(0)
            .with_details(json!({ "context": context }));
    }

    let message = failure.own_message().unwrap_or(UNEXPECTED_FAILURE);
    ApiErrorDescriptor::new(ErrorCode::UnknownError, message).with_details(json!({
        "context": context,
        "originalError": failure.to_string(),
    }))
}

fn classify_response(
    status: u16,
    body: Option<&Value>,
    context: Option<&str>,
) -> ApiErrorDescriptor {
    let body_message = body.and_then(extract_error_message);
    let prefer_body = |fallback: &str| body_message.unwrap_or(fallback).to_string();

    let (code, message, with_body) = match status {
        400 => (
            ErrorCode::BadRequest,
            prefer_body("Invalid request. Please check your input."),
            true,
        ),
        401 => (
            ErrorCode::Unauthorized,
            "Authentication required. Please log in again.".to_string(),
            false,
        ),
        403 => (
            ErrorCode::Forbidden,
            "You do not have permission to perform this action.".to_string(),
            false,
        ),
        404 => (
            ErrorCode::NotFound,
            "The requested resource was not found.".to_string(),
            false,
        ),
        422 => (
            ErrorCode::ValidationError,
            prefer_body("Validation failed. Please check your input."),
            true,
        ),
        429 => (
            ErrorCode::RateLimited,
            "Too many requests. Please wait a moment and try again.".to_string(),
            false,
        ),
        500 => (
            ErrorCode::ServerError,
            "Server error. Please try again later.".to_string(),
            false,
        ),
        _ => {
            let message = match body_message {
                Some(detail) => format!("Request failed with status {status}. {detail}"),
                None => format!("Request failed with status {status}."),
            };
            (ErrorCode::HttpError, message, true)
        }
    };

    let details = if with_body {
        json!({ "context": context, "responseData": body })
    } else {
        json!({ "context": context })
    };

    ApiErrorDescriptor::new(code, message)
        .with_status(status)
        .with_details(details)
}

/// Picks a human-readable message out of an error body: a bare string body,
/// or the first non-empty `message`, `error` or `detail` string field.
pub fn extract_error_message(body: &Value) -> Option<&str> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.as_str()),
        Value::Object(fields) => BODY_MESSAGE_FIELDS.iter().find_map(|key| {
            fields
                .get(*key)
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
        }),
        _ => None,
    }
}

/// Per-field validation messages of a 422 response, flattened in response order.
pub fn classify_validation(failure: &TransportFailure) -> Vec<ValidationErrorEntry> {
    let TransportFailure::Response {
        status: 422,
        body: Some(body),
    } = failure
    else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    if let Some(Value::Object(fields)) = body.get("errors") {
        for (field, messages) in fields {
            match messages {
                Value::String(message) => {
                    entries.push(ValidationErrorEntry::new(field.as_str(), message.as_str()));
                }
                Value::Array(items) => entries.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|message| ValidationErrorEntry::new(field.as_str(), message)),
                ),
                _ => {}
            }
        }
    }

    if entries.is_empty() {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            entries.push(ValidationErrorEntry::new(
                ValidationErrorEntry::GENERAL_FIELD,
                message,
            ));
        }
    }

    entries
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorState {
    pub errors: Vec<ApiErrorDescriptor>,
    pub validation_errors: Vec<ValidationErrorEntry>,
    pub visible: bool,
}

#[derive(Clone)]
pub struct ErrorHandler {
    shared: Arc<HandlerShared>,
}

struct HandlerShared {
    notifications: NotificationStore,
    session: SessionEvents,
    auto_hide: Duration,
    offline: AtomicBool,
    state: Mutex<HandlerState>,
    feed: watch::Sender<ErrorState>,
}

#[derive(Default)]
struct HandlerState {
    view: ErrorState,
    hide_timer: Option<JoinHandle<()>>,
    // Bumped on every reschedule or clear; a timer acts only on its own generation.
    hide_generation: u64,
}

impl ErrorHandler {
    pub fn new(
        notifications: NotificationStore,
        session: SessionEvents,
        auto_hide: Duration,
    ) -> Self {
        let (feed, _) = watch::channel(ErrorState::default());
        Self {
            shared: Arc::new(HandlerShared {
                notifications,
                session,
                auto_hide,
                offline: AtomicBool::new(false),
                state: Mutex::new(HandlerState::default()),
                feed,
            }),
        }
    }

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        self.shared
            .offline
            .store(connectivity == Connectivity::Offline, Ordering::Relaxed);
    }

    pub fn connectivity(&self) -> Connectivity {
        if self.shared.offline.load(Ordering::Relaxed) {
            Connectivity::Offline
        } else {
            Connectivity::Online
        }
    }

    /// Classifies and records a failure. Never fails; the descriptor is returned
    /// for call sites that want to branch on it.
    pub fn handle_error(
        &self,
        failure: &TransportFailure,
        context: Option<&str>,
    ) -> ApiErrorDescriptor {
        let descriptor = classify_with_connectivity(failure, context, self.connectivity());
        error!(
            code = %descriptor.code,
            status = ?descriptor.http_status,
            context = context.unwrap_or("-"),
            message = %descriptor.message,
            "request failed"
        );

        self.record(descriptor.clone(), context);
        if !matches!(descriptor.http_status, Some(401 | 403)) {
            self.schedule_auto_hide();
        }
        descriptor
    }

    /// Replaces the per-field validation entries with those of `failure`. A
    /// non-empty set also produces one summarized global error.
    pub fn handle_validation_error(
        &self,
        failure: &TransportFailure,
        context: Option<&str>,
    ) -> Vec<ValidationErrorEntry> {
        let entries = classify_validation(failure);
        {
            let mut state = self.shared.lock();
            state.view.validation_errors = entries.clone();
            self.shared.publish(&state);
        }

        if !entries.is_empty() {
            let summary = entries
                .iter()
                .map(|entry| entry.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let descriptor = ApiErrorDescriptor::new(
                ErrorCode::ValidationError,
                format!("Validation failed: {summary}"),
            )
            .with_status(422)
            .with_details(json!({ "context": context, "validationErrors": entries }));
            warn!(context = context.unwrap_or("-"), fields = entries.len(), "validation failed");
            self.record(descriptor, context);
            self.schedule_auto_hide();
        }

        entries
    }

    pub fn clear_errors(&self) {
        let mut state = self.shared.lock();
        state.hide_generation = state.hide_generation.wrapping_add(1);
        if let Some(timer) = state.hide_timer.take() {
            timer.abort();
        }
        state.view = ErrorState::default();
        self.shared.publish(&state);
    }

    pub fn clear_error(&self, index: usize) {
        let mut state = self.shared.lock();
        if index < state.view.errors.len() {
            state.view.errors.remove(index);
        }
        if state.view.errors.is_empty() {
            state.view.visible = false;
        }
        self.shared.publish(&state);
    }

    pub fn clear_validation_errors(&self) {
        let mut state = self.shared.lock();
        state.view.validation_errors.clear();
        self.shared.publish(&state);
    }

    pub fn has_field_error(&self, field: &str) -> bool {
        self.shared
            .lock()
            .view
            .validation_errors
            .iter()
            .any(|entry| entry.field == field)
    }

    pub fn field_error(&self, field: &str) -> Option<String> {
        self.shared
            .lock()
            .view
            .validation_errors
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.message.clone())
    }

    pub fn state(&self) -> ErrorState {
        self.shared.lock().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ErrorState> {
        self.shared.feed.subscribe()
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.shared.notifications
    }

    fn record(&self, descriptor: ApiErrorDescriptor, context: Option<&str>) {
        let expired = descriptor.code == ErrorCode::Unauthorized;
        self.shared.notifications.error(descriptor.message.clone());
        {
            let mut state = self.shared.lock();
            state.view.errors.push(descriptor);
            state.view.visible = true;
            self.shared.publish(&state);
        }

        if expired {
            self.shared.session.publish(SessionEvent::AuthExpired {
                context: context.map(str::to_string),
            });
        }
    }

    fn schedule_auto_hide(&self) {
        let mut state = self.shared.lock();
        state.hide_generation = state.hide_generation.wrapping_add(1);
        if let Some(timer) = state.hide_timer.take() {
            timer.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; error banner will not auto-hide");
            return;
        };
        let delay = self.shared.auto_hide;
        let generation = state.hide_generation;
        let handler: Weak<HandlerShared> = Arc::downgrade(&self.shared);
        state.hide_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(handler) = handler.upgrade() {
                handler.auto_hide(generation);
            }
        }));
    }
}

impl HandlerShared {
    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &HandlerState) {
        self.feed.send_replace(state.view.clone());
    }

    // Hides the banner only; recorded errors stay until cleared. A timer that
    // woke after being replaced finds a newer generation and does nothing.
    fn auto_hide(&self, generation: u64) {
        let mut state = self.lock();
        if state.hide_generation != generation {
            debug!(generation, "stale auto-hide timer ignored");
            return;
        }
        state.hide_timer = None;
        if state.view.visible {
            debug!("auto-hiding error banner");
            state.view.visible = false;
            self.publish(&state);
        }
    }
}

impl Drop for HandlerShared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.hide_timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/error_handler_tests.rs"]
mod tests;
