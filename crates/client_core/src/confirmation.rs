//! Yes/no questions asked through a modal and answered asynchronously.
//!
//! A caller awaits [`ConfirmationCoordinator::trigger`]; the modal renders the
//! coordinator's [`ConfirmationRequest`] and calls [`ConfirmationCoordinator::resolve`]
//! from its button handlers. Requests are served one at a time in FIFO order,
//! so every caller receives the answer to its own question.

use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll},
};

use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tracing::debug;

pub trait ConfirmationChoice: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    fn label(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteChoice {
    Cancel,
    Delete,
}

impl ConfirmationChoice for DeleteChoice {
    fn label(self) -> &'static str {
        match self {
            DeleteChoice::Cancel => "cancel",
            DeleteChoice::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveChoice {
    Stay,
    Leave,
}

impl ConfirmationChoice for LeaveChoice {
    fn label(self) -> &'static str {
        match self {
            LeaveChoice::Stay => "stay",
            LeaveChoice::Leave => "leave",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    #[error("confirmation request was abandoned before it was answered")]
    Abandoned,
}

/// What the modal renders. `title` and `description` keep the last question
/// after it is answered; `result` is cleared whenever a new question shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest<C> {
    pub visible: bool,
    pub title: String,
    pub description: String,
    pub result: Option<C>,
    /// Requests waiting behind the visible one.
    pub queued: usize,
}

impl<C> Default for ConfirmationRequest<C> {
    fn default() -> Self {
        Self {
            visible: false,
            title: String::new(),
            description: String::new(),
            result: None,
            queued: 0,
        }
    }
}

/// Settles with the answer to one triggered question.
#[must_use = "the answer is only observed by awaiting the confirmation"]
pub struct PendingConfirmation<C> {
    answer: oneshot::Receiver<C>,
}

impl<C> Future for PendingConfirmation<C> {
    type Output = Result<C, ConfirmationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.answer)
            .poll(cx)
            .map(|answer| answer.map_err(|_| ConfirmationError::Abandoned))
    }
}

struct PendingRequest<C> {
    title: String,
    description: String,
    responder: oneshot::Sender<C>,
}

struct CoordinatorState<C> {
    queue: VecDeque<PendingRequest<C>>,
    view: ConfirmationRequest<C>,
}

pub struct ConfirmationCoordinator<C: ConfirmationChoice> {
    name: &'static str,
    state: Mutex<CoordinatorState<C>>,
    feed: watch::Sender<ConfirmationRequest<C>>,
}

impl<C: ConfirmationChoice> ConfirmationCoordinator<C> {
    pub fn new(name: &'static str) -> Self {
        let (feed, _) = watch::channel(ConfirmationRequest::default());
        Self {
            name,
            state: Mutex::new(CoordinatorState {
                queue: VecDeque::new(),
                view: ConfirmationRequest::default(),
            }),
            feed,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queues a question and returns a future that settles exactly once with
    /// the user's answer. The question is registered before this returns, even
    /// if the future is polled later.
    pub fn trigger(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> PendingConfirmation<C> {
        let (responder, answer) = oneshot::channel();
        {
            let mut state = self.lock();
            state.queue.push_back(PendingRequest {
                title: title.into(),
                description: description.into(),
                responder,
            });
            if state.queue.len() == 1 {
                Self::show_head(&mut state);
            } else {
                let queued = state.queue.len() - 1;
                debug!(coordinator = self.name, queued, "confirmation queued");
            }
            self.publish(&mut state);
        }

        PendingConfirmation { answer }
    }

    /// Answers the visible question. Returns `false` when nothing is pending.
    pub fn resolve(&self, choice: C) -> bool {
        let mut state = self.lock();
        let Some(answered) = state.queue.pop_front() else {
            debug!(coordinator = self.name, choice = choice.label(), "no pending confirmation");
            return false;
        };

        debug!(coordinator = self.name, choice = choice.label(), "confirmation resolved");
        if answered.responder.send(choice).is_err() {
            debug!(coordinator = self.name, "confirmation caller went away");
        }
        state.view.result = Some(choice);

        // Callers that dropped their future no longer need an answer.
        while state
            .queue
            .front()
            .is_some_and(|pending| pending.responder.is_closed())
        {
            state.queue.pop_front();
        }
        if !state.queue.is_empty() {
            Self::show_head(&mut state);
        }
        self.publish(&mut state);
        true
    }

    pub fn snapshot(&self) -> ConfirmationRequest<C> {
        self.lock().view.clone()
    }

    pub fn is_pending(&self) -> bool {
        !self.lock().queue.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConfirmationRequest<C>> {
        self.feed.subscribe()
    }

    /// Drops every pending request; their callers observe
    /// [`ConfirmationError::Abandoned`].
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let abandoned = state.queue.len();
        state.queue.clear();
        if abandoned > 0 {
            debug!(coordinator = self.name, abandoned, "pending confirmations abandoned");
        }
        self.publish(&mut state);
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_head(state: &mut CoordinatorState<C>) {
        if let Some(head) = state.queue.front() {
            state.view.title = head.title.clone();
            state.view.description = head.description.clone();
            state.view.result = None;
        }
    }

    fn publish(&self, state: &mut CoordinatorState<C>) {
        state.view.visible = !state.queue.is_empty();
        state.view.queued = state.queue.len().saturating_sub(1);
        self.feed.send_replace(state.view.clone());
    }
}

pub type DeleteConfirmation = ConfirmationCoordinator<DeleteChoice>;

impl ConfirmationCoordinator<DeleteChoice> {
    pub fn for_delete() -> Self {
        Self::new("delete")
    }

    pub fn cancel(&self) -> bool {
        self.resolve(DeleteChoice::Cancel)
    }

    pub fn confirm_delete(&self) -> bool {
        self.resolve(DeleteChoice::Delete)
    }
}

impl Default for ConfirmationCoordinator<DeleteChoice> {
    fn default() -> Self {
        Self::for_delete()
    }
}

/// Leave-without-saving guard. Tracks whether the current form is dirty.
pub struct UnsavedChangesConfirmation {
    coordinator: ConfirmationCoordinator<LeaveChoice>,
    pending_changes: AtomicBool,
}

impl UnsavedChangesConfirmation {
    pub fn new() -> Self {
        Self {
            coordinator: ConfirmationCoordinator::new("unsaved-changes"),
            pending_changes: AtomicBool::new(false),
        }
    }

    pub fn trigger(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> PendingConfirmation<LeaveChoice> {
        self.coordinator.trigger(title, description)
    }

    pub fn resolve(&self, choice: LeaveChoice) -> bool {
        self.coordinator.resolve(choice)
    }

    pub fn stay(&self) -> bool {
        self.resolve(LeaveChoice::Stay)
    }

    pub fn leave(&self) -> bool {
        self.resolve(LeaveChoice::Leave)
    }

    pub fn add_change(&self) {
        self.pending_changes.store(true, Ordering::Relaxed);
    }

    pub fn reset_changes(&self) {
        self.pending_changes.store(false, Ordering::Relaxed);
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_changes.load(Ordering::Relaxed)
    }

    /// Asks only when there are unsaved changes. Leaving discards them.
    pub async fn confirm_leave(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<LeaveChoice, ConfirmationError> {
        if !self.has_pending_changes() {
            return Ok(LeaveChoice::Leave);
        }
        let choice = self.trigger(title, description).await?;
        if choice == LeaveChoice::Leave {
            self.reset_changes();
        }
        Ok(choice)
    }

    pub fn snapshot(&self) -> ConfirmationRequest<LeaveChoice> {
        self.coordinator.snapshot()
    }

    pub fn is_pending(&self) -> bool {
        self.coordinator.is_pending()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConfirmationRequest<LeaveChoice>> {
        self.coordinator.subscribe()
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown()
    }
}

impl Default for UnsavedChangesConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/confirmation_tests.rs"]
mod tests;
