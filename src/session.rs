//! Chat session controller.
//!
//! Owns the session state (collection list, selection, conversation, pending
//! flag, draft) and is the only thing that changes the selection. All methods
//! take `&self`: the state sits behind a mutex that is never held across an
//! `.await`, so a selection change can race an in-flight load, and does.
//!
//! # Stale loads
//!
//! Every history load is issued with a [`LoadTicket`] naming the collection
//! it targets and the generation it was issued at. Issuing a load, changing
//! the selection and deleting the selected collection all advance the
//! generation. A load commits only if its ticket is still current, so only
//! the latest intent ever reaches the conversation. Superseded loads are left
//! to finish and their results dropped.
//!
//! # Ask cycle
//!
//! `ask` → save (awaited) → reload, where the reload happens for every
//! outcome but only while the asked collection is still selected. Leaving
//! `Pending` always clears the pending flag and the draft, including when the
//! future is dropped.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ask::{validate_question, AskOutcome, AskPhase, AskPipeline};
use crate::backend::Backend;
use crate::directory::{Confirm, DirectoryClient};
use crate::error::{ClientError, ValidationError};
use crate::history::HistoryClient;
use crate::models::Message;
use crate::render::{render_conversation, RenderedMessage};
use crate::view_state::ViewStateStore;

/// Identifies one issued history load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub collection: String,
    pub generation: u64,
}

/// How a delete request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined at the confirmation gate. Nothing was sent.
    Cancelled,
    /// A delete of the same collection is already in flight. Nothing was sent.
    AlreadyInProgress,
    /// The backend refused; the message is meant for the user.
    Rejected(String),
    /// The request failed in transit. Logged; the directory is unchanged.
    Failed(ClientError),
}

/// Read-only copy of the session state for a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub collections: Vec<String>,
    pub selected: String,
    pub messages: Vec<Message>,
    pub pending: bool,
    pub draft: String,
}

#[derive(Debug, Default)]
struct SessionState {
    collections: Vec<String>,
    selected: String,
    messages: Vec<Message>,
    pending: bool,
    draft: String,
    phase: AskPhase,
    generation: u64,
    scroll_requested: bool,
    deleting: BTreeSet<String>,
}

impl SessionState {
    fn issue_ticket(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            collection: self.selected.clone(),
            generation: self.generation,
        }
    }

    /// A ticket for `collection`, or `None` if it is no longer selected.
    fn ticket_for(&mut self, collection: &str) -> Option<LoadTicket> {
        if self.selected == collection {
            Some(self.issue_ticket())
        } else {
            None
        }
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation && ticket.collection == self.selected
    }

    fn forget_collection(&mut self, id: &str) {
        self.collections.retain(|c| c != id);
        if self.selected == id {
            self.selected.clear();
            self.messages.clear();
            self.generation += 1;
            self.scroll_requested = true;
        }
    }
}

pub struct ChatSession {
    directory: DirectoryClient,
    history: HistoryClient,
    pipeline: AskPipeline,
    view_state: Arc<dyn ViewStateStore>,
    state: Mutex<SessionState>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, view_state: Arc<dyn ViewStateStore>) -> Self {
        Self {
            directory: DirectoryClient::new(backend.clone()),
            history: HistoryClient::new(backend.clone()),
            pipeline: AskPipeline::new(backend),
            view_state,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap()
    }

    /// Entry point of a view: fetch the directory once, select `initial`
    /// (e.g. from a deep link; nothing by default) and return the scroll
    /// offset last recorded for it.
    pub async fn mount(&self, initial: Option<&str>) -> Option<u32> {
        self.refresh_collections().await;
        self.select_collection(initial.unwrap_or_default()).await;
        self.restore_scroll()
    }

    /// Re-fetch the collection list. A failure leaves an empty list.
    pub async fn refresh_collections(&self) {
        let collections = match self.directory.list_collections().await {
            Ok(collections) => collections,
            Err(e) => {
                warn!(error = %e, "failed to list collections");
                Vec::new()
            }
        };
        self.lock().collections = collections;
    }

    /// Select `id` and load its history. Switching to a different collection
    /// empties the conversation right away; results of loads issued before
    /// this call are discarded.
    pub async fn select_collection(&self, id: &str) {
        let ticket = {
            let mut state = self.lock();
            if state.selected != id {
                state.selected = id.to_string();
                state.messages.clear();
                state.scroll_requested = true;
            }
            state.issue_ticket()
        };
        self.load(ticket).await;
    }

    /// Reload the history of the current selection.
    pub async fn reload_history(&self) {
        let ticket = self.lock().issue_ticket();
        self.load(ticket).await;
    }

    /// Run a load and commit it if `ticket` is still current. Returns whether
    /// it was committed.
    async fn load(&self, ticket: LoadTicket) -> bool {
        let result = self.history.load_history(&ticket.collection).await;

        let mut state = self.lock();
        if !state.is_current(&ticket) {
            debug!(
                collection = %ticket.collection,
                generation = ticket.generation,
                "discarding stale history load"
            );
            return false;
        }
        state.messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                warn!(collection = %ticket.collection, error = %e, "failed to load history");
                Vec::new()
            }
        };
        state.scroll_requested = true;
        true
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    /// Ask the current draft.
    pub async fn submit(&self) -> Result<AskOutcome, ValidationError> {
        let draft = self.lock().draft.clone();
        self.ask(&draft).await
    }

    /// Ask `question` in the selected collection.
    ///
    /// Refused without any request when the question is blank, nothing is
    /// selected or another question is pending. Otherwise the outcome is
    /// returned after the exchange was saved (if answered) and the history
    /// reloaded.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome, ValidationError> {
        validate_question(question)?;
        let (collection, prior) = {
            let mut state = self.lock();
            if state.selected.is_empty() {
                return Err(ValidationError::NoCollectionSelected);
            }
            state.phase.begin()?;
            state.pending = true;
            (state.selected.clone(), state.messages.clone())
        };
        let _pending = PendingGuard { session: self };

        let outcome = self.pipeline.run(question, &collection, &prior).await;
        self.lock().phase.settle(&outcome);

        let ticket = self.lock().ticket_for(&collection);
        match ticket {
            Some(ticket) => {
                self.load(ticket).await;
            }
            None => debug!(%collection, "selection changed during ask, not reloading"),
        }

        Ok(outcome)
    }

    /// Delete `id` once `confirm` agrees. On success it leaves the directory
    /// and, if selected, the selection.
    pub async fn delete_collection<C>(&self, id: &str, confirm: &C) -> DeleteOutcome
    where
        C: Confirm + ?Sized,
    {
        let prompt = format!("Delete collection '{}'? This cannot be undone.", id);
        if !confirm.confirm(&prompt) {
            return DeleteOutcome::Cancelled;
        }
        if !self.lock().deleting.insert(id.to_string()) {
            debug!(collection = id, "delete already in progress");
            return DeleteOutcome::AlreadyInProgress;
        }

        let result = self.directory.delete_collection(id).await;

        let mut state = self.lock();
        state.deleting.remove(id);
        match result {
            Ok(_) => {
                info!(collection = id, "collection deleted");
                state.forget_collection(id);
                DeleteOutcome::Deleted
            }
            Err(ClientError::Backend(message)) => {
                warn!(collection = id, error = %message, "backend refused delete");
                DeleteOutcome::Rejected(message)
            }
            Err(e) => {
                warn!(collection = id, error = %e, "failed to delete collection");
                DeleteOutcome::Failed(e)
            }
        }
    }

    /// Whether the conversation changed since the last call, i.e. whether
    /// the view should scroll to the latest message.
    pub fn take_scroll_request(&self) -> bool {
        std::mem::take(&mut self.lock().scroll_requested)
    }

    /// Remember the reading position in the selected collection. Ignored
    /// while nothing is selected.
    pub fn record_scroll(&self, offset: u32) {
        let selected = self.lock().selected.clone();
        if selected.is_empty() {
            return;
        }
        if let Err(e) = self.view_state.save_offset(&selected, offset) {
            warn!(collection = %selected, error = %e, "failed to persist scroll offset");
        }
    }

    /// The reading position last recorded for the selected collection.
    pub fn restore_scroll(&self) -> Option<u32> {
        let selected = self.lock().selected.clone();
        self.view_state.load_offset(&selected)
    }

    pub fn selected(&self) -> String {
        self.lock().selected.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn collections(&self) -> Vec<String> {
        self.lock().collections.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn phase(&self) -> AskPhase {
        self.lock().phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            collections: state.collections.clone(),
            selected: state.selected.clone(),
            messages: state.messages.clone(),
            pending: state.pending,
            draft: state.draft.clone(),
        }
    }

    pub fn render(&self) -> Vec<RenderedMessage> {
        render_conversation(&self.lock().messages)
    }
}

/// Clears the pending flag and the draft when an ask leaves `Pending`,
/// however it leaves.
struct PendingGuard<'a> {
    session: &'a ChatSession,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.session.state.lock() {
            state.pending = false;
            state.draft.clear();
            state.phase.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{Endpoint, MemoryBackend};
    use crate::view_state::MemoryViewState;

    fn session(backend: &Arc<MemoryBackend>) -> ChatSession {
        ChatSession::new(backend.clone(), Arc::new(MemoryViewState::new()))
    }

    #[tokio::test]
    async fn scroll_without_selection_is_not_recorded() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        let view_state = Arc::new(MemoryViewState::new());
        let session = ChatSession::new(backend, view_state.clone());
        session.mount(None).await;

        session.record_scroll(5);

        assert_eq!(view_state.load_offset(""), None);
        session.select_collection("alpha").await;
        session.record_scroll(2);
        assert_eq!(view_state.load_offset("alpha"), Some(2));
    }

    #[tokio::test]
    async fn mount_without_selection_loads_no_history() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha", "beta"]));
        let session = session(&backend);

        assert_eq!(session.mount(None).await, None);
        assert_eq!(session.collections(), vec!["alpha", "beta"]);
        assert_eq!(session.selected(), "");
        assert_eq!(backend.call_count(Endpoint::ListCollections), 1);
        assert_eq!(backend.call_count(Endpoint::ChatHistory), 0);
    }

    #[tokio::test]
    async fn listing_failure_leaves_an_empty_directory() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        backend.fail(
            Endpoint::ListCollections,
            ClientError::Network("refused".to_string()),
        );
        let session = session(&backend);

        session.mount(Some("alpha")).await;
        assert!(session.collections().is_empty());
        assert_eq!(session.selected(), "alpha");
    }

    #[tokio::test]
    async fn history_failure_falls_back_to_empty_conversation() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_history("alpha", vec![Message::user("hi")]);
        let session = session(&backend);
        session.select_collection("alpha").await;
        assert_eq!(session.messages().len(), 1);

        backend.fail(Endpoint::ChatHistory, ClientError::Network("down".to_string()));
        session.reload_history().await;
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn scroll_request_is_raised_once_per_commit() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        let session = session(&backend);

        session.select_collection("alpha").await;
        assert!(session.take_scroll_request());
        assert!(!session.take_scroll_request());
    }

    #[tokio::test]
    async fn ask_requires_a_selection() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        let session = session(&backend);

        let err = session.ask("hello?").await.unwrap_err();
        assert_eq!(err, ValidationError::NoCollectionSelected);
        assert!(backend.calls().is_empty());
        assert!(!session.is_pending());
    }

    #[tokio::test]
    async fn dropped_ask_still_clears_pending_state() {
        let backend = Arc::new(MemoryBackend::with_collections(["alpha"]));
        backend.set_history_latency("alpha", std::time::Duration::from_secs(60));
        let session = session(&backend);
        session.lock().selected = "alpha".to_string();
        session.set_draft("q");

        let ask = session.submit();
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(50), ask).await;
        assert!(timed_out.is_err());
        assert!(!session.is_pending());
        assert_eq!(session.phase(), AskPhase::Idle);
        assert_eq!(session.snapshot().draft, "");
    }
}
