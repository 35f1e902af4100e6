//! Session driver
//!
//! Owns the current state, mints tickets, runs the backend call and
//! executes the effects the transition function asks for.

use super::backend::{BackendError, ChatBackend};
use super::effect::Effect;
use super::event::Event;
use super::state::{SessionState, Ticket};
use super::transition::{transition, TransitionError};
use crate::model::{new_id, now_millis, Analysis, ChatRequest, ChatResponse, Message};
use crate::store::AnalysisStore;
use thiserror::Error;

/// Dialogue length from which the client offers tree generation
pub const TREE_PROMPT_MESSAGES: usize = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Session did not schedule a backend call")]
    NoCall,
}

/// A backend call the caller must run and report back via
/// [`Session::complete`]
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub ticket: Ticket,
    pub request: ChatRequest,
}

pub struct Session<B> {
    backend: B,
    store: Option<AnalysisStore>,
    state: SessionState,
    last_error: Option<String>,
    next_ticket: Ticket,
}

impl<B: ChatBackend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            store: None,
            state: SessionState::Idle,
            last_error: None,
            next_ticket: 1,
        }
    }

    /// Save finished analyses into `store`
    #[must_use]
    pub fn with_store(mut self, store: AnalysisStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.state.analysis()
    }

    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Most recent chat or validation error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent storage error, kept apart from chat errors
    pub fn persistence_error(&self) -> Option<&str> {
        self.store.as_ref().and_then(AnalysisStore::last_error)
    }

    pub fn store(&self) -> Option<&AnalysisStore> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut AnalysisStore> {
        self.store.as_mut()
    }

    /// Whether the client should offer tree generation right now
    pub fn can_request_tree(&self) -> bool {
        match &self.state {
            SessionState::Active { analysis } | SessionState::ArtifactReady { analysis } => {
                analysis.messages.len() >= TREE_PROMPT_MESSAGES && !analysis.has_tree()
            }
            SessionState::Idle | SessionState::Pending { .. } => false,
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Drop the current analysis. Saved copies are untouched and any reply
    /// still in flight is discarded when it arrives.
    pub fn reset(&mut self) {
        if let Err(error) = self.apply(Event::Reset) {
            tracing::error!(error = %error, "Reset was rejected");
        }
    }

    /// Make a stored analysis the current one
    pub fn resume(&mut self, analysis: Analysis) {
        let analysis_id = analysis.id.clone();
        if let Err(error) = self.apply(Event::Resume { analysis }) {
            tracing::error!(analysis_id = %analysis_id, error = %error, "Resume was rejected");
        }
    }

    /// Append a user message and return the call to run
    pub fn begin_message(&mut self, text: &str) -> Result<PendingCall, SessionError> {
        let ticket = self.mint_ticket();
        let event = Event::UserMessage {
            message: Message::user(text.trim()),
            analysis_id: new_id(),
            ticket,
        };
        self.apply(event)?.ok_or(SessionError::NoCall)
    }

    /// Ask for the cause tree and return the call to run
    pub fn begin_tree(&mut self) -> Result<PendingCall, SessionError> {
        let ticket = self.mint_ticket();
        self.apply(Event::TreeRequested { ticket })?
            .ok_or(SessionError::NoCall)
    }

    /// Feed the outcome of a call back into the session.
    ///
    /// Replies whose ticket is no longer current are discarded and reported
    /// as [`TransitionError::StaleReply`].
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<ChatResponse, BackendError>,
    ) -> Result<(), SessionError> {
        match result {
            Ok(response) => {
                let event = Event::ReplyReceived {
                    ticket,
                    response,
                    at: now_millis(),
                };
                self.apply(event)?;
                Ok(())
            }
            Err(error) => {
                let event = Event::RequestFailed {
                    ticket,
                    message: error.to_string(),
                };
                self.apply(event)?;
                tracing::warn!(ticket, error = %error, "Chat exchange failed");
                Err(SessionError::Backend(error))
            }
        }
    }

    /// Send one user turn and wait for the counselor's reply
    pub async fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let call = self.begin_message(text)?;
        let result = self.backend.exchange(&call.request).await;
        self.complete(call.ticket, result)
    }

    /// Turn the dialogue into a cause tree and return the finished analysis
    pub async fn request_tree(&mut self) -> Result<Analysis, SessionError> {
        let call = self.begin_tree()?;
        let result = self.backend.exchange(&call.request).await;
        self.complete(call.ticket, result)?;
        match &self.state {
            SessionState::ArtifactReady { analysis } => Ok(analysis.clone()),
            _ => Err(SessionError::Rejected(TransitionError::StaleReply {
                ticket: call.ticket,
            })),
        }
    }

    fn mint_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn apply(&mut self, event: Event) -> Result<Option<PendingCall>, SessionError> {
        let result = match transition(&self.state, event) {
            Ok(result) => result,
            Err(error) => return Err(self.reject(error)),
        };
        self.state = result.new_state;

        let mut call = None;
        for effect in result.effects {
            match effect {
                Effect::CallBackend { ticket, request } => {
                    call = Some(PendingCall { ticket, request });
                }
                Effect::PersistAnalysis { analysis } => self.persist(&analysis),
                Effect::SurfaceError { message } => self.last_error = Some(message),
                Effect::ClearError => self.last_error = None,
            }
        }
        Ok(call)
    }

    fn reject(&mut self, error: TransitionError) -> SessionError {
        if error.is_user_facing() {
            self.last_error = Some(error.to_string());
        } else {
            tracing::debug!(error = %error, "Discarding reply");
        }
        SessionError::Rejected(error)
    }

    fn persist(&mut self, analysis: &Analysis) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.save(analysis) {
            Ok(()) => tracing::info!(analysis_id = %analysis.id, "Analysis saved"),
            Err(error) => {
                tracing::warn!(analysis_id = %analysis.id, error = %error, "Failed to save analysis");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorCode, Role};
    use crate::session::state::Phase;
    use crate::session::testing::MockBackend;
    use crate::store::testing::FailingBlobStore;
    use crate::store::SqliteBlobStore;
    use std::sync::Arc;

    fn session() -> (Session<Arc<MockBackend>>, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        (Session::new(backend.clone()), backend)
    }

    fn memory_store() -> AnalysisStore {
        AnalysisStore::open(Box::new(SqliteBlobStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_deadline_dialogue_to_tree() {
        let (session, backend) = session();
        let mut session = session.with_store(memory_store());

        backend.queue_reply("Why do you think you miss them?");
        session.send_message("I keep missing deadlines").await.unwrap();
        assert_eq!(session.state().phase(), Phase::Active);
        assert_eq!(session.analysis().unwrap().title, "I keep missing deadlines");
        assert!(!session.can_request_tree());

        backend.queue_reply("What makes estimating hard?");
        session
            .send_message("I underestimate how long things take")
            .await
            .unwrap();
        assert_eq!(session.messages().len(), 4);
        assert!(session.can_request_tree());

        backend.queue_tree(
            "The why-why analysis is complete. Please check the tree.",
            Some("graph TD;\n  A[Missing deadlines] --> B[Underestimating]"),
        );
        let analysis = session.request_tree().await.unwrap();
        assert_eq!(session.state().phase(), Phase::ArtifactReady);
        assert!(analysis.has_tree());
        assert_eq!(analysis.messages.len(), 4);
        assert!(!session.can_request_tree());

        let requests = backend.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[1].messages.len(), 3);
        assert!(requests[2].should_generate_tree);

        let store = session.store().unwrap();
        assert_eq!(store.get_by_id(&analysis.id), Some(&analysis));
        assert!(session.persistence_error().is_none());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_locally() {
        let (mut session, backend) = session();
        let err = session.send_message("   ").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(TransitionError::EmptyMessage)
        ));
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.last_error().is_some());
        assert!(backend.recorded_requests().is_empty());

        session.clear_error();
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_user_message() {
        let (mut session, backend) = session();
        backend.queue_error(BackendError::Server {
            status: 500,
            code: ErrorCode::GeminiApiError,
            message: "model unavailable".to_string(),
        });

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, SessionError::Backend(_)));
        assert_eq!(session.state().phase(), Phase::Active);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.last_error(), Some("model unavailable"));

        // the next send clears the error
        backend.queue_reply("Tell me more");
        session.send_message("hello again").await.unwrap();
        assert!(session.last_error().is_none());
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_tree_with_short_dialogue_makes_no_call() {
        let (mut session, backend) = session();
        backend.queue_error(BackendError::Transport("offline".to_string()));
        let _ = session.send_message("hello").await;

        let err = session.request_tree().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(TransitionError::InsufficientDialogue { messages: 1 })
        ));
        assert_eq!(backend.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tree_failure_leaves_state() {
        let (mut session, backend) = session();
        backend.queue_reply("Why?");
        session.send_message("hello").await.unwrap();
        let before = session.state().clone();

        backend.queue_error(BackendError::Transport("offline".to_string()));
        assert!(session.request_tree().await.is_err());
        assert_eq!(session.state(), &before);
        assert!(session.last_error().unwrap().contains("offline"));
    }

    #[test]
    fn test_second_begin_while_pending_is_busy() {
        let (mut session, _backend) = session();
        let first = session.begin_message("hello").unwrap();
        assert!(session.is_pending());

        let err = session.begin_message("again").unwrap_err();
        assert!(matches!(err, SessionError::Rejected(TransitionError::Busy)));
        assert_eq!(session.messages().len(), 1);

        let reply = ChatResponse {
            message: Message::assistant("Why?"),
            mermaid_code: None,
        };
        session.complete(first.ticket, Ok(reply)).unwrap();
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_reply_after_reset_is_discarded() {
        let (mut session, _backend) = session();
        let call = session.begin_message("hello").unwrap();
        session.reset();
        assert_eq!(session.state(), &SessionState::Idle);

        let reply = ChatResponse {
            message: Message::assistant("late"),
            mermaid_code: None,
        };
        let err = session.complete(call.ticket, Ok(reply)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(TransitionError::StaleReply { .. })
        ));
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_reply_for_superseded_ticket_is_discarded() {
        let (mut session, _backend) = session();
        let old = session.begin_message("first").unwrap();
        session.reset();
        let new = session.begin_message("second").unwrap();
        assert_ne!(old.ticket, new.ticket);

        let reply = ChatResponse {
            message: Message::assistant("for first"),
            mermaid_code: None,
        };
        assert!(session.complete(old.ticket, Ok(reply)).is_err());
        assert!(session.is_pending());
        assert_eq!(session.analysis().unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_tree_without_diagram_is_not_saved() {
        let (session, backend) = session();
        let mut session = session.with_store(memory_store());
        backend.queue_reply("Why?");
        session.send_message("hello").await.unwrap();

        backend.queue_tree("I could not summarize this yet.", None);
        let analysis = session.request_tree().await.unwrap();
        assert!(!analysis.has_tree());
        assert_eq!(session.state().phase(), Phase::ArtifactReady);
        assert!(session.store().unwrap().list().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_separate() {
        let (session, backend) = session();
        let mut session =
            session.with_store(AnalysisStore::open(Box::new(FailingBlobStore::default())));
        backend.queue_reply("Why?");
        session.send_message("hello").await.unwrap();

        backend.queue_tree("done", Some("graph TD;\n  A[x]"));
        let analysis = session.request_tree().await.unwrap();
        assert!(analysis.has_tree());
        assert_eq!(session.state().phase(), Phase::ArtifactReady);
        assert!(session.last_error().is_none());
        assert!(session.persistence_error().is_some());
    }

    #[tokio::test]
    async fn test_resume_reopens_saved_analysis() {
        let (session, backend) = session();
        let mut session = session.with_store(memory_store());
        backend.queue_reply("Why?");
        session.send_message("hello").await.unwrap();
        backend.queue_tree("done", Some("graph TD;"));
        let saved = session.request_tree().await.unwrap();

        session.reset();
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.store().unwrap().list().len(), 1);

        let stored = session.store().unwrap().get_by_id(&saved.id).cloned().unwrap();
        session.resume(stored);
        assert_eq!(session.state().phase(), Phase::ArtifactReady);
        assert_eq!(session.analysis().unwrap().id, saved.id);
    }
}
