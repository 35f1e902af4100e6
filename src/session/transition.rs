//! Pure state transition function

use super::effect::Effect;
use super::event::Event;
use super::state::{PendingRequest, RequestKind, Resting, SessionState, Ticket};
use crate::model::{Analysis, ChatResponse, Message};
use thiserror::Error;

/// Smallest history a cause tree can be derived from
pub const MIN_TREE_MESSAGES: usize = 2;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Please enter a message")]
    EmptyMessage,
    #[error("The dialogue is too short to build a tree ({messages} messages so far)")]
    InsufficientDialogue { messages: usize },
    #[error("A tree has already been generated for this analysis")]
    TreeAlreadyGenerated,
    #[error("Still waiting for the previous reply")]
    Busy,
    #[error("Reply for ticket {ticket} no longer matches the session")]
    StaleReply { ticket: Ticket },
}

impl TransitionError {
    /// Validation errors are shown to the user; stale replies are not
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, TransitionError::StaleReply { .. })
    }
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; ids, clocks
/// and tickets arrive inside the event.
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Reset and resume are accepted in every state. Any outstanding
        // reply becomes stale because the state no longer holds its ticket.
        (_, Event::Reset) => {
            Ok(TransitionResult::new(SessionState::Idle).with_effect(Effect::ClearError))
        }

        (_, Event::Resume { analysis }) => {
            Ok(TransitionResult::new(SessionState::reopened(analysis))
                .with_effect(Effect::ClearError))
        }

        // ============================================================
        // User messages
        // ============================================================
        (_, Event::UserMessage { message, .. }) if message.content.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        (SessionState::Pending { .. }, Event::UserMessage { .. } | Event::TreeRequested { .. }) => {
            Err(TransitionError::Busy)
        }

        (
            SessionState::Idle,
            Event::UserMessage {
                message,
                analysis_id,
                ticket,
            },
        ) => {
            let analysis = Analysis::new(analysis_id, message.content.clone(), message.timestamp);
            Ok(start_message(analysis, message, ticket, Resting::Active))
        }

        (SessionState::Active { analysis }, Event::UserMessage { message, ticket, .. }) => Ok(
            start_message(analysis.clone(), message, ticket, Resting::Active),
        ),

        (SessionState::ArtifactReady { analysis }, Event::UserMessage { message, ticket, .. }) => {
            Ok(start_message(
                analysis.clone(),
                message,
                ticket,
                Resting::ArtifactReady,
            ))
        }

        // ============================================================
        // Tree requests
        // ============================================================
        (SessionState::Idle, Event::TreeRequested { .. }) => {
            Err(TransitionError::InsufficientDialogue { messages: 0 })
        }

        (SessionState::Active { analysis }, Event::TreeRequested { ticket }) => {
            start_tree(analysis, ticket, Resting::Active)
        }

        (SessionState::ArtifactReady { analysis }, Event::TreeRequested { ticket }) => {
            start_tree(analysis, ticket, Resting::ArtifactReady)
        }

        // ============================================================
        // Backend outcomes
        // ============================================================
        (
            SessionState::Pending { analysis, request },
            Event::ReplyReceived {
                ticket,
                response,
                at,
            },
        ) if request.ticket == ticket => Ok(apply_reply(analysis, request, response, at)),

        (SessionState::Pending { analysis, request }, Event::RequestFailed { ticket, message })
            if request.ticket == ticket =>
        {
            Ok(
                TransitionResult::new(SessionState::resting(analysis.clone(), request.resume))
                    .with_effect(Effect::SurfaceError { message }),
            )
        }

        (_, Event::ReplyReceived { ticket, .. } | Event::RequestFailed { ticket, .. }) => {
            Err(TransitionError::StaleReply { ticket })
        }
    }
}

fn start_message(
    mut analysis: Analysis,
    message: Message,
    ticket: Ticket,
    resume: Resting,
) -> TransitionResult {
    analysis.push_message(message);
    let call = Effect::call_backend(ticket, &analysis, false);
    TransitionResult::new(SessionState::Pending {
        analysis,
        request: PendingRequest {
            ticket,
            kind: RequestKind::Message,
            resume,
        },
    })
    .with_effect(Effect::ClearError)
    .with_effect(call)
}

fn start_tree(
    analysis: &Analysis,
    ticket: Ticket,
    resume: Resting,
) -> Result<TransitionResult, TransitionError> {
    let messages = analysis.messages.len();
    if messages < MIN_TREE_MESSAGES {
        return Err(TransitionError::InsufficientDialogue { messages });
    }
    if analysis.has_tree() {
        return Err(TransitionError::TreeAlreadyGenerated);
    }

    let call = Effect::call_backend(ticket, analysis, true);
    Ok(TransitionResult::new(SessionState::Pending {
        analysis: analysis.clone(),
        request: PendingRequest {
            ticket,
            kind: RequestKind::Tree,
            resume,
        },
    })
    .with_effect(Effect::ClearError)
    .with_effect(call))
}

fn apply_reply(
    analysis: &Analysis,
    request: &PendingRequest,
    response: ChatResponse,
    at: i64,
) -> TransitionResult {
    let mut analysis = analysis.clone();
    match request.kind {
        RequestKind::Message => {
            analysis.push_message(response.message);
            TransitionResult::new(SessionState::resting(analysis, request.resume))
        }
        RequestKind::Tree => {
            analysis.set_tree_artifact(response.mermaid_code, at);
            if analysis.has_tree() {
                let persist = Effect::PersistAnalysis {
                    analysis: analysis.clone(),
                };
                TransitionResult::new(SessionState::ArtifactReady { analysis }).with_effect(persist)
            } else {
                TransitionResult::new(SessionState::ArtifactReady { analysis })
            }
        }
    }
}
