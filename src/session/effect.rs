//! Effects produced by state transitions

use super::state::Ticket;
use crate::model::{Analysis, ChatRequest};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send an exchange to the backend; the reply must echo `ticket`
    CallBackend { ticket: Ticket, request: ChatRequest },

    /// Save a copy of the finished analysis
    PersistAnalysis { analysis: Analysis },

    /// Show an error to the user
    SurfaceError { message: String },

    /// Drop any error currently shown
    ClearError,
}

impl Effect {
    pub fn call_backend(ticket: Ticket, analysis: &Analysis, wants_tree: bool) -> Self {
        Effect::CallBackend {
            ticket,
            request: ChatRequest {
                messages: analysis.messages.clone(),
                should_generate_tree: wants_tree,
            },
        }
    }
}
