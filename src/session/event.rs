//! Events that drive a session

use super::state::Ticket;
use crate::model::{Analysis, ChatResponse, Message};

/// Events that trigger state transitions.
///
/// Identifiers, timestamps and tickets are minted by the caller so the
/// transition function stays pure.
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        message: Message,
        /// Id for the analysis created when the session is idle
        analysis_id: String,
        ticket: Ticket,
    },
    TreeRequested {
        ticket: Ticket,
    },
    Reset,
    Resume {
        analysis: Analysis,
    },

    // Backend events
    ReplyReceived {
        ticket: Ticket,
        response: ChatResponse,
        at: i64,
    },
    RequestFailed {
        ticket: Ticket,
        message: String,
    },
}
