//! Client-side analysis session
//!
//! Implements the Elm Architecture pattern: a pure transition function
//! over [`SessionState`] plus a [`Session`] driver that performs the
//! resulting effects.

pub mod backend;
mod driver;
mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendError, ChatBackend, GatewayBackend, HttpChatBackend};
pub use driver::{PendingCall, Session, SessionError, TREE_PROMPT_MESSAGES};
pub use effect::Effect;
pub use event::Event;
pub use state::{PendingRequest, Phase, RequestKind, Resting, SessionState, Ticket};
pub use transition::{transition, TransitionError, TransitionResult, MIN_TREE_MESSAGES};
