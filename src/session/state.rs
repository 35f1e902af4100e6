//! Session state types

use crate::model::{Analysis, Message};
use serde::{Deserialize, Serialize};

/// Generation token identifying one outstanding backend call
pub type Ticket = u64;

/// What an outstanding call was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Message,
    Tree,
}

/// State to return to when the outstanding call settles without producing
/// a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resting {
    Active,
    ArtifactReady,
}

/// The call a `Pending` session is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub kind: RequestKind,
    pub resume: Resting,
}

/// Session state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// No analysis yet
    #[default]
    Idle,

    /// Dialogue in progress
    Active { analysis: Analysis },

    /// A backend call is outstanding
    Pending {
        analysis: Analysis,
        request: PendingRequest,
    },

    /// Tree request completed. The artifact may still be absent when the
    /// model reply carried no diagram.
    ArtifactReady { analysis: Analysis },
}

/// Coarse phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Pending,
    ArtifactReady,
}

impl SessionState {
    /// Rest on `analysis` in the given phase
    pub fn resting(analysis: Analysis, resting: Resting) -> Self {
        match resting {
            Resting::Active => SessionState::Active { analysis },
            Resting::ArtifactReady => SessionState::ArtifactReady { analysis },
        }
    }

    /// Reopen a stored analysis
    pub fn reopened(analysis: Analysis) -> Self {
        if analysis.has_tree() {
            SessionState::ArtifactReady { analysis }
        } else {
            SessionState::Active { analysis }
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::Active { .. } => Phase::Active,
            SessionState::Pending { .. } => Phase::Pending,
            SessionState::ArtifactReady { .. } => Phase::ArtifactReady,
        }
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        match self {
            SessionState::Idle => None,
            SessionState::Active { analysis }
            | SessionState::Pending { analysis, .. }
            | SessionState::ArtifactReady { analysis } => Some(analysis),
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.analysis().map_or(&[], |a| a.messages.as_slice())
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        match self {
            SessionState::Pending { request, .. } => Some(request),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }
}
