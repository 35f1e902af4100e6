//! Conversation data model
//!
//! Field names are camelCase on the wire and in the persisted blob so that
//! records written by earlier browser builds keep loading.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh opaque identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, now_millis())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, now_millis())
    }
}

/// One problem-exploration session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    /// Content of the first user message
    pub title: String,
    pub messages: Vec<Message>,
    /// Mermaid cause tree, once generated
    #[serde(default, alias = "mermaidCode")]
    pub tree_artifact: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Analysis {
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            tree_artifact: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and refresh `updated_at`
    pub fn push_message(&mut self, message: Message) {
        let at = message.timestamp;
        self.messages.push(message);
        self.touch(at);
    }

    pub fn set_tree_artifact(&mut self, artifact: Option<String>, now: i64) {
        self.tree_artifact = artifact;
        self.touch(now);
    }

    /// `updated_at` never moves backwards, even if the clock does.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now).max(self.created_at);
    }

    pub fn has_tree(&self) -> bool {
        self.tree_artifact.is_some()
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub should_generate_tree: bool,
}

/// Successful reply of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mermaid_code: Option<String>,
}

/// Machine-readable error code returned by `POST /chat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ApiKeyMissing,
    InvalidRequest,
    GeminiApiError,
    UnknownError,
}

/// Error body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
        }
    }
}
