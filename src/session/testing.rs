//! Mock chat backend for session tests

use super::backend::{BackendError, ChatBackend};
use crate::model::{ChatRequest, ChatResponse, Message};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Backend that answers from a queue and records what it was sent
#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<ChatResponse, BackendError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an ordinary assistant reply
    pub fn queue_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(ChatResponse {
            message: Message::assistant(text),
            mermaid_code: None,
        }));
    }

    /// Queue a tree reply carrying `diagram`
    pub fn queue_tree(&self, notice: &str, diagram: Option<&str>) {
        self.replies.lock().unwrap().push_back(Ok(ChatResponse {
            message: Message::assistant(notice),
            mermaid_code: diagram.map(str::to_string),
        }));
    }

    pub fn queue_error(&self, error: BackendError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no queued reply".to_string())))
    }
}
