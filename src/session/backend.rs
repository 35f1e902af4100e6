//! Chat backends a session can talk to
//!
//! The session only needs one exchange per call: send the full history,
//! receive an assistant message and maybe a diagram. That exchange can run
//! over HTTP against a `whytree` server or in-process against a
//! [`ModelGateway`].

use crate::gateway::{GatewayError, ModelGateway};
use crate::model::{ChatRequest, ChatResponse, ErrorCode, ErrorResponse, Role};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

#[derive(Debug, Error)]
pub enum BackendError {
    /// The server answered with an error body
    #[error("{message}")]
    Server {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("Could not reach the server: {0}")]
    Transport(String),
    #[error("Unexpected reply from the server: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// One request/response exchange with a chat backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        (**self).exchange(request).await
    }
}

/// Backend speaking `POST /chat` to a remote server
pub struct HttpChatBackend {
    client: Client,
    url: String,
}

impl HttpChatBackend {
    pub fn new(server_url: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/chat", server_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(error) => (error.code, error.error),
                Err(_) => (ErrorCode::UnknownError, format!("HTTP {status}")),
            };
            return Err(BackendError::Server {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let reply: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        if reply.message.role != Role::Assistant {
            return Err(BackendError::InvalidResponse(
                "reply message is not from the assistant".to_string(),
            ));
        }
        Ok(reply)
    }
}

/// Backend that runs the gateway in-process
#[derive(Clone)]
pub struct GatewayBackend {
    gateway: ModelGateway,
}

impl GatewayBackend {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ChatBackend for GatewayBackend {
    async fn exchange(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        Ok(self
            .gateway
            .respond(&request.messages, request.should_generate_tree)
            .await?)
    }
}
