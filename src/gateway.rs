//! Model gateway
//!
//! Single-call adapter between a dialogue and the generative-language
//! service: picks the persona, maps the history onto provider turns and,
//! in tree mode, pulls the diagram out of the reply.

pub mod diagram;
pub mod prompts;

pub use diagram::{extract_diagram, Extraction, FALLBACK_DIAGRAM};
pub use prompts::TREE_COMPLETE_NOTICE;

use crate::config::Config;
use crate::llm::{GeminiService, LlmError, LlmMessage, LlmRequest, LlmService, LoggingService};
use crate::model::{ChatResponse, Message, Role};
use std::sync::Arc;
use thiserror::Error;

/// Raw outcome of one model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
    /// Present only in tree mode, and only when the reply carried a payload
    pub diagram: Option<String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Checked before any network attempt
    #[error("GEMINI_API_KEY is not configured")]
    MissingCredential,
    #[error("Dialogue history is empty")]
    EmptyHistory,
    #[error("Model request failed: {0}")]
    Llm(#[from] LlmError),
}

/// Gateway to the external model. Holds no service when the credential is
/// absent, so every call fails fast with [`GatewayError::MissingCredential`].
#[derive(Clone)]
pub struct ModelGateway {
    llm: Option<Arc<dyn LlmService>>,
}

impl ModelGateway {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm: Some(llm) }
    }

    pub fn unconfigured() -> Self {
        Self { llm: None }
    }

    /// Build the Gemini-backed gateway described by `config`
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let Some(api_key) = config.gemini_api_key.clone() else {
            return Ok(Self::unconfigured());
        };
        let service = GeminiService::new(api_key, config.model(), config.gateway.as_deref())?;
        Ok(Self::new(Arc::new(LoggingService::new(Arc::new(service)))))
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.llm.as_deref().map(LlmService::model_id)
    }

    /// Send the dialogue to the model and return its reply.
    ///
    /// All but the last message are prior context; the last one is the new
    /// user turn.
    pub async fn converse(
        &self,
        history: &[Message],
        wants_tree: bool,
    ) -> Result<GatewayReply, GatewayError> {
        let llm = self.llm.as_ref().ok_or(GatewayError::MissingCredential)?;
        let (last, context) = history.split_last().ok_or(GatewayError::EmptyHistory)?;

        let messages = context
            .iter()
            .map(to_llm_message)
            .chain(std::iter::once(LlmMessage::user(last.content.clone())))
            .collect();
        let request = LlmRequest::new(
            Some(prompts::instruction_for(wants_tree).to_string()),
            messages,
        );

        let response = llm.complete(&request).await?;

        let diagram = if wants_tree {
            let extraction = diagram::scan(&response.text);
            match &extraction {
                Extraction::Found(_) => {}
                Extraction::Malformed => {
                    tracing::warn!(
                        reply_len = response.text.len(),
                        "Diagram payload could not be parsed, using fallback"
                    );
                }
                Extraction::Missing => {
                    tracing::warn!(
                        reply_len = response.text.len(),
                        "Tree reply carried no diagram payload"
                    );
                }
            }
            extraction.into_diagram()
        } else {
            None
        };

        Ok(GatewayReply {
            text: response.text,
            diagram,
        })
    }

    /// Run one `/chat` exchange: the assistant message carries the model
    /// text, or a completion notice when a diagram was produced.
    pub async fn respond(
        &self,
        history: &[Message],
        wants_tree: bool,
    ) -> Result<ChatResponse, GatewayError> {
        let reply = self.converse(history, wants_tree).await?;
        let content = if reply.diagram.is_some() {
            TREE_COMPLETE_NOTICE.to_string()
        } else {
            reply.text
        };
        Ok(ChatResponse {
            message: Message::assistant(content),
            mermaid_code: reply.diagram,
        })
    }
}

fn to_llm_message(message: &Message) -> LlmMessage {
    match message.role {
        Role::User => LlmMessage::user(message.content.clone()),
        Role::Assistant => LlmMessage::assistant(message.content.clone()),
    }
}
