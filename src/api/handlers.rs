//! HTTP request handlers

use super::types::HealthResponse;
use super::AppState;
use crate::gateway::GatewayError;
use crate::model::{ChatRequest, ChatResponse, ErrorCode, ErrorResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat
// ============================================================

/// The credential is checked before the body is looked at, so a
/// misconfigured server answers `API_KEY_MISSING` even to garbage input.
/// The body is decoded whatever its declared content type.
async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    if !state.gateway.is_configured() {
        tracing::error!("GEMINI_API_KEY is not set");
        return Err(AppError::MissingCredential);
    }

    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected chat request body");
        AppError::InvalidRequest
    })?;
    if request.messages.is_empty() {
        tracing::warn!("Rejected chat request without messages");
        return Err(AppError::InvalidRequest);
    }

    tracing::info!(
        messages = request.messages.len(),
        wants_tree = request.should_generate_tree,
        "Chat request"
    );

    let response = state
        .gateway
        .respond(&request.messages, request.should_generate_tree)
        .await?;
    Ok(Json(response))
}

// ============================================================
// Service info
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_configured: state.gateway.is_configured(),
    })
}

async fn get_version() -> &'static str {
    concat!("whytree ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    MissingCredential,
    InvalidRequest,
    Upstream(String),
}

impl From<GatewayError> for AppError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::MissingCredential => AppError::MissingCredential,
            GatewayError::EmptyHistory => AppError::InvalidRequest,
            GatewayError::Llm(e) => AppError::Upstream(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::MissingCredential => (
                StatusCode::BAD_REQUEST,
                ErrorCode::ApiKeyMissing,
                "API key is not configured. Set GEMINI_API_KEY for the server.",
            ),
            AppError::InvalidRequest => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "The request is not in the expected format.",
            ),
            AppError::Upstream(detail) => {
                tracing::error!(error = %detail, "Model exchange failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::GeminiApiError,
                    "Communication with the AI failed. Please wait a moment and try again.",
                )
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
