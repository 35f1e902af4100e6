//! HTTP API
//!
//! Stateless per request: every `/chat` call carries the whole dialogue and
//! is answered by one model exchange.

mod handlers;
mod types;

pub use handlers::router;
pub use types::HealthResponse;

use crate::gateway::ModelGateway;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ModelGateway>,
}

impl AppState {
    pub fn new(gateway: ModelGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}
