//! whytree - guided "why-why" root-cause analysis
//!
//! A counselor persona asks successive "why" questions about a problem, and
//! once the dialogue is deep enough it is summarized into a Mermaid cause
//! tree. The library holds everything except process bootstrap:
//!
//! - [`model`]: messages, analyses and the `/chat` wire types
//! - [`llm`]: provider abstraction and the Gemini implementation
//! - [`gateway`]: prompts, the single-call model adapter, diagram extraction
//! - [`session`]: the conversation state machine and its driver
//! - [`store`]: local persistence of finished analyses
//! - [`api`]: the HTTP surface serving `POST /chat`

pub mod api;
pub mod config;
pub mod gateway;
pub mod llm;
pub mod model;
pub mod session;
pub mod store;
