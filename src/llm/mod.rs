//! LLM module - completion providers
//!
//! Ollama is the production backend; the scripted provider replays canned
//! replies for tests and offline runs.

pub mod ollama;
pub mod scripted;
pub mod traits;

pub use ollama::OllamaClient;
pub use scripted::{RecordedRequest, ScriptedProvider};
pub use traits::{LLMProvider, LLMResponse, TokenUsage};
