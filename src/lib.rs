//! Ergon - autonomous agent execution with live event streaming
//!
//! Runs agent tasks that alternate between asking a language model and
//! calling tools until a goal is reached, and fans every step out to live
//! subscribers as typed events.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Completion provider trait with Ollama and scripted backends
//! - **Tools**: Tool trait, schema-validating registry, built-in tools
//! - **Plan**: Step checklists driven by the planning tool
//! - **Agent**: The think/act state machine and its policies
//! - **Events**: Typed events and the per-task distribution hub
//! - **Task**: Registry owning one agent run and hub per task
//! - **CLI**: Terminal front end
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ergon::llm::OllamaClient;
//! use ergon::task::{planning_agent_factory, TaskRegistry};
//! use ergon::Config;
//!
//! #[tokio::main]
//! async fn main() -> ergon::Result<()> {
//!     let config = Config::load();
//!     let provider = Arc::new(OllamaClient::from_config(&config)?);
//!     let registry = TaskRegistry::new(
//!         planning_agent_factory(config.agent.clone(), provider),
//!         config.hub.clone(),
//!     );
//!
//!     let id = registry.create("Summarize the plan for a picnic")?;
//!     let mut events = registry.subscribe(&id, true)?;
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.to_json()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod events;
pub mod llm;
pub mod plan;
pub mod task;
pub mod tools;

// Re-export commonly used items
pub use agent::{Agent, AgentBuilder, AgentState};
pub use core::{Config, ErgonError, Result};
pub use events::{Event, EventHub, EventPayload};
pub use task::{TaskRegistry, TaskStatus};
