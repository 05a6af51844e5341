//! Core module - shared infrastructure for Ergon
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, Config, HubConfig, OllamaConfig};
pub use error::{ErgonError, PlanError, Result};
pub use types::*;
